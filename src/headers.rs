//! Typed field names for AMI actions, responses and events.

ami_names! {
    parse_error: ParseAmiHeaderError("unknown AMI header"),
    /// Field names that carry protocol meaning or appear on most events.
    ///
    /// Use with [`Record::first()`](crate::Record::first) for type-safe
    /// lookups. Field names are case-sensitive on the wire as received;
    /// parsing into this enum is case-insensitive.
    pub enum AmiHeader {
        Action => "Action",
        ActionId => "ActionID",
        Event => "Event",
        Response => "Response",
        Message => "Message",
        EventList => "EventList",
        Privilege => "Privilege",
        Channel => "Channel",
        DestChannel => "DestChannel",
        Uniqueid => "Uniqueid",
        Linkedid => "Linkedid",
        CallerIdNum => "CallerIDNum",
        CallerIdName => "CallerIDName",
        ConnectedLineNum => "ConnectedLineNum",
        ConnectedLineName => "ConnectedLineName",
        Context => "Context",
        Exten => "Exten",
        Priority => "Priority",
        DialStatus => "DialStatus",
        Cause => "Cause",
        CauseTxt => "Cause-txt",
        Username => "Username",
        Secret => "Secret",
        Events => "Events",
        Variable => "Variable",
    }
}

ami_names! {
    parse_error: ParseAmiEventError("unknown AMI event"),
    /// Values of the `Event` field for events commonly waited on.
    ///
    /// Pass to [`AmiSession::wait_for_event()`](crate::AmiSession::wait_for_event)
    /// or [`AmiClient::wait_for_event()`](crate::AmiClient::wait_for_event) via
    /// [`as_str()`](Self::as_str). Unknown event names stay usable as plain strings.
    pub enum AmiEvent {
        FullyBooted => "FullyBooted",
        Shutdown => "Shutdown",
        Newchannel => "Newchannel",
        Newstate => "Newstate",
        Hangup => "Hangup",
        DialBegin => "DialBegin",
        DialEnd => "DialEnd",
        BridgeEnter => "BridgeEnter",
        BridgeLeave => "BridgeLeave",
        OriginateResponse => "OriginateResponse",
        CoreShowChannel => "CoreShowChannel",
        CoreShowChannelsComplete => "CoreShowChannelsComplete",
        Status => "Status",
        StatusComplete => "StatusComplete",
        PeerEntry => "PeerEntry",
        PeerlistComplete => "PeerlistComplete",
        UserEvent => "UserEvent",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_round_trip() {
        assert_eq!(AmiHeader::ActionId.to_string(), "ActionID");
        assert_eq!(AmiHeader::CauseTxt.to_string(), "Cause-txt");
        assert_eq!(AmiHeader::CallerIdNum.to_string(), "CallerIDNum");
    }

    #[test]
    fn as_ref_str() {
        let h: &str = AmiHeader::Event.as_ref();
        assert_eq!(h, "Event");
    }

    #[test]
    fn from_str_case_insensitive() {
        assert_eq!("actionid".parse::<AmiHeader>(), Ok(AmiHeader::ActionId));
        assert_eq!("ACTIONID".parse::<AmiHeader>(), Ok(AmiHeader::ActionId));
        assert_eq!("uniqueid".parse::<AmiHeader>(), Ok(AmiHeader::Uniqueid));
    }

    #[test]
    fn all_variants_round_trip() {
        for v in AmiHeader::ALL {
            let parsed: AmiHeader = v
                .as_str()
                .parse()
                .unwrap();
            assert_eq!(parsed, *v, "round-trip failed for {v}");
        }
        for v in AmiEvent::ALL {
            let parsed: AmiEvent = v
                .to_string()
                .parse()
                .unwrap();
            assert_eq!(parsed, *v, "round-trip failed for {v}");
        }
    }

    #[test]
    fn event_names() {
        assert_eq!(AmiEvent::DialBegin.as_str(), "DialBegin");
        assert_eq!(
            "corefshowchannel".parse::<AmiEvent>(),
            Err(ParseAmiEventError("corefshowchannel".to_string()))
        );
    }

    #[test]
    fn from_str_unknown() {
        let err = "X-Not-A-Header".parse::<AmiHeader>();
        assert_eq!(
            err.unwrap_err()
                .to_string(),
            "unknown AMI header: X-Not-A-Header"
        );
    }

    #[test]
    fn mixed_case_wire_names_parse() {
        assert_eq!("CAUSE-TXT".parse::<AmiHeader>(), Ok(AmiHeader::CauseTxt));
        assert_eq!("callerIDnum".parse::<AmiHeader>(), Ok(AmiHeader::CallerIdNum));
        assert_eq!("HANGUP".parse::<AmiEvent>(), Ok(AmiEvent::Hangup));
        assert_eq!(
            ParseAmiEventError("Nope".to_string()).to_string(),
            "unknown AMI event: Nope"
        );
    }
}
