/// Declares a closed set of AMI names (field names or `Event` values) as an enum.
///
/// AMI matches names without regard to case, but a switch always sends them
/// in one canonical spelling. Each variant carries that spelling, which
/// `as_str()`, `Display` and `AsRef<str>` return; `FromStr` accepts any case.
///
/// The `parse_error` clause also defines the error returned for a name outside
/// the set, holding the rejected input and displayed as `"<what>: <input>"`.
///
/// ```ignore
/// ami_names! {
///     parse_error: ParseAmiHeaderError("unknown AMI header"),
///     /// Field names that carry protocol meaning.
///     pub enum AmiHeader {
///         ActionId => "ActionID",
///         CauseTxt => "Cause-txt",
///     }
/// }
///
/// assert_eq!(AmiHeader::ActionId.as_str(), "ActionID");
/// assert_eq!("actionid".parse::<AmiHeader>(), Ok(AmiHeader::ActionId));
/// ```
macro_rules! ami_names {
    (
        parse_error: $Err:ident($what:literal),
        $(#[$enum_meta:meta])*
        $vis:vis enum $Name:ident {
            $(
                $(#[$var_meta:meta])*
                $variant:ident => $wire:literal
            ),+ $(,)?
        }
    ) => {
        #[doc = concat!("Error returned when a name is not a known [`", stringify!($Name), "`].")]
        #[derive(Debug, Clone, PartialEq, Eq)]
        $vis struct $Err(pub String);

        impl std::fmt::Display for $Err {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($what, ": {}"), self.0)
            }
        }

        impl std::error::Error for $Err {}

        $(#[$enum_meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[non_exhaustive]
        #[allow(missing_docs)]
        $vis enum $Name {
            $(
                $(#[$var_meta])*
                $variant,
            )+
        }

        impl $Name {
            /// Every name in the set, in declaration order.
            pub const ALL: &'static [$Name] = &[ $( $Name::$variant, )+ ];

            /// Canonical spelling, as the switch sends it.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( $Name::$variant => $wire, )+
                }
            }
        }

        impl std::fmt::Display for $Name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl AsRef<str> for $Name {
            fn as_ref(&self) -> &str {
                self.as_str()
            }
        }

        impl std::str::FromStr for $Name {
            type Err = $Err;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|name| {
                        name.as_str()
                            .eq_ignore_ascii_case(s)
                    })
                    .ok_or_else(|| $Err(s.to_string()))
            }
        }
    };
}
