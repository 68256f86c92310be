//! Protocol constants and configuration values

/// Default Asterisk Manager Interface port
pub const DEFAULT_AMI_PORT: u16 = 5038;

/// Socket buffer size for reading from TCP stream (64KB)
pub const SOCKET_BUF_SIZE: usize = 64 * 1024;

/// Maximum size of a single frame (1MB). `CoreShowChannels` on a busy switch
/// produces many frames, never one huge frame.
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Maximum total bytes buffered while waiting for a terminator (4MB)
pub const MAX_BUFFER_SIZE: usize = 4 * 1024 * 1024;

/// Protocol line terminator
pub const LINE_TERMINATOR: &str = "\r\n";
/// Frame terminator: a blank line after the last field
pub const FRAME_TERMINATOR: &str = "\r\n\r\n";

/// Prefix of the greeting line sent once on connect, e.g. `Asterisk Call Manager/5.0.1`
pub const BANNER_PREFIX: &str = "Asterisk Call Manager/";

/// Reserved record field holding the verbatim frame text.
pub const RAW_FIELD: &str = "raw";

/// Literal marker of a failed response, matched anywhere in the frame text.
pub const ERROR_MARKER: &str = "Response: Error";

/// `Response` value of a successful reply.
pub const RESPONSE_SUCCESS: &str = "Success";
/// `Response` value of a failed reply.
pub const RESPONSE_ERROR: &str = "Error";
/// Error text used when a failed reply carries no `Message` field.
pub const MESSAGE_NOT_FOUND: &str = "NOT FOUND";

/// Connection timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 2000;

/// Action response timeout in milliseconds
pub const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 5000;

/// Maximum number of queued events before dropping
pub const MAX_EVENT_QUEUE_SIZE: usize = 1000;

/// Event mask requested at login when none is configured
pub const DEFAULT_EVENT_MASK: &str = "on";
