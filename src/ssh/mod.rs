pub mod auth;
pub mod channel;
pub mod encoding;
pub mod retry;
pub mod session;
pub mod url;
pub mod wait;

pub use auth::{AuthMethod, Credentials, KeyPair};
pub use channel::{Channel, ChannelKind, ExtendedDataMode, PtySize};
pub use encoding::TextEncoding;
pub use session::{NegotiatedMethods, ScpStat, SessionInfo, SshSession, UsageStats};
pub use url::{parse_session_url, SessionUrl, UrlError};
pub use wait::Deadline;
