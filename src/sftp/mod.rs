pub mod attrs;
pub mod client;
pub mod handle;
pub mod path;

pub(crate) use client::SftpState;

pub use attrs::{permission_string, EntryClass, FileType, RemoteAttributes};
pub use client::{DirEntry, DirectoryListing, SftpClient, SftpInfo, TransferOptions, TransferSummary};
pub use path::resolve_path;
