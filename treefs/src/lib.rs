pub mod check;
pub mod config;
pub mod error;
pub mod fs;
pub mod info;
pub mod node;
pub mod path;
pub mod protocol;
pub mod server;
pub mod transport;

pub use error::{FsError, FsErrorKind, ServerError};
pub use fs::{init, Fs, MemoryFs};
pub use info::{FileInfo, FileType};
pub use path::MalformedPath;
