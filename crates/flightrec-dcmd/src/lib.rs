#![deny(clippy::all)]

mod attach;
mod commands;
mod error;
mod mock;
pub mod sync;
mod types;

pub use attach::AttachSocket;
pub use commands::DiagnosticCommands;
pub use error::DcmdError;
pub use mock::MockCommands;
pub use mock::RecordedCall;
pub use types::OperationInfo;
pub use types::STRING_ARRAY_TYPE;
pub use types::operation_name;
pub use types::ops;

pub type Result<T> = std::result::Result<T, DcmdError>;
