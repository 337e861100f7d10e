use thiserror::Error;

#[derive(Error, Debug)]
pub enum DcmdError {
    #[error("Failed to reach the diagnostic endpoint: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed reply from the diagnostic endpoint: {0}")]
    Protocol(String),

    #[error("Command failed with status {status}: {message}")]
    CommandFailed { status: i32, message: String },

    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    #[error("Process {pid} exposes no diagnostic command listener")]
    NoListener { pid: u32 },

    #[error("Process {pid} did not open its attach listener in time")]
    AttachTimeout { pid: u32 },
}
