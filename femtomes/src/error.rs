use thiserror::Error;

/// Errors that can occur while talking to a receiver
#[derive(Error, Debug)]
pub enum Error {
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),

    #[error("timed out waiting for a complete frame")]
    Timeout,

    #[error("no reply to command {command:?}")]
    NoReply { command: String },

    #[error("receiver did not answer at any candidate baud rate")]
    BaudDetectionFailed,

    #[error("receiver did not answer after switching to {baud_rate} baud")]
    BaudChangeFailed { baud_rate: u32 },

    #[error("invalid frame: {0}")]
    InvalidFrame(&'static str),
}

pub type Result<T> = core::result::Result<T, Error>;
