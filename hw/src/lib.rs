pub mod clock;
pub mod i2c;
pub mod lcd;
pub mod pwm;

#[cfg(test)]
pub(crate) mod testing;

use thiserror::Error;

#[derive(Debug, Error, Eq, PartialEq, Clone)]
pub enum HwError {
    #[error("display not initialized")]
    NotInitialized,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("the feature is not supported on this backend")]
    NotSupported,
    #[error("IO error: {0}")]
    Io(std::io::ErrorKind),
    #[error("I2C transport error: {0}")]
    Transport(String),
    #[error("error: {0}")]
    Other(String),
}

impl From<std::io::Error> for HwError {
    fn from(err: std::io::Error) -> Self {
        HwError::Io(err.kind())
    }
}

pub type HwResult<T> = Result<T, HwError>;
