//! Error kinds reported by the LTR-329ALS driver.
//!
//! Every kind has a small numeric code so that names can be looked up from a table, with code 0
//! reserved for "no error".
use embedded_hal::i2c::ErrorKind;
use thiserror::Error;

use crate::bus::BusError;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error("invalid parameter")]
    InvalidParameter,

    /// The operation is not allowed while a measurement is in progress, or the result is not
    /// ready yet. This is expected during normal polling.
    #[error("busy")]
    Busy,

    #[error("not measuring; no result will become ready")]
    NotMeasuring,

    /// The device never reported data within twice the measurement window. The driver must be
    /// started again with `begin()`.
    #[error("measurement timed out")]
    TimedOut,

    #[error("measurement data is not new or not valid")]
    InvalidData,

    #[error("part ID mismatch: part number {part:#x}, manufacturer {manufacturer:#x}")]
    PartIdMismatch { part: u8, manufacturer: u8 },

    #[error("I2C read request failed: {0}")]
    I2cReadRequest(ErrorKind),

    #[error("I2C read returned too few bytes")]
    I2cReadShort,

    #[error("I2C read returned too many bytes")]
    I2cReadLong,

    #[error("I2C write failed: {0}")]
    I2cWriteFailed(ErrorKind),

    #[error("internal error: invalid parameter")]
    InternalInvalidParameter,

    #[error("driver is not running")]
    Uninitialized,
}

/// Names of the error codes, indexed by [`Error::code`]. Index 0 is success.
const ERROR_NAMES: [&str; 13] = [
    "Success",
    "InvalidParameter",
    "Busy",
    "NotMeasuring",
    "TimedOut",
    "InvalidData",
    "PartIdMismatch",
    "I2cReadRequest",
    "I2cReadShort",
    "I2cReadLong",
    "I2cWriteFailed",
    "InternalInvalidParameter",
    "Uninitialized",
];

/// Look up the name of an error code. Unknown codes give `"<<unknown>>"`.
pub fn error_name(code: u8) -> &'static str {
    ERROR_NAMES
        .get(code as usize)
        .copied()
        .unwrap_or("<<unknown>>")
}

/// Name of an optional error, where `None` means success.
pub fn result_name(error: Option<Error>) -> &'static str {
    error_name(error.map_or(0, Error::code))
}

impl Error {
    pub fn code(self) -> u8 {
        match self {
            Error::InvalidParameter => 1,
            Error::Busy => 2,
            Error::NotMeasuring => 3,
            Error::TimedOut => 4,
            Error::InvalidData => 5,
            Error::PartIdMismatch { .. } => 6,
            Error::I2cReadRequest(_) => 7,
            Error::I2cReadShort => 8,
            Error::I2cReadLong => 9,
            Error::I2cWriteFailed(_) => 10,
            Error::InternalInvalidParameter => 11,
            Error::Uninitialized => 12,
        }
    }

    pub fn name(self) -> &'static str {
        error_name(self.code())
    }

    /// True for errors after which the driver has dropped back to `Uninitialized`.
    pub fn is_fatal(self) -> bool {
        matches!(
            self,
            Error::TimedOut
                | Error::PartIdMismatch { .. }
                | Error::I2cReadRequest(_)
                | Error::I2cReadShort
                | Error::I2cReadLong
                | Error::I2cWriteFailed(_)
        )
    }
}

impl From<BusError> for Error {
    fn from(e: BusError) -> Self {
        match e {
            BusError::ReadRequest(kind) => Error::I2cReadRequest(kind),
            BusError::WriteFailed(kind) => Error::I2cWriteFailed(kind),
        }
    }
}
