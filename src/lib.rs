//! Polling driver for the Lite-On LTR-329ALS ambient light sensor.
//!
//! The sensor sits at I2C address `0x29` and reports two photodiode channels (visible + IR, and
//! IR only). [`Ltr329`] brings it up, configures gain, integration time and repeat rate, runs
//! single or continuous measurements and converts the counts to lux. It never blocks on a
//! measurement: the caller polls [`Ltr329::query_ready`] and the driver gates bus traffic on a
//! millisecond [`Clock`].
pub mod bus;
pub mod clock;
pub mod error;
pub mod ltr329;
pub mod lux;
pub mod regs;

pub use bus::{BusError, I2cBus, RegisterBus};
pub use clock::{Clock, SystemClock};
pub use error::{Error, error_name};
pub use ltr329::{Ltr329, MeasurementConfig, ProductInfo, State, state_name};
pub use regs::DataRegs;
