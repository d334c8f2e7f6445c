//! Register map and register-image types for the LTR-329ALS.
//!
//! Bit layouts and code tables follow the Lite-On LTR-329ALS-01 datasheet.
//!
//! Each register image is a plain `u8` wrapper. Mutators consume and return the image, so values
//! can be built up in one expression:
//!
//! ```
//! use ltr329::regs::AlsMeasRate;
//!
//! let rate = AlsMeasRate::default().with_rate(1000).with_integration(100);
//! assert_eq!(rate.value(), 0b0000_0100);
//! ```
use embedded_hal::i2c::SevenBitAddress;

use crate::lux::compute_lux;

pub const I2C_ADDR: SevenBitAddress = 0x29;

#[allow(unused)]
pub mod register {
    pub const ALS_CONTR: u8 = 0x80;
    pub const ALS_MEAS_RATE: u8 = 0x85;
    pub const PART_ID: u8 = 0x86;
    pub const MANUFAC_ID: u8 = 0x87;

    // Data registers, in the order the device wants them read
    pub const ALS_DATA_CH1_0: u8 = 0x88;
    pub const ALS_DATA_CH1_1: u8 = 0x89;
    pub const ALS_DATA_CH0_0: u8 = 0x8A;
    pub const ALS_DATA_CH0_1: u8 = 0x8B;

    pub const ALS_STATUS: u8 = 0x8C;
}

/// Bit masks of the fields inside each register.
pub mod bits {
    pub const CONTR_MODE: u8 = 0b0000_0001;
    pub const CONTR_RESET: u8 = 0b0000_0010;
    pub const CONTR_GAIN: u8 = 0b0001_1100;

    pub const MEAS_RATE_RATE: u8 = 0b0000_0111;
    pub const MEAS_RATE_TIME: u8 = 0b0011_1000;

    pub const PART_ID_REVISION: u8 = 0b0000_1111;
    pub const PART_ID_NUMBER: u8 = 0b1111_0000;

    pub const STATUS_NEW: u8 = 0b0000_0100;
    pub const STATUS_GAIN: u8 = 0b0111_0000;
    pub const STATUS_INVALID: u8 = 0b1000_0000;
}

/// Delay from power-up to the first I2C operation, in milliseconds.
pub const INITIAL_DELAY_MS: u32 = 100;

/// Delay from standby to active mode, in milliseconds.
pub const WAKEUP_DELAY_MS: u32 = 10;

/// Minimum time between two status polls once a result may be available.
pub const POLL_INTERVAL_MS: u32 = 10;

pub const EXPECTED_PART_NUMBER: u8 = 0xA;
pub const EXPECTED_MANUFACTURER: u8 = 0x05;

/// Extract the field selected by `mask` from `value`, right-justified.
pub const fn field_get(mask: u8, value: u8) -> u8 {
    (value & mask) >> mask.trailing_zeros()
}

/// Replace the field selected by `mask` in `value` with the right-justified `field`.
///
/// Bits of `field` that do not fit in the mask are dropped.
pub const fn field_set(mask: u8, value: u8, field: u8) -> u8 {
    (value & !mask) | ((field << mask.trailing_zeros()) & mask)
}

const fn field_set_flag(mask: u8, value: u8, flag: bool) -> u8 {
    field_set(mask, value, flag as u8)
}

/// Convert a gain (1, 2, 4, 8, 48 or 96) to its 3-bit code.
///
/// Unsupported gains map to the code for gain 1.
pub const fn encode_gain(gain: u32) -> u8 {
    match gain {
        2 => 0b001,
        4 => 0b010,
        8 => 0b011,
        48 => 0b110,
        96 => 0b111,
        _ => 0b000,
    }
}

/// Convert a gain code back to the gain. Undefined codes (4 and 5) read as gain 1.
pub const fn decode_gain(code: u8) -> u8 {
    match code {
        0b001 => 2,
        0b010 => 4,
        0b011 => 8,
        0b110 => 48,
        0b111 => 96,
        _ => 1,
    }
}

pub const fn is_gain_valid(gain: u32) -> bool {
    decode_gain(encode_gain(gain)) as u32 == gain
}

/// Convert a measurement repeat rate (ms per measurement) to its code.
///
/// The value is rounded up to the next supported rate; anything above 1000 ms selects 2000 ms.
pub const fn encode_rate(rate_ms: u32) -> u8 {
    match rate_ms {
        0..=50 => 0b000,
        51..=100 => 0b001,
        101..=200 => 0b010,
        201..=500 => 0b011,
        501..=1000 => 0b100,
        _ => 0b101,
    }
}

/// Convert a rate code back to milliseconds. Codes 5 and up all mean 2000 ms.
pub const fn decode_rate(code: u8) -> u16 {
    match code {
        0b000 => 50,
        0b001 => 100,
        0b010 => 200,
        0b011 => 500,
        0b100 => 1000,
        _ => 2000,
    }
}

pub const fn is_rate_valid(rate_ms: u32) -> bool {
    decode_rate(encode_rate(rate_ms)) as u32 == rate_ms
}

/// Convert an integration time in ms to its code. The codes are not monotonic in the time.
pub const fn encode_integration(time_ms: u32) -> u8 {
    match time_ms {
        0..=50 => 0b001,
        51..=100 => 0b000,
        101..=150 => 0b100,
        151..=200 => 0b010,
        201..=250 => 0b101,
        251..=300 => 0b110,
        301..=350 => 0b111,
        351..=400 => 0b011,
        _ => 0b000,
    }
}

pub const fn decode_integration(code: u8) -> u16 {
    match code {
        0b001 => 50,
        0b010 => 200,
        0b011 => 400,
        0b100 => 150,
        0b101 => 250,
        0b110 => 300,
        0b111 => 350,
        _ => 100,
    }
}

pub const fn is_integration_valid(time_ms: u32) -> bool {
    decode_integration(encode_integration(time_ms)) as u32 == time_ms
}

/// Supported integration times, shortest first.
pub const INTEGRATION_TIMES_MS: [u16; 8] = [50, 100, 150, 200, 250, 300, 350, 400];

/// Image of the `ALS_CONTR` register.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AlsContr(u8);

impl AlsContr {
    pub const fn new(value: u8) -> Self {
        AlsContr(value)
    }

    pub const fn value(self) -> u8 {
        self.0
    }

    /// Set active mode (`true`) or standby (`false`).
    pub const fn with_active(self, active: bool) -> Self {
        AlsContr(field_set_flag(bits::CONTR_MODE, self.0, active))
    }

    pub const fn active(self) -> bool {
        field_get(bits::CONTR_MODE, self.0) != 0
    }

    pub const fn with_reset(self, reset: bool) -> Self {
        AlsContr(field_set_flag(bits::CONTR_RESET, self.0, reset))
    }

    pub const fn reset(self) -> bool {
        field_get(bits::CONTR_RESET, self.0) != 0
    }

    /// Select the gain. Unsupported gains select gain 1.
    pub const fn with_gain(self, gain: u32) -> Self {
        AlsContr(field_set(bits::CONTR_GAIN, self.0, encode_gain(gain)))
    }

    pub const fn gain(self) -> u8 {
        decode_gain(field_get(bits::CONTR_GAIN, self.0))
    }
}

/// Image of the `ALS_MEAS_RATE` register.
///
/// Note that the datasheet expresses the "rate" as a period: milliseconds per measurement.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AlsMeasRate(u8);

impl AlsMeasRate {
    pub const fn new(value: u8) -> Self {
        AlsMeasRate(value)
    }

    pub const fn value(self) -> u8 {
        self.0
    }

    pub const fn with_rate(self, rate_ms: u32) -> Self {
        AlsMeasRate(field_set(bits::MEAS_RATE_RATE, self.0, encode_rate(rate_ms)))
    }

    pub const fn rate(self) -> u16 {
        decode_rate(field_get(bits::MEAS_RATE_RATE, self.0))
    }

    pub const fn with_integration(self, time_ms: u32) -> Self {
        AlsMeasRate(field_set(
            bits::MEAS_RATE_TIME,
            self.0,
            encode_integration(time_ms),
        ))
    }

    pub const fn integration(self) -> u16 {
        decode_integration(field_get(bits::MEAS_RATE_TIME, self.0))
    }
}

/// Image of the `ALS_STATUS` register.
///
/// The validity flag is stored inverted on the device: the bit is set when the data is invalid.
/// The accessors here deal in "valid" so callers never see the inversion.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AlsStatus(u8);

impl AlsStatus {
    pub const fn new(value: u8) -> Self {
        AlsStatus(value)
    }

    pub const fn value(self) -> u8 {
        self.0
    }

    pub const fn with_new(self, new: bool) -> Self {
        AlsStatus(field_set_flag(bits::STATUS_NEW, self.0, new))
    }

    pub const fn is_new(self) -> bool {
        field_get(bits::STATUS_NEW, self.0) != 0
    }

    pub const fn with_valid(self, valid: bool) -> Self {
        AlsStatus(field_set_flag(bits::STATUS_INVALID, self.0, !valid))
    }

    pub const fn is_valid(self) -> bool {
        field_get(bits::STATUS_INVALID, self.0) == 0
    }

    pub const fn with_gain(self, gain: u32) -> Self {
        AlsStatus(field_set(bits::STATUS_GAIN, self.0, encode_gain(gain)))
    }

    /// Gain that was in effect when the data was captured.
    pub const fn gain(self) -> u8 {
        decode_gain(field_get(bits::STATUS_GAIN, self.0))
    }

    /// True if the data registers hold a fresh, valid result.
    pub const fn is_ready(self) -> bool {
        self.is_new() && self.is_valid()
    }
}

/// Image of the `PART_ID` register.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PartId(u8);

impl PartId {
    pub const fn new(value: u8) -> Self {
        PartId(value)
    }

    pub const fn value(self) -> u8 {
        self.0
    }

    pub const fn part_number(self) -> u8 {
        field_get(bits::PART_ID_NUMBER, self.0)
    }

    pub const fn revision(self) -> u8 {
        field_get(bits::PART_ID_REVISION, self.0)
    }
}

/// Image of the `MANUFAC_ID` register. The whole byte is the manufacturer ID.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ManufacId(u8);

impl ManufacId {
    pub const fn new(value: u8) -> Self {
        ManufacId(value)
    }

    pub const fn value(self) -> u8 {
        self.0
    }

    pub const fn manufacturer(self) -> u8 {
        self.0
    }
}

/// One measurement: the four data bytes plus the register context they were captured under.
///
/// The status and measurement-rate images are kept alongside the data because the lux conversion
/// needs the gain and integration time that were active for this capture, not whatever the driver
/// is configured for now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataRegs {
    /// Register bytes in I2C order: CH1 low, CH1 high, CH0 low, CH0 high.
    data: [u8; 4],
    status: AlsStatus,
    meas_rate: AlsMeasRate,
}

impl Default for DataRegs {
    fn default() -> Self {
        DataRegs {
            data: [0; 4],
            status: AlsStatus::default().with_valid(false).with_new(false),
            meas_rate: AlsMeasRate::default(),
        }
    }
}

impl DataRegs {
    pub const SIZE: usize = 4;

    pub fn new(data: [u8; 4], status: AlsStatus, meas_rate: AlsMeasRate) -> Self {
        DataRegs {
            data,
            status,
            meas_rate,
        }
    }

    /// Channel 0 (visible + IR) count.
    pub fn chan0(&self) -> u16 {
        u16::from_le_bytes([self.data[2], self.data[3]])
    }

    /// Channel 1 (IR) count.
    pub fn chan1(&self) -> u16 {
        u16::from_le_bytes([self.data[0], self.data[1]])
    }

    pub fn data(&self) -> &[u8; 4] {
        &self.data
    }

    pub fn status(&self) -> AlsStatus {
        self.status
    }

    pub fn meas_rate(&self) -> AlsMeasRate {
        self.meas_rate
    }

    pub fn integration_time(&self) -> u16 {
        self.meas_rate.integration()
    }

    /// Convert the captured counts to lux.
    ///
    /// Returns `None` unless the captured status marked the data both new and valid.
    pub fn compute_lux(&self) -> Option<f32> {
        if !self.status.is_ready() {
            return None;
        }

        Some(compute_lux(
            self.chan0(),
            self.chan1(),
            self.status.gain(),
            self.meas_rate.integration(),
        ))
    }
}
