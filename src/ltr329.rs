//! Represents an LTR-329ALS sensor and drives it through power-up, configuration and polled
//! measurements.
//!
//! The driver never sleeps. Bring-up and measurements are advanced by the caller polling
//! [`Ltr329::poll_begin`] and [`Ltr329::query_ready`]; the driver compares elapsed time on the
//! supplied [`Clock`] against the datasheet delays and only touches the bus once they have passed.
//!
//! ```no_run
//! # fn demo<I: embedded_hal::i2c::I2c>(i2c: I) -> Result<(), ltr329::Error> {
//! use ltr329::{Ltr329, MeasurementConfig, SystemClock};
//!
//! let mut sensor = Ltr329::from_i2c(i2c, SystemClock::new());
//! sensor.begin()?;
//! sensor.configure(MeasurementConfig::new(1, 100, 1000))?;
//! sensor.start_single_measurement()?;
//! while !sensor.query_ready()? {}
//! println!("{} lux", sensor.get_lux()?);
//! # Ok(())
//! # }
//! ```
use embedded_hal::i2c::I2c;
use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};

use crate::bus::{I2cBus, MAX_READ, RegisterBus};
use crate::clock::{Clock, elapsed_ms};
use crate::error::{Error, result_name};
use crate::regs::{
    AlsContr, AlsMeasRate, AlsStatus, DataRegs, EXPECTED_MANUFACTURER, EXPECTED_PART_NUMBER,
    INITIAL_DELAY_MS, ManufacId, POLL_INTERVAL_MS, PartId, WAKEUP_DELAY_MS, is_gain_valid,
    is_integration_valid, is_rate_valid, register,
};

/// Repeat rate programmed for single measurements, so the sensor is back in standby long before
/// it would start a second conversion.
const SINGLE_SHOT_RATE_MS: u32 = 2000;

/// State of the measurement engine. The order matters: everything after `End` is "running".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum State {
    /// `begin()` has never succeeded, or a fatal error or reset happened since.
    Uninitialized,
    /// `begin()` succeeded and was followed by `end()`.
    End,
    /// Waiting out the power-up delay. The bus is untouched until it has passed.
    PowerOn,
    /// IDs checked and defaults written in standby, waiting out the wake-up delay.
    Initial,
    /// Ready to start a measurement; the sensor is in standby.
    Idle,
    /// Running a single measurement.
    Single,
    /// Continuous measurements running.
    Continuous,
    /// Continuous measurement running with data available. Reserved; the engine restarts the
    /// measurement window in `Continuous` instead of parking here.
    Ready,
}

const STATE_NAMES: [&str; 8] = [
    "Uninitialized",
    "End",
    "PowerOn",
    "Initial",
    "Idle",
    "Single",
    "Continuous",
    "Ready",
];

impl State {
    pub fn name(self) -> &'static str {
        STATE_NAMES[self as usize]
    }
}

pub fn state_name(state: State) -> &'static str {
    state.name()
}

/// Requested gain, integration time and repeat rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeasurementConfig {
    /// 1, 2, 4, 8, 48 or 96
    pub gain: u8,
    /// 50 to 400 ms in steps of 50
    pub integration_ms: u16,
    /// 50, 100, 200, 500, 1000 or 2000 ms per measurement
    pub rate_ms: u16,
}

impl Default for MeasurementConfig {
    /// Gain 1 and 100 ms integration cover the full range of the sensor. The 1000 ms rate leaves
    /// time to put the device back to sleep after a single measurement.
    fn default() -> Self {
        MeasurementConfig {
            gain: 1,
            integration_ms: 100,
            rate_ms: 1000,
        }
    }
}

impl MeasurementConfig {
    pub fn new(gain: u8, integration_ms: u16, rate_ms: u16) -> Self {
        MeasurementConfig {
            gain,
            integration_ms,
            rate_ms,
        }
    }

    /// Check every field against the device's tables, and that a measurement fits in the
    /// repeat period.
    pub fn validate(&self) -> Result<(), Error> {
        let valid = is_gain_valid(self.gain.into())
            && is_integration_valid(self.integration_ms.into())
            && is_rate_valid(self.rate_ms.into())
            && self.rate_ms >= self.integration_ms;

        if valid {
            Ok(())
        } else {
            Err(Error::InvalidParameter)
        }
    }

    /// Control register image for this configuration, in standby.
    fn control(&self) -> AlsContr {
        AlsContr::default().with_gain(self.gain.into())
    }

    fn meas_rate(&self) -> AlsMeasRate {
        AlsMeasRate::default()
            .with_rate(self.rate_ms.into())
            .with_integration(self.integration_ms.into())
    }
}

/// Identification registers of the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProductInfo {
    pub part_number: u8,
    pub revision: u8,
    pub manufacturer: u8,
}

impl ProductInfo {
    pub fn from_registers(part: PartId, manufac: ManufacId) -> Self {
        ProductInfo {
            part_number: part.part_number(),
            revision: part.revision(),
            manufacturer: manufac.manufacturer(),
        }
    }

    pub fn is_ltr329(&self) -> bool {
        self.part_number == EXPECTED_PART_NUMBER && self.manufacturer == EXPECTED_MANUFACTURER
    }
}

type TransitionHook = Box<dyn FnMut(State, State)>;

pub struct Ltr329<B, C> {
    bus: B,
    clock: C,

    /// what the user asked for
    config: MeasurementConfig,
    state: State,
    last_error: Option<Error>,

    /// start of the current delay or measurement window
    start_time: u32,
    /// length of the current delay or measurement window
    window_ms: u32,
    /// last time the status register was read
    poll_time: u32,

    // register images
    control: AlsContr,
    meas_rate: AlsMeasRate,
    status: AlsStatus,
    raw: DataRegs,
    product: Option<ProductInfo>,

    on_transition: Option<TransitionHook>,
}

impl<I: I2c, C: Clock> Ltr329<I2cBus<I>, C> {
    pub fn from_i2c(i2c: I, clock: C) -> Self {
        Self::new(I2cBus::new(i2c), clock)
    }
}

impl<B: RegisterBus, C: Clock> Ltr329<B, C> {
    pub fn new(bus: B, clock: C) -> Self {
        let config = MeasurementConfig::default();
        Ltr329 {
            bus,
            clock,
            config,
            state: State::Uninitialized,
            last_error: None,
            start_time: 0,
            window_ms: 0,
            poll_time: 0,
            control: config.control(),
            meas_rate: config.meas_rate(),
            status: AlsStatus::default(),
            raw: DataRegs::default(),
            product: None,
            on_transition: None,
        }
    }

    /// Give back the bus and clock.
    pub fn release(self) -> (B, C) {
        (self.bus, self.clock)
    }

    /// Call `hook(from, to)` on every state change.
    pub fn on_transition(&mut self, hook: impl FnMut(State, State) + 'static) {
        self.on_transition = Some(Box::new(hook));
    }

    /// Power up the sensor and wait until it is ready to measure.
    ///
    /// Blocks (spinning on the clock) through the power-up and wake-up delays. Use
    /// [`Ltr329::poll_begin`] to do the same without blocking. Succeeds immediately if the
    /// driver is already running.
    pub fn begin(&mut self) -> Result<(), Error> {
        while !self.poll_begin()? {
            std::hint::spin_loop();
        }
        Ok(())
    }

    /// Advance the power-up sequence by at most one step.
    ///
    /// Returns `Ok(true)` once the driver is idle, `Ok(false)` (with `Busy` recorded as the last
    /// error) while a delay is still running.
    pub fn poll_begin(&mut self) -> Result<bool, Error> {
        match self.state {
            State::Uninitialized | State::End => {
                // assumes the sensor has just been powered; the delay starts now
                self.start_window(INITIAL_DELAY_MS);
                self.set_state(State::PowerOn);
                Ok(self.not_yet())
            }
            State::PowerOn => {
                if !self.window_elapsed() {
                    return Ok(self.not_yet());
                }
                self.read_product_info()?;
                // leave the sensor in standby until a measurement is started, to save power
                self.control = self.config.control();
                self.meas_rate = self.config.meas_rate();
                self.write_register(register::ALS_CONTR, self.control.value())?;
                self.write_register(register::ALS_MEAS_RATE, self.meas_rate.value())?;
                self.start_window(WAKEUP_DELAY_MS);
                self.set_state(State::Initial);
                Ok(self.not_yet())
            }
            State::Initial => {
                if !self.window_elapsed() {
                    return Ok(self.not_yet());
                }
                self.set_state(State::Idle);
                self.last_error = None;
                Ok(true)
            }
            State::Idle | State::Single | State::Continuous | State::Ready => {
                self.last_error = None;
                Ok(true)
            }
        }
    }

    /// Read and check the part and manufacturer IDs.
    pub fn read_product_info(&mut self) -> Result<ProductInfo, Error> {
        let mut buf = [0u8; 2];
        self.read_registers(register::PART_ID, &mut buf)?;

        let info = ProductInfo::from_registers(PartId::new(buf[0]), ManufacId::new(buf[1]));
        if !info.is_ltr329() {
            return Err(self.fail(Error::PartIdMismatch {
                part: info.part_number,
                manufacturer: info.manufacturer,
            }));
        }

        debug!(
            "LTR-329ALS found: part {:#x} rev {:#x}, manufacturer {:#x}",
            info.part_number, info.revision, info.manufacturer
        );
        self.product = Some(info);
        Ok(info)
    }

    /// Set gain, integration time and repeat rate for the next measurement.
    ///
    /// Only the in-memory register images change; they are written when the next measurement
    /// starts.
    pub fn configure(&mut self, config: MeasurementConfig) -> Result<(), Error> {
        if self.is_measuring() {
            return Err(self.record(Error::Busy));
        }
        if let Err(e) = config.validate() {
            return Err(self.record(e));
        }

        self.config = config;
        self.control = config.control();
        self.meas_rate = config.meas_rate();
        self.last_error = None;
        Ok(())
    }

    pub fn start_single_measurement(&mut self) -> Result<(), Error> {
        self.start_measurement(true)
    }

    pub fn start_continuous_measurement(&mut self) -> Result<(), Error> {
        self.start_measurement(false)
    }

    /// Trigger a single measurement, or start continuous measurements.
    ///
    /// Starting a single measurement while one is already running is a no-op.
    pub fn start_measurement(&mut self, single: bool) -> Result<(), Error> {
        self.check_running()?;
        match self.state {
            State::Single if single => return Ok(()),
            State::Idle => {}
            _ => return Err(self.record(Error::Busy)),
        }

        let rate_ms = if single {
            SINGLE_SHOT_RATE_MS
        } else {
            self.config.rate_ms.into()
        };
        self.meas_rate = self.config.meas_rate().with_rate(rate_ms);
        self.control = self.config.control().with_active(true);

        self.write_register(register::ALS_MEAS_RATE, self.meas_rate.value())?;
        self.write_register(register::ALS_CONTR, self.control.value())?;

        self.raw = DataRegs::default();
        let now = self.clock.now();
        self.start_time = now;
        self.poll_time = now;
        self.window_ms = self.config.integration_ms.into();
        self.set_state(if single {
            State::Single
        } else {
            State::Continuous
        });
        self.last_error = None;
        Ok(())
    }

    /// Check whether a measurement result has been captured.
    ///
    /// `Ok(false)` means "not yet" and records `Busy`; keep polling. On `Ok(true)` the result is
    /// in [`Ltr329::raw_data`] and [`Ltr329::get_lux`] converts it. A single measurement returns
    /// the sensor to standby; continuous measurements keep running.
    ///
    /// If no result shows up within twice the measurement window the sensor is assumed to be
    /// wedged: the driver drops to `Uninitialized` and returns `TimedOut`.
    pub fn query_ready(&mut self) -> Result<bool, Error> {
        self.check_running()?;
        if !self.is_measuring() {
            return Err(self.record(Error::NotMeasuring));
        }

        let now = self.clock.now();
        let elapsed = elapsed_ms(now, self.start_time);
        if elapsed < self.window_ms || elapsed_ms(now, self.poll_time) < POLL_INTERVAL_MS {
            return Ok(self.not_yet());
        }

        self.poll_time = now;
        self.status = AlsStatus::new(self.read_register(register::ALS_STATUS)?);
        if self.status.is_ready() {
            self.capture(now)?;
            return Ok(true);
        }

        if elapsed >= 2 * self.window_ms {
            return Err(self.fail(Error::TimedOut));
        }

        trace!(
            "LTR-329 not ready after {elapsed} ms, status {:#04x}",
            self.status.value()
        );
        Ok(self.not_yet())
    }

    /// Convert the last captured result to lux.
    ///
    /// Fails with `InvalidData` if there is no result, or the sensor flagged it as not new or
    /// not valid. Success leaves the last error alone.
    pub fn get_lux(&mut self) -> Result<f32, Error> {
        self.raw
            .compute_lux()
            .ok_or_else(|| self.record(Error::InvalidData))
    }

    /// Reset the sensor, aborting any measurement. `begin()` is needed afterwards.
    pub fn reset(&mut self) -> Result<(), Error> {
        self.check_running()?;
        self.write_register(
            register::ALS_CONTR,
            AlsContr::default().with_reset(true).value(),
        )?;
        self.raw = DataRegs::default();
        self.set_state(State::Uninitialized);
        self.last_error = None;
        Ok(())
    }

    /// Put the sensor in standby and stop the driver.
    pub fn end(&mut self) -> Result<(), Error> {
        if !self.is_running() {
            return Ok(());
        }
        // nothing has been written yet during the power-up delay
        if self.state > State::PowerOn {
            self.set_standby()?;
            if self.is_measuring() {
                self.set_state(State::Idle);
            }
        }
        self.set_state(State::End);
        Ok(())
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn current_state_name(&self) -> &'static str {
        self.state.name()
    }

    pub fn is_running(&self) -> bool {
        self.state > State::End
    }

    pub fn is_measuring(&self) -> bool {
        matches!(
            self.state,
            State::Single | State::Continuous | State::Ready
        )
    }

    /// The error recorded by the last operation that failed or had to wait, if it hasn't been
    /// cleared by a later success.
    pub fn last_error(&self) -> Option<Error> {
        self.last_error
    }

    pub fn last_error_name(&self) -> &'static str {
        result_name(self.last_error)
    }

    pub fn config(&self) -> MeasurementConfig {
        self.config
    }

    /// The last captured measurement, with the status and rate it was captured under.
    pub fn raw_data(&self) -> &DataRegs {
        &self.raw
    }

    /// Status register as of the last poll.
    pub fn status(&self) -> AlsStatus {
        self.status
    }

    pub fn product_info(&self) -> Option<ProductInfo> {
        self.product
    }

    fn capture(&mut self, now: u32) -> Result<(), Error> {
        let mut data = [0u8; DataRegs::SIZE];
        self.read_registers(register::ALS_DATA_CH1_0, &mut data)?;
        self.raw = DataRegs::new(data, self.status, self.meas_rate);

        if self.state == State::Single {
            self.set_standby()?;
            self.set_state(State::Idle);
        } else {
            // the next result is due one repeat period from now
            self.start_time = now;
            self.window_ms = self.meas_rate.rate().into();
        }
        self.last_error = None;
        Ok(())
    }

    fn set_standby(&mut self) -> Result<(), Error> {
        self.control = self.control.with_active(false);
        self.write_register(register::ALS_CONTR, self.control.value())
    }

    fn start_window(&mut self, window_ms: u32) {
        self.start_time = self.clock.now();
        self.window_ms = window_ms;
    }

    fn window_elapsed(&mut self) -> bool {
        elapsed_ms(self.clock.now(), self.start_time) >= self.window_ms
    }

    fn set_state(&mut self, state: State) {
        let from = self.state;
        if from == state {
            return;
        }
        self.state = state;
        debug!("LTR-329 state {} -> {}", from.name(), state.name());
        if let Some(hook) = self.on_transition.as_mut() {
            hook(from, state);
        }
    }

    fn check_running(&mut self) -> Result<(), Error> {
        if self.is_running() {
            Ok(())
        } else {
            Err(self.record(Error::Uninitialized))
        }
    }

    fn record(&mut self, e: Error) -> Error {
        self.last_error = Some(e);
        e
    }

    /// Record a fatal error and drop back to `Uninitialized`.
    fn fail(&mut self, e: Error) -> Error {
        warn!("LTR-329 {}: {e}", e.name());
        self.set_state(State::Uninitialized);
        self.record(e)
    }

    fn not_yet(&mut self) -> bool {
        self.last_error = Some(Error::Busy);
        false
    }

    fn write_register(&mut self, register: u8, value: u8) -> Result<(), Error> {
        trace!("LTR-329 write {register:#04x} <- {value:#04x}");
        self.bus
            .write_register(register, value)
            .map_err(|e| self.fail(e.into()))
    }

    fn read_register(&mut self, register: u8) -> Result<u8, Error> {
        let mut buf = [0u8; 1];
        self.read_registers(register, &mut buf)?;
        Ok(buf[0])
    }

    fn read_registers(&mut self, register: u8, buf: &mut [u8]) -> Result<(), Error> {
        if buf.is_empty() || buf.len() > MAX_READ {
            return Err(self.record(Error::InternalInvalidParameter));
        }

        let count = self
            .bus
            .read_registers(register, buf)
            .map_err(|e| self.fail(e.into()))?;
        if count < buf.len() {
            Err(self.fail(Error::I2cReadShort))
        } else if count > buf.len() {
            Err(self.fail(Error::I2cReadLong))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::BusError;
    use embedded_hal::i2c::ErrorKind;
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTransaction};
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    const ADDR: u8 = 0x29;

    /// Manually driven clock. With a non-zero `step` it also advances on every read, which is
    /// what the blocking `begin()` needs.
    #[derive(Clone, Default)]
    struct TestClock {
        now: Rc<Cell<u32>>,
        step: u32,
    }

    impl TestClock {
        fn starting_at(t: u32) -> Self {
            TestClock {
                now: Rc::new(Cell::new(t)),
                step: 0,
            }
        }

        fn stepping() -> Self {
            TestClock {
                step: 1,
                ..TestClock::starting_at(0)
            }
        }

        fn advance(&self, ms: u32) {
            self.now.set(self.now.get().wrapping_add(ms));
        }
    }

    impl Clock for TestClock {
        fn now(&mut self) -> u32 {
            let t = self.now.get();
            self.now.set(t.wrapping_add(self.step));
            t
        }
    }

    type Sensor = Ltr329<I2cBus<I2cMock>, TestClock>;

    fn id_read(part: u8, manufac: u8) -> I2cTransaction {
        I2cTransaction::write_read(ADDR, vec![register::PART_ID], vec![part, manufac])
    }

    fn write(register: u8, value: u8) -> I2cTransaction {
        I2cTransaction::write(ADDR, vec![register, value])
    }

    fn read(register: u8, data: Vec<u8>) -> I2cTransaction {
        I2cTransaction::write_read(ADDR, vec![register], data)
    }

    /// Bus traffic of a successful bring-up with the default configuration.
    fn begin_transactions() -> Vec<I2cTransaction> {
        vec![
            id_read(0xA0, 0x05),
            write(register::ALS_CONTR, 0x00),
            write(register::ALS_MEAS_RATE, 0x04),
        ]
    }

    /// Sensor that has gone through `begin()`, followed by `rest` on the bus.
    fn idle_sensor(clock: &TestClock, rest: &[I2cTransaction]) -> Sensor {
        let mut expectations = begin_transactions();
        expectations.extend_from_slice(rest);
        let mut sensor = Ltr329::from_i2c(I2cMock::new(&expectations), clock.clone());

        assert_eq!(Ok(false), sensor.poll_begin());
        clock.advance(INITIAL_DELAY_MS);
        assert_eq!(Ok(false), sensor.poll_begin());
        clock.advance(WAKEUP_DELAY_MS);
        assert_eq!(Ok(true), sensor.poll_begin());
        assert_eq!(State::Idle, sensor.state());
        sensor
    }

    fn done(sensor: Sensor) {
        let (bus, _) = sensor.release();
        bus.release().done();
    }

    #[test]
    fn bring_up_waits_for_delays() {
        let clock = TestClock::starting_at(1000);
        let mut sensor = Ltr329::from_i2c(I2cMock::new(&begin_transactions()), clock.clone());
        assert!(!sensor.is_running());

        assert_eq!(Ok(false), sensor.poll_begin());
        assert_eq!(State::PowerOn, sensor.state());
        assert_eq!(Some(Error::Busy), sensor.last_error());

        // power-up delay not over: no bus traffic
        clock.advance(INITIAL_DELAY_MS - 1);
        assert_eq!(Ok(false), sensor.poll_begin());
        assert_eq!(State::PowerOn, sensor.state());
        assert_eq!(None, sensor.product_info());

        // IDs are checked once the delay is over
        clock.advance(1);
        assert_eq!(Ok(false), sensor.poll_begin());
        assert_eq!(State::Initial, sensor.state());

        clock.advance(WAKEUP_DELAY_MS - 1);
        assert_eq!(Ok(false), sensor.poll_begin());
        clock.advance(1);
        assert_eq!(Ok(true), sensor.poll_begin());
        assert_eq!(State::Idle, sensor.state());
        assert_eq!(None, sensor.last_error());
        assert_eq!(
            Some(ProductInfo {
                part_number: 0xA,
                revision: 0,
                manufacturer: 0x05
            }),
            sensor.product_info()
        );

        // already running
        assert_eq!(Ok(()), sensor.begin());
        done(sensor);
    }

    #[test]
    fn blocking_begin() {
        let clock = TestClock::stepping();
        let mut sensor = Ltr329::from_i2c(I2cMock::new(&begin_transactions()), clock.clone());

        assert_eq!(Ok(()), sensor.begin());
        assert_eq!(State::Idle, sensor.state());
        assert!(clock.now.get() >= INITIAL_DELAY_MS + WAKEUP_DELAY_MS);
        // IDs are cached; asking for them again costs no bus traffic
        assert_eq!(Some(0xA), sensor.product_info().map(|info| info.part_number));
        done(sensor);
    }

    #[test]
    fn begin_rejects_wrong_part() {
        let clock = TestClock::stepping();
        let mut sensor = Ltr329::from_i2c(I2cMock::new(&[id_read(0xB0, 0x05)]), clock);

        let expected = Error::PartIdMismatch {
            part: 0xB,
            manufacturer: 0x05,
        };
        assert_eq!(Err(expected), sensor.begin());
        assert_eq!(State::Uninitialized, sensor.state());
        assert_eq!(Some(expected), sensor.last_error());
        assert_eq!("PartIdMismatch", sensor.last_error_name());
        done(sensor);
    }

    #[test]
    fn begin_read_failure() {
        let clock = TestClock::stepping();
        let expectations = [id_read(0xA0, 0x05).with_error(ErrorKind::Other)];
        let mut sensor = Ltr329::from_i2c(I2cMock::new(&expectations), clock);

        assert_eq!(Err(Error::I2cReadRequest(ErrorKind::Other)), sensor.begin());
        assert_eq!(State::Uninitialized, sensor.state());
        done(sensor);
    }

    #[test]
    fn operations_need_begin() {
        let clock = TestClock::starting_at(0);
        let mut sensor = Ltr329::from_i2c(I2cMock::new(&[]), clock);

        assert_eq!(Err(Error::Uninitialized), sensor.query_ready());
        assert_eq!(Err(Error::Uninitialized), sensor.start_single_measurement());
        assert_eq!(Err(Error::Uninitialized), sensor.reset());
        assert_eq!(Some(Error::Uninitialized), sensor.last_error());
        done(sensor);
    }

    #[test]
    fn query_without_measurement() {
        let clock = TestClock::starting_at(0);
        let mut sensor = idle_sensor(&clock, &[]);

        assert_eq!(Err(Error::NotMeasuring), sensor.query_ready());
        assert_eq!(Some(Error::NotMeasuring), sensor.last_error());
        assert_eq!(State::Idle, sensor.state());
        done(sensor);
    }

    #[test]
    fn single_measurement() {
        let clock = TestClock::starting_at(0);
        let mut sensor = idle_sensor(
            &clock,
            &[
                // 200 ms integration, 2000 ms rate; gain 4, active
                write(register::ALS_MEAS_RATE, 0x15),
                write(register::ALS_CONTR, 0x09),
                // new, valid, gain 4
                read(register::ALS_STATUS, vec![0x24]),
                // ch1 = 100, ch0 = 1000
                read(register::ALS_DATA_CH1_0, vec![100, 0, 0xE8, 0x03]),
                write(register::ALS_CONTR, 0x08),
            ],
        );

        sensor.configure(MeasurementConfig::new(4, 200, 500)).unwrap();
        sensor.start_single_measurement().unwrap();
        assert_eq!(State::Single, sensor.state());

        clock.advance(199);
        assert_eq!(Ok(false), sensor.query_ready());
        assert_eq!(Some(Error::Busy), sensor.last_error());

        clock.advance(1);
        assert_eq!(Ok(true), sensor.query_ready());
        assert_eq!(State::Idle, sensor.state());
        assert_eq!(None, sensor.last_error());

        let raw = *sensor.raw_data();
        assert_eq!(1000, raw.chan0());
        assert_eq!(100, raw.chan1());
        assert_eq!(200, raw.integration_time());

        let lux = sensor.get_lux().unwrap();
        assert!((lux - 235.611_24).abs() < 1e-3, "lux = {lux}");
        done(sensor);
    }

    #[test]
    fn default_configuration_end_to_end() {
        let clock = TestClock::starting_at(0);
        let mut sensor = idle_sensor(
            &clock,
            &[
                write(register::ALS_MEAS_RATE, 0x05),
                write(register::ALS_CONTR, 0x01),
                read(register::ALS_STATUS, vec![0x04]),
                read(register::ALS_DATA_CH1_0, vec![0x20, 0x00, 0x00, 0x01]),
                write(register::ALS_CONTR, 0x00),
            ],
        );

        sensor.configure(MeasurementConfig::new(1, 100, 1000)).unwrap();
        sensor.start_single_measurement().unwrap();
        clock.advance(120);
        assert_eq!(Ok(true), sensor.query_ready());

        let lux = sensor.get_lux().unwrap();
        assert!(lux.is_finite() && lux >= 0.0, "lux = {lux}");
        done(sensor);
    }

    #[test]
    fn polls_are_rate_limited() {
        let clock = TestClock::starting_at(0);
        let mut sensor = idle_sensor(
            &clock,
            &[
                write(register::ALS_MEAS_RATE, 0x05),
                write(register::ALS_CONTR, 0x01),
                read(register::ALS_STATUS, vec![0x00]),
                read(register::ALS_STATUS, vec![0x00]),
            ],
        );

        sensor.start_single_measurement().unwrap();
        clock.advance(100);
        assert_eq!(Ok(false), sensor.query_ready());
        // within the poll interval: no bus access
        clock.advance(POLL_INTERVAL_MS - 1);
        assert_eq!(Ok(false), sensor.query_ready());
        clock.advance(1);
        assert_eq!(Ok(false), sensor.query_ready());
        assert_eq!(Some(Error::Busy), sensor.last_error());
        assert_eq!(State::Single, sensor.state());
        done(sensor);
    }

    #[test]
    fn measurement_times_out() {
        let clock = TestClock::starting_at(0);
        let mut sensor = idle_sensor(
            &clock,
            &[
                write(register::ALS_MEAS_RATE, 0x05),
                write(register::ALS_CONTR, 0x01),
                // new but invalid
                read(register::ALS_STATUS, vec![0x84]),
                read(register::ALS_STATUS, vec![0x84]),
            ],
        );

        sensor.start_single_measurement().unwrap();
        clock.advance(100);
        assert_eq!(Ok(false), sensor.query_ready());
        clock.advance(100);
        assert_eq!(Err(Error::TimedOut), sensor.query_ready());
        assert_eq!(State::Uninitialized, sensor.state());
        assert_eq!(Some(Error::TimedOut), sensor.last_error());

        assert_eq!(Err(Error::Uninitialized), sensor.query_ready());
        done(sensor);
    }

    #[test]
    fn second_start() {
        let clock = TestClock::starting_at(0);
        let mut sensor = idle_sensor(
            &clock,
            &[
                write(register::ALS_MEAS_RATE, 0x05),
                write(register::ALS_CONTR, 0x01),
            ],
        );

        sensor.start_single_measurement().unwrap();
        // no second trigger on the bus
        assert_eq!(Ok(()), sensor.start_single_measurement());
        assert_eq!(Err(Error::Busy), sensor.start_continuous_measurement());
        assert_eq!(State::Single, sensor.state());
        assert_eq!(
            Err(Error::Busy),
            sensor.configure(MeasurementConfig::default())
        );
        done(sensor);
    }

    #[test]
    fn continuous_measurements() {
        let clock = TestClock::starting_at(0);
        let mut sensor = idle_sensor(
            &clock,
            &[
                // 100 ms integration, 500 ms rate
                write(register::ALS_MEAS_RATE, 0x03),
                write(register::ALS_CONTR, 0x01),
                read(register::ALS_STATUS, vec![0x04]),
                read(register::ALS_DATA_CH1_0, vec![0, 0, 100, 0]),
                read(register::ALS_STATUS, vec![0x04]),
                read(register::ALS_DATA_CH1_0, vec![0, 0, 200, 0]),
            ],
        );

        sensor.configure(MeasurementConfig::new(1, 100, 500)).unwrap();
        sensor.start_continuous_measurement().unwrap();
        assert_eq!(Err(Error::Busy), sensor.start_single_measurement());

        clock.advance(100);
        assert_eq!(Ok(true), sensor.query_ready());
        assert_eq!(State::Continuous, sensor.state());
        assert!((sensor.get_lux().unwrap() - 177.43).abs() < 1e-3);

        // next result is a repeat period away
        clock.advance(400);
        assert_eq!(Ok(false), sensor.query_ready());
        clock.advance(100);
        assert_eq!(Ok(true), sensor.query_ready());
        assert_eq!(200, sensor.raw_data().chan0());
        assert_eq!(State::Continuous, sensor.state());
        done(sensor);
    }

    #[test]
    fn continuous_measurement_times_out() {
        let clock = TestClock::starting_at(0);
        let mut sensor = idle_sensor(
            &clock,
            &[
                write(register::ALS_MEAS_RATE, 0x03),
                write(register::ALS_CONTR, 0x01),
                read(register::ALS_STATUS, vec![0x04]),
                read(register::ALS_DATA_CH1_0, vec![0, 0, 100, 0]),
                // sensor stops delivering
                read(register::ALS_STATUS, vec![0x00]),
                read(register::ALS_STATUS, vec![0x00]),
            ],
        );

        sensor.configure(MeasurementConfig::new(1, 100, 500)).unwrap();
        sensor.start_continuous_measurement().unwrap();
        clock.advance(100);
        assert_eq!(Ok(true), sensor.query_ready());

        // timeout is twice the repeat period after the last capture
        clock.advance(500);
        assert_eq!(Ok(false), sensor.query_ready());
        assert_eq!(State::Continuous, sensor.state());
        clock.advance(500);
        assert_eq!(Err(Error::TimedOut), sensor.query_ready());
        assert_eq!(State::Uninitialized, sensor.state());
        assert_eq!(Some(Error::TimedOut), sensor.last_error());
        done(sensor);
    }

    #[test]
    fn measurement_across_clock_wrap() {
        let clock = TestClock::starting_at(u32::MAX - 150);
        let mut sensor = idle_sensor(
            &clock,
            &[
                write(register::ALS_MEAS_RATE, 0x05),
                write(register::ALS_CONTR, 0x01),
                read(register::ALS_STATUS, vec![0x04]),
                read(register::ALS_DATA_CH1_0, vec![0, 0, 1, 0]),
                write(register::ALS_CONTR, 0x00),
            ],
        );

        sensor.start_single_measurement().unwrap();
        clock.advance(50);
        assert_eq!(Ok(false), sensor.query_ready());
        clock.advance(50);
        assert_eq!(Ok(true), sensor.query_ready());
        done(sensor);
    }

    #[test]
    fn configure_validation() {
        let clock = TestClock::starting_at(0);
        let mut sensor = Ltr329::from_i2c(I2cMock::new(&[]), clock);

        assert_eq!(
            Err(Error::InvalidParameter),
            sensor.configure(MeasurementConfig::new(1, 200, 100))
        );
        assert_eq!(
            Err(Error::InvalidParameter),
            sensor.configure(MeasurementConfig::new(3, 100, 1000))
        );
        assert_eq!(
            Err(Error::InvalidParameter),
            sensor.configure(MeasurementConfig::new(1, 125, 1000))
        );
        assert_eq!(
            Err(Error::InvalidParameter),
            sensor.configure(MeasurementConfig::new(1, 100, 1500))
        );
        assert_eq!(Some(Error::InvalidParameter), sensor.last_error());
        assert_eq!(MeasurementConfig::default(), sensor.config());

        let config = MeasurementConfig::new(96, 400, 2000);
        assert_eq!(Ok(()), sensor.configure(config));
        assert_eq!(None, sensor.last_error());
        assert_eq!(config, sensor.config());
        done(sensor);
    }

    #[test]
    fn lux_needs_fresh_data() {
        let clock = TestClock::starting_at(0);
        let mut sensor = idle_sensor(
            &clock,
            &[
                write(register::ALS_MEAS_RATE, 0x05),
                write(register::ALS_CONTR, 0x01),
                read(register::ALS_STATUS, vec![0x04]),
                read(register::ALS_DATA_CH1_0, vec![0, 0, 100, 0]),
                write(register::ALS_CONTR, 0x00),
            ],
        );

        assert_eq!(Err(Error::InvalidData), sensor.get_lux());
        assert_eq!(Some(Error::InvalidData), sensor.last_error());

        sensor.start_single_measurement().unwrap();
        clock.advance(100);
        assert_eq!(Ok(true), sensor.query_ready());

        // a successful conversion leaves the last error alone
        assert_eq!(Err(Error::NotMeasuring), sensor.query_ready());
        assert!(sensor.get_lux().is_ok());
        assert_eq!(Some(Error::NotMeasuring), sensor.last_error());
        done(sensor);
    }

    #[test]
    fn reset_aborts_measurement() {
        let clock = TestClock::starting_at(0);
        let mut sensor = idle_sensor(
            &clock,
            &[
                write(register::ALS_MEAS_RATE, 0x05),
                write(register::ALS_CONTR, 0x01),
                write(register::ALS_CONTR, 0x02),
            ],
        );

        sensor.start_single_measurement().unwrap();
        assert_eq!(Ok(()), sensor.reset());
        assert_eq!(State::Uninitialized, sensor.state());
        assert!(!sensor.is_running());
        done(sensor);
    }

    #[test]
    fn end_and_restart() {
        let clock = TestClock::starting_at(0);
        let mut rest = vec![write(register::ALS_CONTR, 0x00)];
        rest.extend(begin_transactions());
        let mut sensor = idle_sensor(&clock, &rest);

        assert_eq!(Ok(()), sensor.end());
        assert_eq!(State::End, sensor.state());
        assert!(!sensor.is_running());
        assert_eq!(Ok(()), sensor.end());

        assert_eq!(Ok(false), sensor.poll_begin());
        clock.advance(INITIAL_DELAY_MS);
        assert_eq!(Ok(false), sensor.poll_begin());
        clock.advance(WAKEUP_DELAY_MS);
        assert_eq!(Ok(true), sensor.poll_begin());
        done(sensor);
    }

    #[test]
    fn end_during_measurement_goes_through_idle() {
        let clock = TestClock::starting_at(0);
        let mut sensor = idle_sensor(
            &clock,
            &[
                write(register::ALS_MEAS_RATE, 0x05),
                write(register::ALS_CONTR, 0x01),
                write(register::ALS_CONTR, 0x00),
            ],
        );
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = seen.clone();
        sensor.on_transition(move |from, to| log.borrow_mut().push((from, to)));

        sensor.start_single_measurement().unwrap();
        sensor.end().unwrap();

        assert_eq!(
            vec![
                (State::Idle, State::Single),
                (State::Single, State::Idle),
                (State::Idle, State::End),
            ],
            *seen.borrow()
        );
        done(sensor);
    }

    #[test]
    fn write_failure_is_fatal() {
        let clock = TestClock::starting_at(0);
        let mut sensor = idle_sensor(
            &clock,
            &[write(register::ALS_MEAS_RATE, 0x05).with_error(ErrorKind::Bus)],
        );

        assert_eq!(
            Err(Error::I2cWriteFailed(ErrorKind::Bus)),
            sensor.start_single_measurement()
        );
        assert_eq!(State::Uninitialized, sensor.state());
        done(sensor);
    }

    /// Bus that answers every read with a fixed byte count.
    struct CountingBus {
        count: usize,
    }

    impl RegisterBus for CountingBus {
        fn write_register(&mut self, _register: u8, _value: u8) -> Result<(), BusError> {
            Ok(())
        }

        fn read_registers(&mut self, _register: u8, buf: &mut [u8]) -> Result<usize, BusError> {
            buf.fill(0);
            Ok(self.count)
        }
    }

    #[test]
    fn short_and_long_reads() {
        let mut sensor = Ltr329::new(CountingBus { count: 1 }, TestClock::stepping());
        assert_eq!(Err(Error::I2cReadShort), sensor.begin());
        assert_eq!(State::Uninitialized, sensor.state());

        let mut sensor = Ltr329::new(CountingBus { count: 3 }, TestClock::stepping());
        assert_eq!(Err(Error::I2cReadLong), sensor.begin());
        assert_eq!("I2cReadLong", sensor.last_error_name());
    }

    #[test]
    fn state_names() {
        assert_eq!("Uninitialized", State::Uninitialized.name());
        assert_eq!("PowerOn", State::PowerOn.name());
        assert_eq!("Continuous", State::Continuous.name());
        assert_eq!("Ready", State::Ready.name());

        let sensor = Ltr329::new(CountingBus { count: 2 }, TestClock::starting_at(0));
        assert_eq!("Uninitialized", sensor.current_state_name());
        assert_eq!("Success", sensor.last_error_name());
    }
}
