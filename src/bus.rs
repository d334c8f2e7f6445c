//! Register-level transport to the sensor.
//!
//! The engine only ever needs two transactions: write one register, and read a run of registers
//! starting at an address. [`I2cBus`] provides them over any `embedded-hal` I2C bus.
use embedded_hal::i2c::{Error as _, ErrorKind, I2c, SevenBitAddress};
use thiserror::Error;

use crate::regs::I2C_ADDR;

/// Largest single read the transport has to support.
pub const MAX_READ: usize = 32;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    #[error("read request failed: {0}")]
    ReadRequest(ErrorKind),
    #[error("write failed: {0}")]
    WriteFailed(ErrorKind),
}

pub trait RegisterBus {
    fn write_register(&mut self, register: u8, value: u8) -> Result<(), BusError>;

    /// Read `buf.len()` consecutive registers starting at `register`.
    ///
    /// Returns the number of bytes the device delivered, which the caller checks against the
    /// buffer size.
    fn read_registers(&mut self, register: u8, buf: &mut [u8]) -> Result<usize, BusError>;
}

impl<B: RegisterBus + ?Sized> RegisterBus for &mut B {
    fn write_register(&mut self, register: u8, value: u8) -> Result<(), BusError> {
        (**self).write_register(register, value)
    }

    fn read_registers(&mut self, register: u8, buf: &mut [u8]) -> Result<usize, BusError> {
        (**self).read_registers(register, buf)
    }
}

/// [`RegisterBus`] over an `embedded-hal` I2C bus.
#[derive(Debug)]
pub struct I2cBus<I> {
    i2c: I,
    address: SevenBitAddress,
}

impl<I: I2c> I2cBus<I> {
    /// Talk to the sensor at its fixed address.
    pub fn new(i2c: I) -> Self {
        Self::with_address(i2c, I2C_ADDR)
    }

    pub fn with_address(i2c: I, address: SevenBitAddress) -> Self {
        I2cBus { i2c, address }
    }

    pub fn release(self) -> I {
        self.i2c
    }
}

impl<I: I2c> RegisterBus for I2cBus<I> {
    fn write_register(&mut self, register: u8, value: u8) -> Result<(), BusError> {
        self.i2c
            .write(self.address, &[register, value])
            .map_err(|e| BusError::WriteFailed(e.kind()))
    }

    fn read_registers(&mut self, register: u8, buf: &mut [u8]) -> Result<usize, BusError> {
        self.i2c
            .write_read(self.address, &[register], buf)
            .map_err(|e| BusError::ReadRequest(e.kind()))?;
        Ok(buf.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTransaction};

    #[test]
    fn write_register() {
        let expectations = [I2cTransaction::write(0x29, vec![0x80, 0x01])];
        let mut bus = I2cBus::new(I2cMock::new(&expectations));

        bus.write_register(0x80, 0x01).unwrap();

        bus.release().done();
    }

    #[test]
    fn read_registers() {
        let expectations = [I2cTransaction::write_read(
            0x29,
            vec![0x88],
            vec![0x01, 0x02, 0x03, 0x04],
        )];
        let mut bus = I2cBus::new(I2cMock::new(&expectations));

        let mut buf = [0u8; 4];
        assert_eq!(4, bus.read_registers(0x88, &mut buf).unwrap());
        assert_eq!([0x01, 0x02, 0x03, 0x04], buf);

        bus.release().done();
    }

    #[test]
    fn errors_keep_hal_kind() {
        let expectations = [
            I2cTransaction::write(0x29, vec![0x80, 0x00]).with_error(ErrorKind::ArbitrationLoss),
            I2cTransaction::write_read(0x29, vec![0x8C], vec![0x00]).with_error(ErrorKind::Bus),
        ];
        let mut bus = I2cBus::new(I2cMock::new(&expectations));

        assert_eq!(
            Err(BusError::WriteFailed(ErrorKind::ArbitrationLoss)),
            bus.write_register(0x80, 0x00)
        );
        let mut buf = [0u8; 1];
        assert_eq!(
            Err(BusError::ReadRequest(ErrorKind::Bus)),
            bus.read_registers(0x8C, &mut buf)
        );

        bus.release().done();
    }
}
