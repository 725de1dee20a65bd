//! [`RegisterBus`] over a blocking `embedded-hal` I2C peripheral
//!
//! Used on boards whose HAL already sequences the transfer in hardware. Bus
//! errors are mapped with the HAL error's `Into<I2cError>`.

use embedded_hal::blocking::delay::DelayMs;
use embedded_hal::blocking::i2c::{Write, WriteRead};
use heapless::Vec;

use super::RegisterBus;
use crate::sensors::error::I2cError;

/// Largest register burst a single `write_bytes` call can carry
pub const MAX_WRITE: usize = 32;

pub struct HalBus<I, D> {
    i2c: I,
    delay: D,
}

impl<I, D> HalBus<I, D> {
    pub fn new(i2c: I, delay: D) -> Self {
        Self { i2c, delay }
    }

    pub fn release(self) -> (I, D) {
        (self.i2c, self.delay)
    }
}

impl<I, D, E> RegisterBus for HalBus<I, D>
where
    I: Write<Error = E> + WriteRead<Error = E>,
    E: Into<I2cError>,
    D: DelayMs<u32>,
{
    fn write_byte(&mut self, slave: u8, register: u8, value: u8) -> Result<(), I2cError> {
        self.i2c.write(slave, &[register, value]).map_err(Into::into)
    }

    // the peripheral blocks until STOP, there is nothing to return early from
    fn write_byte_nb(&mut self, slave: u8, register: u8, value: u8) -> Result<(), I2cError> {
        self.write_byte(slave, register, value)
    }

    fn write_bytes(&mut self, slave: u8, register: u8, data: &[u8]) -> Result<(), I2cError> {
        if data.is_empty() {
            return Err(I2cError::EmptyTransfer);
        }
        let mut frame: Vec<u8, { MAX_WRITE + 1 }> = Vec::new();
        frame.push(register).map_err(|_| I2cError::Bus)?;
        frame.extend_from_slice(data).map_err(|_| I2cError::Bus)?;
        self.i2c.write(slave, &frame).map_err(Into::into)
    }

    fn read_byte(&mut self, slave: u8, register: u8) -> Result<u8, I2cError> {
        let mut buffer = [0u8; 1];
        self.read_bytes(slave, register, &mut buffer)?;
        Ok(buffer[0])
    }

    fn read_bytes(&mut self, slave: u8, register: u8, buffer: &mut [u8]) -> Result<(), I2cError> {
        if buffer.is_empty() {
            return Err(I2cError::EmptyTransfer);
        }
        self.i2c
            .write_read(slave, &[register], buffer)
            .map_err(Into::into)
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Nack;

    impl From<Nack> for I2cError {
        fn from(_: Nack) -> Self {
            I2cError::NoAck
        }
    }

    struct FakeI2c {
        writes: std::vec::Vec<(u8, std::vec::Vec<u8>)>,
        regs: [u8; 128],
        present: u8,
    }

    impl Write for FakeI2c {
        type Error = Nack;

        fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), Nack> {
            if address != self.present {
                return Err(Nack);
            }
            self.writes.push((address, bytes.to_vec()));
            let start = bytes[0] as usize;
            for (i, b) in bytes[1..].iter().enumerate() {
                self.regs[start + i] = *b;
            }
            Ok(())
        }
    }

    impl WriteRead for FakeI2c {
        type Error = Nack;

        fn write_read(&mut self, address: u8, bytes: &[u8], buffer: &mut [u8]) -> Result<(), Nack> {
            if address != self.present {
                return Err(Nack);
            }
            let start = bytes[0] as usize;
            buffer.copy_from_slice(&self.regs[start..start + buffer.len()]);
            Ok(())
        }
    }

    struct NoDelay(u32);

    impl DelayMs<u32> for NoDelay {
        fn delay_ms(&mut self, ms: u32) {
            self.0 += ms;
        }
    }

    fn bus() -> HalBus<FakeI2c, NoDelay> {
        let i2c = FakeI2c {
            writes: std::vec::Vec::new(),
            regs: [0; 128],
            present: 0x68,
        };
        HalBus::new(i2c, NoDelay(0))
    }

    #[test]
    fn register_address_leads_every_write() {
        let mut bus = bus();
        bus.write_bytes(0x68, 0x19, &[1, 2]).unwrap();
        bus.write_byte(0x68, 0x6B, 0x80).unwrap();

        let (i2c, _) = bus.release();
        assert_eq!(i2c.writes[0], (0x68, vec![0x19, 1, 2]));
        assert_eq!(i2c.writes[1], (0x68, vec![0x6B, 0x80]));
    }

    #[test]
    fn reads_come_back_from_consecutive_registers() {
        let mut bus = bus();
        bus.write_bytes(0x68, 0x3B, &[9, 8, 7]).unwrap();

        let mut buf = [0u8; 3];
        bus.read_bytes(0x68, 0x3B, &mut buf).unwrap();
        assert_eq!(buf, [9, 8, 7]);
        assert_eq!(bus.read_byte(0x68, 0x3C), Ok(8));
    }

    #[test]
    fn hal_errors_are_mapped() {
        let mut bus = bus();
        assert_eq!(bus.read_byte(0x50, 0x75), Err(I2cError::NoAck));
        assert_eq!(bus.write_bytes(0x68, 0x19, &[]), Err(I2cError::EmptyTransfer));
    }

    #[test]
    fn oversized_burst_is_rejected() {
        let mut bus = bus();
        let data = [0u8; MAX_WRITE + 1];
        assert_eq!(bus.write_bytes(0x68, 0x00, &data), Err(I2cError::Bus));

        bus.delay_ms(50);
        let (i2c, delay) = bus.release();
        assert!(i2c.writes.is_empty());
        assert_eq!(delay.0, 50);
    }
}
