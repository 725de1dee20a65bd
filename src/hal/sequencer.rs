//! I2C transaction sequencer
//!
//! Turns register reads and writes into the START / CONT / FINISH command
//! sequence of a [`BusController`]. After every command the sequencer waits the
//! fixed phase delay, then polls the busy flag with a bounded budget, then
//! checks the controller's fault latch.

use embedded_hal::blocking::delay::{DelayMs, DelayUs};

use super::{BusController, Direction, MasterCommand, RegisterBus};
use crate::config::BusTiming;
use crate::sensors::error::I2cError;

pub struct I2cSequencer<B, D> {
    bus: B,
    delay: D,
    timing: BusTiming,
}

impl<B, D> I2cSequencer<B, D>
where
    B: BusController,
    D: DelayUs<u32> + DelayMs<u32>,
{
    pub fn new(bus: B, delay: D, timing: BusTiming) -> Self {
        Self { bus, delay, timing }
    }

    pub fn release(self) -> (B, D) {
        (self.bus, self.delay)
    }

    /// Wait for a transfer started by [`RegisterBus::write_byte_nb`] to finish
    pub fn wait_until_idle(&mut self) -> Result<(), I2cError> {
        self.wait_idle()
    }

    fn wait_idle(&mut self) -> Result<(), I2cError> {
        self.delay.delay_us(self.timing.phase_delay.to_micros());
        let budget = self.timing.busy_timeout.to_micros();
        let mut waited: u32 = 0;
        while self.bus.is_busy() {
            if waited >= budget {
                log_warn!("i2c controller busy for {} us", waited);
                return Err(I2cError::Timeout);
            }
            self.delay.delay_us(1);
            waited += 1;
        }
        match self.bus.take_fault() {
            Some(fault) => Err(fault.into()),
            None => Ok(()),
        }
    }

    /// Issue `command` and wait for it. If the controller reports a fault and
    /// the bus is still held, `abort` releases it.
    #[inline(always)]
    fn phase(
        &mut self,
        command: MasterCommand,
        abort: Option<MasterCommand>,
    ) -> Result<(), I2cError> {
        self.bus.command(command);
        match self.wait_idle() {
            Ok(()) => Ok(()),
            Err(I2cError::Timeout) => Err(I2cError::Timeout),
            Err(e) => {
                if let Some(abort) = abort {
                    self.bus.command(abort);
                }
                Err(e)
            }
        }
    }

    /// Register address phase: START + register, bus held for what follows
    #[inline(always)]
    fn select_register(&mut self, slave: u8, register: u8) -> Result<(), I2cError> {
        self.bus.set_slave_address(slave, Direction::Write);
        self.bus.put_data(register);
        self.phase(
            MasterCommand::BurstSendStart,
            Some(MasterCommand::BurstSendErrorStop),
        )
    }

    #[inline(always)]
    fn received(&mut self) -> u8 {
        (self.bus.get_data() & 0xFF) as u8
    }
}

impl<B, D> RegisterBus for I2cSequencer<B, D>
where
    B: BusController,
    D: DelayUs<u32> + DelayMs<u32>,
{
    fn write_byte(&mut self, slave: u8, register: u8, value: u8) -> Result<(), I2cError> {
        self.select_register(slave, register)?;
        self.bus.put_data(value);
        self.phase(MasterCommand::BurstSendFinish, None)
    }

    fn write_byte_nb(&mut self, slave: u8, register: u8, value: u8) -> Result<(), I2cError> {
        self.select_register(slave, register)?;
        self.bus.put_data(value);
        self.bus.command(MasterCommand::BurstSendFinish);
        Ok(())
    }

    fn write_bytes(&mut self, slave: u8, register: u8, data: &[u8]) -> Result<(), I2cError> {
        let Some((last, body)) = data.split_last() else {
            return Err(I2cError::EmptyTransfer);
        };
        self.select_register(slave, register)?;
        for byte in body {
            self.bus.put_data(*byte);
            self.phase(
                MasterCommand::BurstSendCont,
                Some(MasterCommand::BurstSendErrorStop),
            )?;
        }
        self.bus.put_data(*last);
        self.phase(MasterCommand::BurstSendFinish, None)
    }

    fn read_byte(&mut self, slave: u8, register: u8) -> Result<u8, I2cError> {
        self.select_register(slave, register)?;
        self.bus.set_slave_address(slave, Direction::Read);
        self.phase(MasterCommand::SingleReceive, None)?;
        Ok(self.received())
    }

    fn read_bytes(&mut self, slave: u8, register: u8, buffer: &mut [u8]) -> Result<(), I2cError> {
        if buffer.is_empty() {
            return Err(I2cError::EmptyTransfer);
        }
        let last = buffer.len() - 1;

        self.select_register(slave, register)?;
        self.bus.set_slave_address(slave, Direction::Read);

        if last == 0 {
            self.phase(MasterCommand::SingleReceive, None)?;
        } else {
            self.phase(
                MasterCommand::BurstReceiveStart,
                Some(MasterCommand::BurstReceiveErrorStop),
            )?;
            buffer[0] = self.received();
            for slot in buffer[1..last].iter_mut() {
                self.phase(
                    MasterCommand::BurstReceiveCont,
                    Some(MasterCommand::BurstReceiveErrorStop),
                )?;
                *slot = self.received();
            }
            self.phase(MasterCommand::BurstReceiveFinish, None)?;
        }
        buffer[last] = self.received();
        Ok(())
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms);
    }
}
