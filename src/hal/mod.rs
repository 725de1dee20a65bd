//! Hardware boundary
//!
//! The pipeline only ever touches hardware through the traits in this module:
//! - [`BusController`]: a register-level I2C master (address, data, burst
//!   commands, busy flag), driven by the [`I2cSequencer`]
//! - [`EdgeInterrupt`]: the sensor's data-ready pin
//! - [`Clock`]: a free running microsecond counter
//! - [`RegisterBus`]: register-addressed byte transactions, what sensor
//!   drivers are written against

pub mod hal_bus;
pub mod sequencer;

#[cfg(test)]
pub(crate) mod mock;

pub use hal_bus::HalBus;
pub use sequencer::I2cSequencer;

use crate::sensors::error::I2cError;

/// Transfer direction for the next bus phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    Write,
    Read,
}

/// Commands understood by the bus controller's master state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MasterCommand {
    /// START, one byte, STOP
    SingleSend,
    /// (repeated) START, one byte in, NACK, STOP
    SingleReceive,
    /// START and first byte, bus held
    BurstSendStart,
    BurstSendCont,
    /// last byte then STOP
    BurstSendFinish,
    BurstSendErrorStop,
    BurstReceiveStart,
    BurstReceiveCont,
    BurstReceiveFinish,
    BurstReceiveErrorStop,
}

/// Fault latched by the controller during the last command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusFault {
    AddressNack,
    DataNack,
    ArbitrationLost,
}

impl From<BusFault> for I2cError {
    fn from(fault: BusFault) -> Self {
        match fault {
            BusFault::AddressNack | BusFault::DataNack => I2cError::NoAck,
            BusFault::ArbitrationLost => I2cError::ArbitrationLost,
        }
    }
}

/// Register-level I2C master controller
///
/// # Safety Invariants
///
/// - Only one owner per controller instance
/// - A new command must not be issued while `is_busy()` is true
pub trait BusController {
    fn set_slave_address(&mut self, address: u8, direction: Direction);

    /// Load the byte the next send command puts on the wire
    fn put_data(&mut self, byte: u8);

    /// Byte received by the last receive command, in the low 8 bits
    fn get_data(&mut self) -> u32;

    fn command(&mut self, command: MasterCommand);

    fn is_busy(&self) -> bool;

    /// Return and clear the fault latched by the last command
    fn take_fault(&mut self) -> Option<BusFault>;
}

/// Falling-edge interrupt on the sensor's INT pin
pub trait EdgeInterrupt {
    /// Discard any edge latched while masked, then unmask the pin at the
    /// interrupt controller
    fn enable(&mut self);

    fn disable(&mut self);

    fn is_enabled(&self) -> bool;

    /// Clear this pin's interrupt status and report whether it was set.
    ///
    /// Pins on the same port share one vector, so `false` means the interrupt
    /// belongs to someone else.
    fn clear_and_test(&mut self) -> bool;
}

/// Free running microsecond counter
pub trait Clock {
    fn now_us(&self) -> u64;
}

/// Register-addressed transactions against a 7-bit slave address
///
/// Every operation is fallible; nothing is retried at this layer.
pub trait RegisterBus {
    /// Write one register and wait for the bus to go idle
    fn write_byte(&mut self, slave: u8, register: u8, value: u8) -> Result<(), I2cError>;

    /// Write one register and return once the STOP is issued.
    ///
    /// The caller must let the transfer finish before the bus is used again.
    fn write_byte_nb(&mut self, slave: u8, register: u8, value: u8) -> Result<(), I2cError>;

    /// Write consecutive registers starting at `register`
    fn write_bytes(&mut self, slave: u8, register: u8, data: &[u8]) -> Result<(), I2cError>;

    fn read_byte(&mut self, slave: u8, register: u8) -> Result<u8, I2cError>;

    /// Fill `buffer` from consecutive registers starting at `register`
    fn read_bytes(&mut self, slave: u8, register: u8, buffer: &mut [u8]) -> Result<(), I2cError>;

    /// Block the calling context with the bus left idle
    fn delay_ms(&mut self, ms: u32);
}
