//! RP2040 bindings for the pipeline's hardware traits
//!
//! - MPU-9250 INT on GPIO26, pulled up; the chip drives a 50 us active-low
//!   pulse, latched by the pad's EdgeLow detector
//! - I2C0 goes through [`HalBus`](crate::hal::HalBus), errors mapped below
//! - the 1 MHz system timer is the clock

use rp2040_hal as rp;
use rp::gpio::bank0::Gpio26;
use rp::gpio::{Interrupt, Pin, PullUpInput};

use crate::hal::{Clock, EdgeInterrupt};
use crate::sensors::error::I2cError;

pub type IntPin = Pin<Gpio26, PullUpInput>;

pub struct DataReadyPin {
    pin: IntPin,
    enabled: bool,
}

impl DataReadyPin {
    pub fn new(pin: IntPin) -> Self {
        pin.set_interrupt_enabled(Interrupt::EdgeLow, false);
        Self { pin, enabled: false }
    }
}

impl EdgeInterrupt for DataReadyPin {
    fn enable(&mut self) {
        // raw status keeps latching while the pin is masked
        self.pin.clear_interrupt(Interrupt::EdgeLow);
        self.pin.set_interrupt_enabled(Interrupt::EdgeLow, true);
        self.enabled = true;
    }

    fn disable(&mut self) {
        self.pin.set_interrupt_enabled(Interrupt::EdgeLow, false);
        self.enabled = false;
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn clear_and_test(&mut self) -> bool {
        let hit = self.pin.interrupt_status(Interrupt::EdgeLow);
        if hit {
            self.pin.clear_interrupt(Interrupt::EdgeLow);
        }
        hit
    }
}

pub struct BoardClock(rp::Timer);

impl BoardClock {
    pub fn new(timer: rp::Timer) -> Self {
        Self(timer)
    }
}

impl Clock for BoardClock {
    fn now_us(&self) -> u64 {
        self.0.get_counter().ticks()
    }
}

impl From<rp::i2c::Error> for I2cError {
    fn from(e: rp::i2c::Error) -> Self {
        match e {
            // IC_TX_ABRT_SOURCE
            rp::i2c::Error::Abort(v) => {
                if v & 1 << 12 != 0 {
                    I2cError::ArbitrationLost
                } else if v & (1 << 0 | 1 << 3) != 0 {
                    // ABRT_7B_ADDR_NOACK / ABRT_TXDATA_NOACK
                    I2cError::NoAck
                } else {
                    I2cError::Bus
                }
            }
            rp::i2c::Error::InvalidReadBufferLength | rp::i2c::Error::InvalidWriteBufferLength => {
                I2cError::EmptyTransfer
            }
            _ => I2cError::Bus,
        }
    }
}
