//! MPU-9250 data-ready pipeline
//!
//! Owns the register bus, the motion processor, the INT pin and the clock.
//! Bring-up is split in two: [`Mpu9250::init_hardware`] checks the chip is
//! there, [`Mpu9250::init_firmware`] runs the DMP bring-up sequence. After
//! that, [`Mpu9250::on_interrupt`] is called from the pin's interrupt vector
//! and publishes one sample per data-ready edge into the [`SensorSession`].

use crate::config::SensorConfig;
use crate::hal::{Clock, EdgeInterrupt, RegisterBus};
use crate::math::Quaternion;
use crate::sensors::dmp::{orientation_matrix_to_scalar, MotionProcessor};
use crate::sensors::error::{BringUpStep, DmpError, I2cError, InitError, SensorError};
use crate::sensors::registers::{PWR_MGMT_1, PWR_MGMT_1_RESET, WHO_AM_I};
use crate::sensors::session::{Sample, SensorClass, SensorSession};

/// Callback run from interrupt context after each published sample
pub type DataHook<'a> = dyn FnMut(SensorClass, &[f32]) + Send + 'a;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PipelineState {
    /// Not listening; a sample latched before gating stays readable
    Idle,
    /// Interrupt armed, waiting for the next edge
    Listening,
    /// A sample is waiting for the consumer
    DataLatched,
}

/// What a call to [`Mpu9250::on_interrupt`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InterruptOutcome {
    /// One record drained and published. `backlog` is set when more records
    /// were queued; those are left for the next edge.
    Handled { backlog: bool },
    /// The shared vector fired for another pin
    Spurious,
    /// Not listening, nothing touched
    Gated,
}

pub struct Mpu9250<'a, B, P, I, C> {
    bus: B,
    dmp: P,
    int: I,
    clock: C,
    config: SensorConfig,
    session: &'a SensorSession,
    hook: Option<&'a mut DataHook<'a>>,
    listening: bool,
    last_sample_us: Option<u64>,
}

impl<'a, B, P, I, C> Mpu9250<'a, B, P, I, C>
where
    B: RegisterBus,
    P: MotionProcessor<B>,
    I: EdgeInterrupt,
    C: Clock,
{
    pub fn new(
        bus: B,
        dmp: P,
        int: I,
        clock: C,
        session: &'a SensorSession,
        config: SensorConfig,
    ) -> Self {
        Self {
            bus,
            dmp,
            int,
            clock,
            config,
            session,
            hook: None,
            listening: false,
            last_sample_us: None,
        }
    }

    pub fn config(&self) -> &SensorConfig {
        &self.config
    }

    pub fn session(&self) -> &'a SensorSession {
        self.session
    }

    /// Gate the INT pin, drop any stale edge and check the chip answers with
    /// the expected id
    pub fn init_hardware(&mut self) -> Result<(), InitError> {
        self.int.disable();
        self.int.clear_and_test();
        self.listening = false;
        self.last_sample_us = None;

        let id = self.device_id()?;
        if id != self.config.expected_id {
            log_error!(
                "WHO_AM_I {:#x}, expected {:#x}",
                id,
                self.config.expected_id
            );
            return Err(InitError::WrongDevice(id));
        }
        log_info!("MPU-9250 found at {:#x}", self.config.address);
        Ok(())
    }

    /// Run the DMP bring-up sequence. The firmware load is retried up to
    /// `firmware_load_attempts` times; every other step fails on first error.
    pub fn init_firmware(&mut self) -> Result<(), InitError> {
        let cfg = self.config;
        let bus = &mut self.bus;
        let dmp = &mut self.dmp;
        let at = |step: BringUpStep| move |e: DmpError| InitError::Dmp(step, e);

        dmp.init(bus).map_err(at(BringUpStep::Init))?;
        dmp.set_sensors(bus, cfg.sensors)
            .map_err(at(BringUpStep::SetSensors))?;
        dmp.configure_fifo(bus, cfg.fifo_sensors)
            .map_err(at(BringUpStep::ConfigureFifo))?;
        dmp.set_sample_rate(bus, cfg.sample_rate_hz)
            .map_err(at(BringUpStep::SetSampleRate))?;

        self.load_firmware()?;

        let bus = &mut self.bus;
        let dmp = &mut self.dmp;
        dmp.set_orientation(bus, orientation_matrix_to_scalar(&cfg.orientation))
            .map_err(at(BringUpStep::SetOrientation))?;
        dmp.enable_feature(bus, cfg.dmp_features)
            .map_err(at(BringUpStep::EnableFeature))?;
        dmp.set_fifo_rate(bus, cfg.fifo_rate_hz)
            .map_err(at(BringUpStep::SetFifoRate))?;
        dmp.set_dmp_state(bus, true)
            .map_err(at(BringUpStep::SetDmpState))?;

        log_info!("DMP running at {} Hz", cfg.fifo_rate_hz);
        Ok(())
    }

    fn load_firmware(&mut self) -> Result<(), InitError> {
        let attempts = self.config.firmware_load_attempts.max(1);
        let mut last = DmpError::NoFirmware;
        for attempt in 1..=attempts {
            match self.dmp.load_firmware(&mut self.bus) {
                Ok(()) => {
                    log_info!("DMP firmware loaded on attempt {}", attempt);
                    return Ok(());
                }
                Err(e) => {
                    log_warn!("firmware load {}/{} failed: {:?}", attempt, attempts, e);
                    last = e;
                }
            }
        }
        log_error!("giving up on DMP firmware, DMP not usable");
        Err(InitError::FirmwareLoadFailed { attempts, last })
    }

    /// Soft reset. The reset write is not waited on; the bus is left alone for
    /// the settle time afterwards.
    pub fn reset(&mut self) -> Result<(), I2cError> {
        self.bus
            .write_byte_nb(self.config.address, PWR_MGMT_1, PWR_MGMT_1_RESET)?;
        self.bus.delay_ms(self.config.reset_settle.to_millis());
        self.last_sample_us = None;
        Ok(())
    }

    pub fn device_id(&mut self) -> Result<u8, I2cError> {
        self.bus.read_byte(self.config.address, WHO_AM_I)
    }

    /// Arm or gate the data-ready interrupt. Gating leaves a latched sample
    /// in place.
    pub fn listen(&mut self, enable: bool) {
        if enable {
            self.int.enable();
        } else {
            self.int.disable();
        }
        self.listening = enable;
        log_debug!("listening: {}", enable);
    }

    pub fn is_data_ready(&self) -> bool {
        self.session.is_data_ready()
    }

    pub fn state(&self) -> PipelineState {
        if !self.listening {
            PipelineState::Idle
        } else if self.session.is_data_ready() {
            PipelineState::DataLatched
        } else {
            PipelineState::Listening
        }
    }

    /// Replaces any registered hook
    pub fn add_data_hook(&mut self, hook: &'a mut DataHook<'a>) {
        self.hook = Some(hook);
    }

    pub fn remove_data_hook(&mut self) -> Option<&'a mut DataHook<'a>> {
        self.hook.take()
    }

    /// Data-ready handler, called from the INT pin's interrupt vector
    ///
    /// Drains exactly one FIFO record per edge. If the drain fails the
    /// session is left untouched.
    pub fn on_interrupt(&mut self) -> Result<InterruptOutcome, SensorError> {
        if !self.listening {
            return Ok(InterruptOutcome::Gated);
        }
        if !self.int.clear_and_test() {
            return Ok(InterruptOutcome::Spurious);
        }

        let packet = self.dmp.read_fifo(&mut self.bus).map_err(|e| {
            log_warn!("FIFO drain failed: {:?}", e);
            SensorError::from(e)
        })?;

        let now = self.clock.now_us();
        let dt = match self.last_sample_us {
            Some(prev) => now.wrapping_sub(prev) as f32 / 1_000_000.0,
            None => 0.0,
        };
        self.last_sample_us = Some(now);

        let quaternion = Quaternion::from_q30(packet.quat).normalized();
        let gravity = quaternion.gravity();
        let sample = Sample {
            ypr: quaternion.yaw_pitch_roll(&gravity),
            quaternion,
            gravity,
            dt,
            accel: packet.accel,
            gyro: packet.gyro,
            timestamp: packet.timestamp,
        };
        self.session.publish(sample);

        if packet.more {
            // the next edge drains the next record
            self.session.record_backlog();
            log_trace!("FIFO backlog left queued");
        }

        if let Some(hook) = self.hook.as_deref_mut() {
            hook(SensorClass::Orientation, &sample.to_array()[..]);
        }

        Ok(InterruptOutcome::Handled {
            backlog: packet.more,
        })
    }

    /// Gate the interrupt, drop the hook and hand the parts back
    pub fn shutdown(mut self) -> (B, P, I, C) {
        self.listen(false);
        self.hook = None;
        (self.bus, self.dmp, self.int, self.clock)
    }
}
