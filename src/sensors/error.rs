use core::fmt;

/// Failure of a single register transaction on the I2C bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum I2cError {
    /// Slave did not acknowledge its address or a data byte
    NoAck,
    /// Controller stayed busy past the configured budget
    Timeout,
    ArbitrationLost,
    /// Zero-length write or read requested
    EmptyTransfer,
    /// Any other controller fault reported by the platform HAL
    Bus,
}

/// Failure reported by the motion-processing firmware boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DmpError {
    Bus(I2cError),
    /// The firmware image is empty or does not fit DMP memory
    NoFirmware,
    /// Read-back of a firmware chunk did not match what was written
    VerifyFailed { bank: u8, offset: u8 },
    /// Operation requires a loaded image
    NotLoaded,
    /// Fewer bytes than one packet are queued
    NoData,
    /// FIFO overflowed and was reset
    FifoOverflow,
    /// Packet failed the quaternion sanity check, FIFO was reset
    CorruptPacket,
    /// Rate outside what the device supports
    InvalidRate(u16),
    /// Requested sensor or feature combination is not supported
    Unsupported,
}

/// Bring-up stage that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BringUpStep {
    Init,
    SetSensors,
    ConfigureFifo,
    SetSampleRate,
    SetOrientation,
    EnableFeature,
    SetFifoRate,
    SetDmpState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InitError {
    Bus(I2cError),
    /// WHO_AM_I returned something other than the configured id
    WrongDevice(u8),
    Dmp(BringUpStep, DmpError),
    /// Every firmware load attempt failed; the DMP is unusable
    FirmwareLoadFailed { attempts: u8, last: DmpError },
}

/// Failure inside the data-ready handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SensorError {
    Bus(I2cError),
    Fifo(DmpError),
}

impl From<I2cError> for DmpError {
    fn from(e: I2cError) -> Self {
        DmpError::Bus(e)
    }
}

impl From<I2cError> for InitError {
    fn from(e: I2cError) -> Self {
        InitError::Bus(e)
    }
}

impl From<I2cError> for SensorError {
    fn from(e: I2cError) -> Self {
        SensorError::Bus(e)
    }
}

impl From<DmpError> for SensorError {
    fn from(e: DmpError) -> Self {
        match e {
            DmpError::Bus(e) => SensorError::Bus(e),
            e => SensorError::Fifo(e),
        }
    }
}

impl I2cError {
    pub fn info(self) {
        match self {
            I2cError::NoAck => log_info!("no acknowledge from device"),
            I2cError::Timeout => log_info!("bus controller stayed busy"),
            I2cError::ArbitrationLost => log_info!("arbitration lost"),
            I2cError::EmptyTransfer => log_info!("zero length transfer"),
            I2cError::Bus => log_info!("other bus error"),
        }
    }
}

impl InitError {
    pub fn info(self) {
        match self {
            InitError::Bus(e) => {
                e.info();
                log_info!("bus failure during bring-up");
            }
            InitError::WrongDevice(id) => log_info!("unexpected WHO_AM_I {:#x}", id),
            InitError::Dmp(step, e) => log_info!("DMP bring-up failed at {:?}: {:?}", step, e),
            InitError::FirmwareLoadFailed { attempts, last } => {
                log_info!(
                    "DMP firmware not loaded after {} attempts ({:?}), DMP not usable",
                    attempts,
                    last
                )
            }
        }
    }
}

impl SensorError {
    pub fn info(self) {
        match self {
            SensorError::Bus(e) => {
                e.info();
                log_info!("failed to drain sensor FIFO");
            }
            SensorError::Fifo(e) => log_info!("FIFO read rejected: {:?}", e),
        }
    }
}

impl fmt::Display for I2cError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            I2cError::NoAck => write!(f, "no acknowledge from device"),
            I2cError::Timeout => write!(f, "bus busy timeout"),
            I2cError::ArbitrationLost => write!(f, "arbitration lost"),
            I2cError::EmptyTransfer => write!(f, "zero length transfer"),
            I2cError::Bus => write!(f, "bus error"),
        }
    }
}

impl fmt::Display for DmpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DmpError::Bus(e) => write!(f, "bus: {}", e),
            DmpError::NoFirmware => write!(f, "no usable firmware image"),
            DmpError::VerifyFailed { bank, offset } => {
                write!(f, "firmware verify failed at bank {} offset {}", bank, offset)
            }
            DmpError::NotLoaded => write!(f, "DMP firmware not loaded"),
            DmpError::NoData => write!(f, "FIFO holds no complete packet"),
            DmpError::FifoOverflow => write!(f, "FIFO overflow"),
            DmpError::CorruptPacket => write!(f, "corrupt FIFO packet"),
            DmpError::InvalidRate(hz) => write!(f, "unsupported rate {} Hz", hz),
            DmpError::Unsupported => write!(f, "unsupported configuration"),
        }
    }
}

impl fmt::Display for InitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitError::Bus(e) => write!(f, "bus: {}", e),
            InitError::WrongDevice(id) => write!(f, "unexpected WHO_AM_I {:#04x}", id),
            InitError::Dmp(step, e) => write!(f, "{:?}: {}", step, e),
            InitError::FirmwareLoadFailed { attempts, last } => {
                write!(f, "firmware load failed {} times, last: {}", attempts, last)
            }
        }
    }
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorError::Bus(e) => write!(f, "bus: {}", e),
            SensorError::Fifo(e) => write!(f, "fifo: {}", e),
        }
    }
}
