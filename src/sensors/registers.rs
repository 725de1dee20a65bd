// MPU-9250 register map (RM-MPU-9250A-00) and the AK8963 compass behind it

pub const MPU9250_ADDRESS: u8 = 0x68;
pub const MPU9250_WHO_AM_I_VALUE: u8 = 0x71;

pub const SMPLRT_DIV: u8 = 0x19;
pub const CONFIG: u8 = 0x1A;
pub const GYRO_CONFIG: u8 = 0x1B;
pub const ACCEL_CONFIG: u8 = 0x1C;
pub const ACCEL_CONFIG_2: u8 = 0x1D;
pub const FIFO_EN: u8 = 0x23;
pub const INT_PIN_CFG: u8 = 0x37;
pub const INT_ENABLE: u8 = 0x38;
pub const INT_STATUS: u8 = 0x3A;
pub const USER_CTRL: u8 = 0x6A;
pub const PWR_MGMT_1: u8 = 0x6B;
pub const PWR_MGMT_2: u8 = 0x6C;
pub const BANK_SEL: u8 = 0x6D;
pub const MEM_START_ADDR: u8 = 0x6E;
pub const MEM_R_W: u8 = 0x6F;
pub const PRGM_START_H: u8 = 0x70;
pub const FIFO_COUNTH: u8 = 0x72;
pub const FIFO_R_W: u8 = 0x74;
pub const WHO_AM_I: u8 = 0x75;

pub const PWR_MGMT_1_RESET: u8 = 0x80;
pub const PWR_MGMT_1_CLK_PLL: u8 = 0x01;

pub const USER_CTRL_DMP_EN: u8 = 0x80;
pub const USER_CTRL_FIFO_EN: u8 = 0x40;
pub const USER_CTRL_DMP_RST: u8 = 0x08;
pub const USER_CTRL_FIFO_RST: u8 = 0x04;

// active low, 50us pulse, cleared on any read, I2C bypass to the compass
pub const INT_PIN_CFG_ACTL: u8 = 0x80;
pub const INT_PIN_CFG_ANYRD_2CLEAR: u8 = 0x10;
pub const INT_PIN_CFG_BYPASS_EN: u8 = 0x02;

pub const INT_ENABLE_DMP: u8 = 0x02;
pub const INT_ENABLE_RAW_RDY: u8 = 0x01;
pub const INT_STATUS_FIFO_OFLOW: u8 = 0x10;

pub const PWR_MGMT_2_DISABLE_ACCEL: u8 = 0x38;
pub const PWR_MGMT_2_DISABLE_GYRO: u8 = 0x07;

pub const GYRO_FSR_2000DPS: u8 = 0x18;
pub const ACCEL_FSR_2G: u8 = 0x00;
pub const DLPF_42HZ: u8 = 0x03;

pub const FIFO_SIZE: u16 = 512;

pub const DMP_BANK_SIZE: usize = 256;
pub const DMP_CHUNK_SIZE: usize = 16;
pub const DMP_MEMORY_SIZE: usize = 4096;
pub const DMP_START_ADDRESS: u16 = 0x0400;

pub const AK8963_ADDRESS: u8 = 0x0C;
pub const AK8963_WIA: u8 = 0x00;
pub const AK8963_WIA_VALUE: u8 = 0x48;
pub const AK8963_CNTL1: u8 = 0x0A;
pub const AK8963_POWER_DOWN: u8 = 0x00;
// 16 bit output, continuous measurement mode 2 (100 Hz)
pub const AK8963_CONTINUOUS_100HZ: u8 = 0x16;
