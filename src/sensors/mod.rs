pub mod dmp;
pub mod error;
pub mod mpu9250;
pub mod registers;
pub mod session;
