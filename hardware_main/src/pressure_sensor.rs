//! This module contains the driver for the I2C pressure transducer on
//! the cuff line.

use embassy_time::{Duration, Timer};

use crate::fmt::warn;

pub const SENSOR_ADDRESS: u8 = 0b0011000; // 7-bit bus address of the transducer.
const MEASURE_COMMAND: [u8; 3] = [0xAA, 0x00, 0x00]; // Start-conversion command window.
const CONVERSION_TIME: Duration = Duration::from_millis(5); // Worst-case conversion time.

pub struct PressureSensor<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C> PressureSensor<I2C> {
    pub fn new(i2c: I2C, address: u8) -> Self {
        Self { i2c, address }
    }
}

impl<I2C> PressureSensor<I2C>
where
    I2C: embedded_hal_async::i2c::I2c,
{
    /// Read one raw conversion. The transducer answers with a status byte
    /// followed by the 24-bit count, big endian.
    pub async fn read_raw(&mut self) -> Option<u32> {
        if self.i2c.write(self.address, &MEASURE_COMMAND).await.is_err() {
            warn!("Failed to command the pressure sensor");
            return None;
        }
        Timer::after(CONVERSION_TIME).await;

        let mut buf = [0u8; 4];
        match self.i2c.read(self.address, &mut buf).await {
            Ok(()) => Some(u32::from_be_bytes([0, buf[1], buf[2], buf[3]])),
            Err(_) => {
                warn!("Failed to read from the pressure sensor");
                None
            }
        }
    }
}
