//! Event Windows
//!
//! Provides the IMU sample and label types shared by the training pipeline,
//! and groups labeled samples into fixed-length event windows.

mod label;
mod window;

pub use label::{EventLabel, ParseLabelError};
pub use window::{class_distribution, EventWindow, Windower, WindowingReport};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Samples per window (3 seconds at 50Hz)
pub const DEFAULT_WINDOW_SIZE: usize = 150;

/// IMU sample rate of the helmet firmware (Hz)
pub const DEFAULT_SAMPLE_RATE_HZ: f64 = 50.0;

/// Errors while building event windows
#[derive(Debug, Error)]
pub enum WindowError {
    #[error("Window size must be at least 1")]
    ZeroWindowSize,
    #[error("Sample rate must be positive, got {0}")]
    InvalidSampleRate(f64),
}

/// One accelerometer + gyroscope reading
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ImuSample {
    /// Acceleration X (g)
    pub accel_x: f64,
    /// Acceleration Y (g)
    pub accel_y: f64,
    /// Acceleration Z (g)
    pub accel_z: f64,
    /// Angular velocity X (deg/s)
    pub gyro_x: f64,
    /// Angular velocity Y (deg/s)
    pub gyro_y: f64,
    /// Angular velocity Z (deg/s)
    pub gyro_z: f64,
    /// Acceleration magnitude as recorded by the device, if exported
    pub accel_mag: Option<f64>,
}

impl ImuSample {
    /// Create a sample from the six raw channels
    pub fn new(accel: [f64; 3], gyro: [f64; 3]) -> Self {
        Self {
            accel_x: accel[0],
            accel_y: accel[1],
            accel_z: accel[2],
            gyro_x: gyro[0],
            gyro_y: gyro[1],
            gyro_z: gyro[2],
            accel_mag: None,
        }
    }

    /// Acceleration magnitude (recorded value wins over the derived one)
    pub fn accel_magnitude(&self) -> f64 {
        self.accel_mag.unwrap_or_else(|| {
            (self.accel_x * self.accel_x + self.accel_y * self.accel_y + self.accel_z * self.accel_z)
                .sqrt()
        })
    }

    /// Angular velocity magnitude
    pub fn gyro_magnitude(&self) -> f64 {
        (self.gyro_x * self.gyro_x + self.gyro_y * self.gyro_y + self.gyro_z * self.gyro_z).sqrt()
    }

    /// Read a single channel
    pub fn channel(&self, channel: Channel) -> f64 {
        match channel {
            Channel::AccelX => self.accel_x,
            Channel::AccelY => self.accel_y,
            Channel::AccelZ => self.accel_z,
            Channel::AccelMag => self.accel_magnitude(),
            Channel::GyroX => self.gyro_x,
            Channel::GyroY => self.gyro_y,
            Channel::GyroZ => self.gyro_z,
        }
    }
}

/// Sensor channel of a window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    AccelX,
    AccelY,
    AccelZ,
    AccelMag,
    GyroX,
    GyroY,
    GyroZ,
}

impl Channel {
    /// Column / feature prefix for this channel
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::AccelX => "accel_x",
            Channel::AccelY => "accel_y",
            Channel::AccelZ => "accel_z",
            Channel::AccelMag => "accel_mag",
            Channel::GyroX => "gyro_x",
            Channel::GyroY => "gyro_y",
            Channel::GyroZ => "gyro_z",
        }
    }
}

/// A sample row as read from a labeled recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledSample {
    /// Event the sample belongs to
    pub event_id: String,
    /// Position of the sample inside its event, if recorded
    pub sample_index: Option<i64>,
    /// Event label, `None` for rows that were never annotated
    pub label: Option<EventLabel>,
    /// Sensor reading
    pub sample: ImuSample,
}

/// Windowing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Samples per window
    pub window_size: usize,
    /// Sample rate (Hz)
    pub sample_rate_hz: f64,
    /// Skip events shorter than `window_size` and trim longer ones
    pub require_full_window: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            sample_rate_hz: DEFAULT_SAMPLE_RATE_HZ,
            require_full_window: true,
        }
    }
}

impl WindowConfig {
    /// Window duration in seconds
    pub fn duration_secs(&self) -> f64 {
        self.window_size as f64 / self.sample_rate_hz
    }
}
