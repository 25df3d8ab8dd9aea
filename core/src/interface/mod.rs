pub mod frame;
pub mod report;
pub mod sensor;

pub use frame::RawFrame;
pub use report::{DetectionReport, PostureLabel, ReportTarget};
pub use sensor::{Sensor, SensorError};
