pub mod compass;
pub mod gps;
pub mod reader;
pub mod sim;

pub use compass::{CompassData, MagnetometerAxes};
pub use gps::GpsData;
pub use reader::{Reading, SensorDelegate, SensorError, SensorReader, SensorSource};

pub type GpsReader = SensorReader<GpsData>;
pub type CompassReader = SensorReader<CompassData>;
