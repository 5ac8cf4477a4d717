use crate::reader::Reading;

/// Fewest satellites for a fix to count as locked.
pub const MIN_LOCK_SATELLITES: u8 = 4;

/// A GPS fix. Replaced wholesale on every new lock, never mutated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpsData {
    latitude: f64,
    longitude: f64,
    altitude: f64,
    satellites: u8,
    locked: bool,
    sequence: u64,
}

impl GpsData {
    pub fn new(latitude: f64, longitude: f64, altitude: f64, satellites: u8, sequence: u64) -> Self {
        GpsData {
            latitude,
            longitude,
            altitude,
            satellites,
            locked: satellites >= MIN_LOCK_SATELLITES,
            sequence,
        }
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn altitude(&self) -> f64 {
        self.altitude
    }

    pub fn satellites(&self) -> u8 {
        self.satellites
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }
}

impl Reading for GpsData {
    const KIND: &'static str = "gps";

    fn sequence(&self) -> u64 {
        self.sequence
    }

    fn is_valid(&self) -> bool {
        self.locked
            && self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.altitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_needs_enough_satellites() {
        assert!(!GpsData::new(45.8, 15.9, 120.0, 3, 1).is_locked());
        assert!(GpsData::new(45.8, 15.9, 120.0, 4, 1).is_locked());
    }

    #[test]
    fn validity_checks_lock_and_ranges() {
        assert!(GpsData::new(45.8, 15.9, 120.0, 7, 1).is_valid());
        assert!(!GpsData::new(45.8, 15.9, 120.0, 2, 1).is_valid());
        assert!(!GpsData::new(95.0, 15.9, 120.0, 7, 1).is_valid());
        assert!(!GpsData::new(45.8, -181.0, 120.0, 7, 1).is_valid());
        assert!(!GpsData::new(f64::NAN, 15.9, 120.0, 7, 1).is_valid());
    }
}
