use crate::reader::Reading;

/// Raw magnetometer axes as read from the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MagnetometerAxes {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl MagnetometerAxes {
    pub fn magnitude(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// A compass reading. Replaced wholesale on every new sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompassData {
    heading: f64,
    raw: MagnetometerAxes,
    sequence: u64,
}

impl CompassData {
    pub fn new(heading: f64, raw: MagnetometerAxes, sequence: u64) -> Self {
        CompassData {
            heading,
            raw,
            sequence,
        }
    }

    /// Heading in degrees clockwise from north, derived from the horizontal
    /// axes and corrected by the local magnetic `declination`.
    pub fn from_raw(raw: MagnetometerAxes, declination: f64, sequence: u64) -> Self {
        let heading = (raw.y as f64).atan2(raw.x as f64).to_degrees() + declination;
        CompassData::new(heading.rem_euclid(360.0), raw, sequence)
    }

    pub fn heading(&self) -> f64 {
        self.heading
    }

    pub fn raw(&self) -> MagnetometerAxes {
        self.raw
    }
}

impl Reading for CompassData {
    const KIND: &'static str = "compass";

    fn sequence(&self) -> u64 {
        self.sequence
    }

    fn is_valid(&self) -> bool {
        self.heading.is_finite() && (0.0..360.0).contains(&self.heading) && self.raw.magnitude() > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn axes(x: f32, y: f32) -> MagnetometerAxes {
        MagnetometerAxes { x, y, z: -12.0 }
    }

    #[test]
    fn heading_from_horizontal_axes() {
        assert_abs_diff_eq!(CompassData::from_raw(axes(300.0, 0.0), 0.0, 1).heading(), 0.0);
        assert_abs_diff_eq!(
            CompassData::from_raw(axes(0.0, 300.0), 0.0, 1).heading(),
            90.0,
            epsilon = 1e-9
        );
        assert_abs_diff_eq!(
            CompassData::from_raw(axes(-300.0, 0.0), 0.0, 1).heading(),
            180.0,
            epsilon = 1e-9
        );
        assert_abs_diff_eq!(
            CompassData::from_raw(axes(0.0, -300.0), 0.0, 1).heading(),
            270.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn declination_wraps_around_north() {
        let reading = CompassData::from_raw(axes(300.0, 0.0), -4.5, 1);
        assert_abs_diff_eq!(reading.heading(), 355.5, epsilon = 1e-9);
        assert!(reading.is_valid());
    }

    #[test]
    fn dead_magnetometer_is_invalid() {
        let reading = CompassData::from_raw(MagnetometerAxes::default(), 0.0, 1);
        assert!(!reading.is_valid());
        assert!(!CompassData::new(f64::NAN, axes(1.0, 1.0), 2).is_valid());
        assert!(!CompassData::new(360.0, axes(1.0, 1.0), 2).is_valid());
    }
}
