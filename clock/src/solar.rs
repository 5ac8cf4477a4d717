use astronav::coords::noaa_sun::NOAASun;
use chrono::{DateTime, Datelike, Timelike, Utc};

/// Apparent position of the sun as seen from the rig.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SunAngles {
    /// Degrees clockwise from north.
    pub azimuth: f64,
    /// Degrees from the vertical; above 90 the sun is below the horizon.
    pub zenith: f64,
}

impl SunAngles {
    pub fn above_horizon(&self) -> bool {
        self.zenith < 90.0
    }
}

/// Maps a location and instant to the sun's azimuth and zenith.
///
/// Implementations must be pure: same input, same output.
pub trait SunPositionEngine: Send + Sync {
    fn compute(
        &self,
        latitude: f64,
        longitude: f64,
        elevation: f64,
        timestamp: DateTime<Utc>,
    ) -> SunAngles;
}

/// Location, instant and result of the last sun position calculation.
///
/// The location fields are copied in before every calculation; azimuth and
/// zenith only mean something once `timestamp` is set.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SunPositionData {
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: f64,
    pub azimuth: f64,
    pub zenith: f64,
    pub timestamp: Option<DateTime<Utc>>,
}

impl SunPositionData {
    pub fn set_location(&mut self, latitude: f64, longitude: f64, elevation: f64) {
        self.latitude = latitude;
        self.longitude = longitude;
        self.elevation = elevation;
    }

    /// Runs `engine` for the stored location at `at`, overwriting azimuth and zenith.
    pub fn calculate(&mut self, engine: &dyn SunPositionEngine, at: DateTime<Utc>) -> SunAngles {
        let angles = engine.compute(self.latitude, self.longitude, self.elevation, at);
        self.azimuth = angles.azimuth;
        self.zenith = angles.zenith;
        self.timestamp = Some(at);
        angles
    }

    pub fn is_calculated(&self) -> bool {
        self.timestamp.is_some()
    }
}

/// NOAA sun position from `astronav`, evaluated in UTC. Good to a fraction
/// of a degree; elevation is accepted for the interface but not used.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoaaSunEngine;

impl NoaaSunEngine {
    fn sun_at(latitude: f64, longitude: f64, timestamp: DateTime<Utc>) -> NOAASun {
        NOAASun {
            year: timestamp.year() as u16,
            doy: timestamp.ordinal() as u16,
            long: longitude as f32,
            lat: latitude as f32,
            timezone: 0.0,
            hour: timestamp.hour() as u8,
            min: timestamp.minute() as u8,
            sec: timestamp.second() as u8,
        }
    }
}

impl SunPositionEngine for NoaaSunEngine {
    fn compute(
        &self,
        latitude: f64,
        longitude: f64,
        _elevation: f64,
        timestamp: DateTime<Utc>,
    ) -> SunAngles {
        let sun = Self::sun_at(latitude, longitude, timestamp);
        let zenith = sun.zenith_in_deg();
        let mut azimuth = sun.azimuth_in_deg();
        if !azimuth.is_finite() {
            // sun straight overhead, or the rig sits on a pole
            azimuth = if latitude > 0.0 { 180.0 } else { 0.0 };
        }
        SunAngles {
            azimuth: azimuth.rem_euclid(360.0),
            zenith,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use chrono::TimeZone;

    // Dallas, TX
    const LAT: f64 = 32.797868;
    const LON: f64 = -96.835597;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn summer_solstice_noon_zenith() {
        let angles = NoaaSunEngine.compute(LAT, LON, 130.0, at(2024, 6, 21, 18, 29));
        // latitude minus declination
        assert_abs_diff_eq!(angles.zenith, LAT - 23.44, epsilon = 0.5);
        assert!(angles.above_horizon());
    }

    #[test]
    fn equinox_noon_on_the_equator_is_overhead() {
        let angles = NoaaSunEngine.compute(0.0, 0.0, 0.0, at(2024, 3, 20, 12, 7));
        assert!(angles.zenith < 1.5, "zenith {}", angles.zenith);
    }

    #[test]
    fn morning_sun_is_in_the_east() {
        let angles = NoaaSunEngine.compute(LAT, LON, 130.0, at(2024, 6, 21, 14, 0));
        assert!(angles.azimuth > 45.0 && angles.azimuth < 135.0, "azimuth {}", angles.azimuth);
        assert!(angles.above_horizon());
    }

    #[test]
    fn afternoon_sun_is_in_the_west() {
        let angles = NoaaSunEngine.compute(LAT, LON, 130.0, at(2024, 6, 21, 23, 0));
        assert!(angles.azimuth > 225.0 && angles.azimuth < 315.0, "azimuth {}", angles.azimuth);
    }

    #[test]
    fn local_midnight_is_below_horizon() {
        let angles = NoaaSunEngine.compute(LAT, LON, 130.0, at(2024, 6, 22, 6, 30));
        assert!(!angles.above_horizon());
    }

    #[test]
    fn same_input_same_output() {
        let when = at(2024, 9, 2, 16, 45);
        let a = NoaaSunEngine.compute(45.8, 15.97, 120.0, when);
        let b = NoaaSunEngine.compute(45.8, 15.97, 120.0, when);
        assert_eq!(a, b);
    }

    #[test]
    fn reads_the_noaa_sun_in_utc() {
        let when = at(2024, 5, 16, 7, 38);
        let sun = NOAASun::new()
            .date(2024, 5, 16)
            .lat(13.0843)
            .long(80.2705)
            .timezone(0.0)
            .hour(7)
            .min(38);
        let angles = NoaaSunEngine.compute(13.0843, 80.2705, 6.0, when);
        assert_abs_diff_eq!(angles.zenith, sun.zenith_in_deg(), epsilon = 1e-9);
        assert_abs_diff_eq!(angles.azimuth, sun.azimuth_in_deg(), epsilon = 1e-9);
    }

    #[test]
    fn calculate_overwrites_angles_and_stamps() {
        let mut data = SunPositionData::default();
        assert!(!data.is_calculated());
        data.set_location(LAT, LON, 130.0);
        let when = at(2024, 6, 21, 14, 0);
        let angles = data.calculate(&NoaaSunEngine, when);
        assert_eq!(data.azimuth, angles.azimuth);
        assert_eq!(data.zenith, angles.zenith);
        assert_eq!(data.timestamp, Some(when));
        assert_eq!(data.latitude, LAT);
    }
}
