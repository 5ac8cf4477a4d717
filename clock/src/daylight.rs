use chrono::{DateTime, Days, NaiveDate, Utc};

/// Sunrise to sunset of one day at a location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub sunrise: DateTime<Utc>,
    pub sunset: DateTime<Utc>,
}

impl DayWindow {
    /// `None` when the sun does not rise or set that day (polar day or night).
    pub fn for_date(date: NaiveDate, latitude: f64, longitude: f64, altitude: f64) -> Option<Self> {
        sun_times::sun_times(date, latitude, longitude, altitude)
            .map(|(sunrise, sunset)| DayWindow { sunrise, sunset })
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.sunrise && at < self.sunset
    }

    /// Whether `at` falls between a sunrise and the following sunset.
    ///
    /// Far from Greenwich a local day straddles two UTC dates, so the
    /// neighbouring dates are checked too. `None` when no window exists
    /// around `at`.
    pub fn is_daylight(at: DateTime<Utc>, latitude: f64, longitude: f64, altitude: f64) -> Option<bool> {
        let today = at.date_naive();
        let dates = [
            today.checked_sub_days(Days::new(1)),
            Some(today),
            today.checked_add_days(Days::new(1)),
        ];

        let windows: Vec<DayWindow> = dates
            .into_iter()
            .flatten()
            .filter_map(|date| DayWindow::for_date(date, latitude, longitude, altitude))
            .collect();

        if windows.is_empty() {
            log::debug!("No sunrise/sunset around {} at ({}, {})", at, latitude, longitude);
            return None;
        }
        Some(windows.iter().any(|w| w.contains(at)))
    }
}
