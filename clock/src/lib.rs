pub mod daylight;
pub mod solar;

pub mod clock {
    use chrono::{DateTime, Utc};
    use std::sync::Mutex;

    /// Wall-clock time used to stamp sun position calculations.
    pub trait TimeSource: Send + Sync {
        fn now(&self) -> DateTime<Utc>;
    }

    /// The host's system clock.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct SystemClock;

    impl TimeSource for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }

    /// A clock that only moves when told to.
    #[derive(Debug)]
    pub struct FixedClock {
        now: Mutex<DateTime<Utc>>,
    }

    impl FixedClock {
        pub fn new(now: DateTime<Utc>) -> Self {
            FixedClock {
                now: Mutex::new(now),
            }
        }

        pub fn set(&self, now: DateTime<Utc>) {
            *self.now.lock().unwrap_or_else(|p| p.into_inner()) = now;
        }

        pub fn advance(&self, by: chrono::Duration) {
            let mut now = self.now.lock().unwrap_or_else(|p| p.into_inner());
            *now += by;
        }
    }

    impl TimeSource for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock().unwrap_or_else(|p| p.into_inner())
        }
    }
}

pub use clock::{FixedClock, SystemClock, TimeSource};
pub use daylight::DayWindow;
pub use solar::{NoaaSunEngine, SunAngles, SunPositionData, SunPositionEngine};
