//! Turns a sun position into a step index per axis.
//!
//! The X axis turns the panel about the vertical: its start bound faces the
//! rig's compass heading and each step adds `degrees_per_step` clockwise.
//! The Y axis tilts the panel: its start bound lies flat (sun at the zenith)
//! and each step tilts it `degrees_per_step` further toward the horizon.
//! At night both axes go to their start bound.

use crate::config::{AxesConfig, AxisConfig};
use crate::phase::SunPosition;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisTargets {
    pub x: i32,
    pub y: i32,
}

impl AxisTargets {
    pub fn rest(axes: &AxesConfig) -> Self {
        AxisTargets {
            x: axes.x.min,
            y: axes.y.min,
        }
    }
}

fn to_steps(axis: &AxisConfig, degrees: f64) -> i32 {
    let steps = (degrees / axis.degrees_per_step).round();
    let target = axis.min as f64 + steps;
    target.clamp(axis.min as f64, axis.max as f64) as i32
}

/// `heading` is only read in daylight.
pub fn compute_targets(sun: &SunPosition, heading: Option<f64>, axes: &AxesConfig) -> Option<AxisTargets> {
    if !sun.daylight {
        return Some(AxisTargets::rest(axes));
    }
    let heading = heading?;
    let relative_azimuth = (sun.azimuth - heading).rem_euclid(360.0);
    Some(AxisTargets {
        x: to_steps(&axes.x, relative_azimuth),
        y: to_steps(&axes.y, sun.zenith),
    })
}
