//! Installation settings.

use std::time::Duration;

use crate::rotor::MOTOR_TIMEOUT;
use crate::transport::{SETTLE_DELAY, Tone, Voltage};
use crate::usals::Site;

/// Per-installation defaults for a [`Controller`](crate::rotor::Controller).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Settings {
    /// Dish location.
    pub site: Site,
    /// LNB voltage applied during switch setup.
    pub voltage: Voltage,
    /// 22 kHz tone restored after switch setup.
    pub tone: Tone,
    /// Wait after the voltage change in switch setup, for servo-driven switches.
    pub servo_delay: Duration,
    /// Wait after each state-changing device call.
    pub settle_delay: Duration,
    /// Upper bound on waiting for the positioner after a move.
    pub motor_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            site: Site::default(),
            voltage: Voltage::V13,
            tone: Tone::Off,
            servo_delay: SETTLE_DELAY,
            settle_delay: SETTLE_DELAY,
            motor_timeout: MOTOR_TIMEOUT,
        }
    }
}

impl Settings {
    pub fn with_site(site: Site) -> Self {
        Self { site, ..Self::default() }
    }
}
