//! Device-side collaborator: the tuner front-end that carries DiSEqC.
//!
//! The crate never opens or configures a device. Anything that can switch the
//! 22 kHz tone, set LNB voltage and transmit a master command implements
//! [`Transport`]. Implementations must leave the line stable before returning
//! from a state-changing call, or callers must wait [`SETTLE_DELAY`] after it
//! ([`Controller`](crate::rotor::Controller) does the latter).

use std::fmt;
use std::io;
use std::time::Duration;

use crate::frame::CommandFrame;

/// Wait after each tone, voltage or command call before the next one.
pub const SETTLE_DELAY: Duration = Duration::from_millis(20);

/// Continuous 22 kHz tone state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Tone {
    #[default]
    Off,
    On,
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Off => write!(f, "OFF"),
            Self::On => write!(f, "ON"),
        }
    }
}

/// LNB supply voltage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Voltage {
    /// 13 V (vertical / right-hand polarisation).
    #[default]
    V13,
    /// 18 V (horizontal / left-hand polarisation). Positioners need this to move.
    V18,
    Off,
}

impl fmt::Display for Voltage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V13 => write!(f, "13V"),
            Self::V18 => write!(f, "18V"),
            Self::Off => write!(f, "OFF"),
        }
    }
}

/// Errors reported by a transport.
#[derive(Debug)]
pub enum DeviceError {
    /// OS-level failure (ioctl, write, ...).
    Io(io::Error),
    /// The device refused the request.
    Rejected(String),
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceError::Io(e) => write!(f, "device I/O error: {e}"),
            DeviceError::Rejected(msg) => write!(f, "device rejected request: {msg}"),
        }
    }
}

impl std::error::Error for DeviceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DeviceError::Io(e) => Some(e),
            DeviceError::Rejected(_) => None,
        }
    }
}

impl From<io::Error> for DeviceError {
    fn from(e: io::Error) -> Self {
        DeviceError::Io(e)
    }
}

/// Minimal front-end contract needed to drive switches and positioners.
pub trait Transport {
    fn set_tone(&mut self, tone: Tone) -> Result<(), DeviceError>;
    fn set_voltage(&mut self, voltage: Voltage) -> Result<(), DeviceError>;
    fn send_command(&mut self, frame: &CommandFrame) -> Result<(), DeviceError>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn set_tone(&mut self, tone: Tone) -> Result<(), DeviceError> {
        (**self).set_tone(tone)
    }

    fn set_voltage(&mut self, voltage: Voltage) -> Result<(), DeviceError> {
        (**self).set_voltage(voltage)
    }

    fn send_command(&mut self, frame: &CommandFrame) -> Result<(), DeviceError> {
        (**self).send_command(frame)
    }
}

// ---------------------------------------------------------------------------
// Recorder
// ---------------------------------------------------------------------------

/// One call observed by a [`Recorder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Tone(Tone),
    Voltage(Voltage),
    Command(CommandFrame),
}

/// In-memory transport that records every call. Used for dry runs and tests.
///
/// [`fail_after`](Self::fail_after) makes the n-th following call fail, for
/// exercising error paths.
#[derive(Debug, Default)]
pub struct Recorder {
    events: Vec<Event>,
    fail_at: Option<usize>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the call that would become event number `n` (0-based from now).
    pub fn fail_after(&mut self, n: usize) {
        self.fail_at = Some(self.events.len() + n);
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Only the command frames, in send order.
    pub fn frames(&self) -> Vec<CommandFrame> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Command(f) => Some(*f),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.events.clear();
        self.fail_at = None;
    }

    fn record(&mut self, event: Event) -> Result<(), DeviceError> {
        if self.fail_at == Some(self.events.len()) {
            self.fail_at = None;
            return Err(DeviceError::Rejected(format!("injected failure on {event:?}")));
        }
        self.events.push(event);
        Ok(())
    }
}

impl Transport for Recorder {
    fn set_tone(&mut self, tone: Tone) -> Result<(), DeviceError> {
        self.record(Event::Tone(tone))
    }

    fn set_voltage(&mut self, voltage: Voltage) -> Result<(), DeviceError> {
        self.record(Event::Voltage(voltage))
    }

    fn send_command(&mut self, frame: &CommandFrame) -> Result<(), DeviceError> {
        self.record(Event::Command(*frame))
    }
}
