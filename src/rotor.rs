//! Operation sequences over a [`Transport`].
//!
//! [`Controller`] owns a transport and inserts the settle delay after every
//! state-changing call. Each public method is one complete exchange:
//!
//! - [`Controller::setup_switch`] - voltage, switch selection, tone
//! - [`Controller::drive_usals`] - compute and send a goto-angle
//! - [`Controller::step`], [`Controller::goto_position`], [`Controller::store_position`]
//!
//! Moves return as soon as the frame is sent. [`wait_for_motor`] is the
//! bounded, cancellable wait for callers that need the dish to arrive.

use std::fmt;
use std::thread;
use std::time::{Duration, Instant};

use crate::command::{self, Direction};
use crate::config::Settings;
use crate::error::CommandError;
use crate::frame::CommandFrame;
use crate::transport::{DeviceError, Tone, Transport, Voltage};
use crate::usals::{self, Site, UsalsSolution};

/// Upper bound on a positioner move.
pub const MOTOR_TIMEOUT: Duration = Duration::from_secs(45);

/// Cancellation poll interval for [`wait_for_motor`].
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Shortest poll interval [`wait_for_motor`] will use.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Errors from controller operations.
#[derive(Debug)]
pub enum ControlError {
    /// Invalid argument, rejected before touching the device.
    Command(CommandError),
    /// Transport failure, passed through.
    Device(DeviceError),
}

impl fmt::Display for ControlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlError::Command(e) => write!(f, "command error: {e}"),
            ControlError::Device(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ControlError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ControlError::Command(e) => Some(e),
            ControlError::Device(e) => Some(e),
        }
    }
}

impl From<CommandError> for ControlError {
    fn from(e: CommandError) -> Self {
        ControlError::Command(e)
    }
}

impl From<DeviceError> for ControlError {
    fn from(e: DeviceError) -> Self {
        ControlError::Device(e)
    }
}

/// Drives switches and a positioner through a transport.
///
/// Synchronous, single-threaded. One physical motor cannot run overlapping
/// moves, so there is nothing to share.
///
/// # Example
///
/// ```
/// use diseqc::rotor::Controller;
/// use diseqc::transport::Recorder;
/// use diseqc::usals::Site;
///
/// let mut ctl = Controller::new(Recorder::new());
/// let sol = ctl.drive_usals(Site::new(40.0, -3.0), 19.2)?;
/// assert_eq!(sol.bytes, [0xE1, 0x90]);
/// # Ok::<(), diseqc::rotor::ControlError>(())
/// ```
pub struct Controller<T> {
    transport: T,
    settings: Settings,
    /// Called before every frame is handed to the transport.
    on_send: Option<Box<dyn FnMut(&CommandFrame)>>,
}

impl<T: Transport> Controller<T> {
    /// Wrap a transport with [`Settings::default`].
    pub fn new(transport: T) -> Self {
        Self::from_settings(transport, Settings::default())
    }

    pub fn from_settings(transport: T, settings: Settings) -> Self {
        Self {
            transport,
            settings,
            on_send: None,
        }
    }

    /// Override the settle delay (zero disables it).
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settings.settle_delay = settle;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Register a callback invoked for every frame, before it is sent.
    pub fn set_on_send(&mut self, f: impl FnMut(&CommandFrame) + 'static) {
        self.on_send = Some(Box::new(f));
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_inner(self) -> T {
        self.transport
    }

    // -----------------------------------------------------------------------
    // Primitives
    // -----------------------------------------------------------------------

    /// Send one frame, then settle.
    pub fn send(&mut self, frame: &CommandFrame) -> Result<(), ControlError> {
        if let Some(cb) = self.on_send.as_mut() {
            cb(frame);
        }
        tracing::debug!("DiSEqC: {frame}");
        self.transport
            .send_command(frame)
            .inspect_err(|e| tracing::warn!("send {frame} failed: {e}"))?;
        self.settle();
        Ok(())
    }

    pub fn set_tone(&mut self, tone: Tone) -> Result<(), ControlError> {
        self.transport
            .set_tone(tone)
            .inspect_err(|e| tracing::warn!("set tone {tone} failed: {e}"))?;
        self.settle();
        Ok(())
    }

    pub fn set_voltage(&mut self, voltage: Voltage) -> Result<(), ControlError> {
        self.transport
            .set_voltage(voltage)
            .inspect_err(|e| tracing::warn!("set voltage {voltage} failed: {e}"))?;
        self.settle();
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Sequences
    // -----------------------------------------------------------------------

    /// Select switch ports and restore the LNB state.
    ///
    /// Tone off, `voltage`, wait `servo_delay`, uncommitted then committed
    /// frame (index 0 skips), then `tone`. Indices are checked before any
    /// device call.
    pub fn setup_switch(
        &mut self,
        voltage: Voltage,
        tone: Tone,
        committed: u8,
        uncommitted: u8,
        servo_delay: Duration,
    ) -> Result<(), ControlError> {
        let selection = command::build_switch_command(committed, uncommitted)?;
        tracing::info!("22kHz tone: {tone}");

        self.set_tone(Tone::Off)?;
        self.transport
            .set_voltage(voltage)
            .inspect_err(|e| tracing::warn!("set voltage {voltage} failed: {e}"))?;
        sleep(servo_delay);

        for frame in selection.frames() {
            self.send(&frame)?;
        }
        self.set_tone(tone)
    }

    /// [`setup_switch`](Self::setup_switch) with the configured voltage, tone
    /// and servo delay.
    pub fn select_switch(&mut self, committed: u8, uncommitted: u8) -> Result<(), ControlError> {
        let Settings { voltage, tone, servo_delay, .. } = self.settings;
        self.setup_switch(voltage, tone, committed, uncommitted, servo_delay)
    }

    /// Compute the USALS angle for `sat_long` and send the goto-angle frame.
    ///
    /// Forces tone off and 18 V first; positioners only act on 18 V.
    pub fn drive_usals(&mut self, site: Site, sat_long: f64) -> Result<UsalsSolution, ControlError> {
        let solution = usals::compute_usals(site, sat_long)?;
        self.set_tone(Tone::Off)?;
        self.set_voltage(Voltage::V18)?;
        self.send(&command::build_usals_command(solution.bytes))?;
        Ok(solution)
    }

    /// [`drive_usals`](Self::drive_usals) from the configured site.
    pub fn goto_satellite(&mut self, sat_long: f64) -> Result<UsalsSolution, ControlError> {
        self.drive_usals(self.settings.site, sat_long)
    }

    /// Block until the configured motor timeout elapses or `cancel` returns
    /// true, polling every [`POLL_INTERVAL`].
    pub fn await_motor(&self, cancel: impl FnMut() -> bool) -> WaitOutcome {
        wait_for_motor(self.settings.motor_timeout, POLL_INTERVAL, cancel)
    }

    /// Nudge the dish one step.
    pub fn step(&mut self, direction: Direction) -> Result<(), ControlError> {
        self.send(&command::build_directional_command(direction as u8)?)
    }

    /// Move to a stored position.
    pub fn goto_position(&mut self, slot: i32) -> Result<(), ControlError> {
        let frame = command::build_goto_position_command(slot)?;
        self.send(&frame)
    }

    /// Store the current position.
    pub fn store_position(&mut self, slot: i32) -> Result<(), ControlError> {
        let frame = command::build_save_position_command(slot)?;
        self.send(&frame)
    }

    fn settle(&self) {
        sleep(self.settings.settle_delay);
    }
}

fn sleep(d: Duration) {
    if !d.is_zero() {
        thread::sleep(d);
    }
}

// ---------------------------------------------------------------------------
// Motor wait
// ---------------------------------------------------------------------------

/// How [`wait_for_motor`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Cancelled,
    TimedOut,
}

/// Wait up to `timeout` for a move, checking `cancel` every `poll`.
///
/// The deadline is fixed at entry; slow `cancel` calls do not extend it.
/// `poll` is raised to [`MIN_POLL_INTERVAL`] if shorter.
pub fn wait_for_motor(
    timeout: Duration,
    poll: Duration,
    mut cancel: impl FnMut() -> bool,
) -> WaitOutcome {
    tracing::info!("waiting for motor to move ({}s or cancel to skip)", timeout.as_secs());
    let deadline = Instant::now() + timeout;
    loop {
        if cancel() {
            tracing::debug!("motor wait cancelled");
            return WaitOutcome::Cancelled;
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return WaitOutcome::TimedOut;
        }
        sleep(poll.max(MIN_POLL_INTERVAL).min(remaining));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::command::{COMMITTED_SWITCH, DRIVE_STEP, UNCOMMITTED_SWITCH};
    use crate::transport::{Event, Recorder};

    fn controller() -> Controller<Recorder> {
        Controller::new(Recorder::new()).with_settle(Duration::ZERO)
    }

    #[test]
    fn setup_switch_sequence() {
        let mut ctl = controller();
        ctl.setup_switch(Voltage::V13, Tone::On, 2, 3, Duration::ZERO).unwrap();
        assert_eq!(
            ctl.transport().events(),
            &[
                Event::Tone(Tone::Off),
                Event::Voltage(Voltage::V13),
                Event::Command(UNCOMMITTED_SWITCH[2]),
                Event::Command(COMMITTED_SWITCH[1]),
                Event::Tone(Tone::On),
            ]
        );
    }

    #[test]
    fn setup_switch_skips_zero_index() {
        let mut ctl = controller();
        ctl.setup_switch(Voltage::V18, Tone::Off, 1, 0, Duration::ZERO).unwrap();
        assert_eq!(ctl.transport().frames(), vec![COMMITTED_SWITCH[0]]);
    }

    #[test]
    fn setup_switch_validates_before_io() {
        let mut ctl = controller();
        let err = ctl
            .setup_switch(Voltage::V13, Tone::Off, 5, 0, Duration::ZERO)
            .unwrap_err();
        assert!(matches!(
            err,
            ControlError::Command(CommandError::InvalidIndex { index: 5, len: 4, .. })
        ));
        assert!(ctl.transport().events().is_empty());
    }

    #[test]
    fn drive_usals_sequence() {
        let mut ctl = controller();
        let sol = ctl.drive_usals(Site::new(-33.9, 18.4), 30.5).unwrap();
        assert_eq!(sol.bytes, [0xD0, 0xDD]);

        let events = ctl.transport().events();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0], Event::Tone(Tone::Off));
        assert_eq!(events[1], Event::Voltage(Voltage::V18));
        let Event::Command(frame) = events[2] else {
            panic!("expected command, got {:?}", events[2]);
        };
        assert_eq!(frame.raw(), &[0xE0, 0x31, 0x6E, 0xD0, 0xDD, 0x00]);
        assert_eq!(frame.len(), 5);
    }

    #[test]
    fn drive_usals_rejects_nan_without_io() {
        let mut ctl = controller();
        assert!(ctl.drive_usals(Site::new(f64::NAN, 0.0), 0.0).is_err());
        assert!(ctl.transport().events().is_empty());
    }

    #[test]
    fn step_goto_store() {
        let mut ctl = controller();
        ctl.step(Direction::West).unwrap();
        ctl.goto_position(3).unwrap();
        ctl.store_position(4).unwrap();
        let frames = ctl.transport().frames();
        assert_eq!(frames[0], DRIVE_STEP[1]);
        assert_eq!(frames[1].as_bytes(), &[0xE0, 0x31, 0x6B, 0x03]);
        assert_eq!(frames[2].as_bytes(), &[0xE0, 0x31, 0x6A, 0x04]);

        assert!(matches!(
            ctl.goto_position(256),
            Err(ControlError::Command(CommandError::ValueOutOfRange { .. }))
        ));
        assert_eq!(ctl.transport().frames().len(), 3);
    }

    #[test]
    fn device_error_passes_through() {
        let mut ctl = controller();
        ctl.transport_mut().fail_after(1);
        let err = ctl.drive_usals(Site::new(40.0, -3.0), 19.2).unwrap_err();
        assert!(matches!(err, ControlError::Device(DeviceError::Rejected(_))));
        // Tone went out, voltage failed, nothing after it.
        assert_eq!(ctl.transport().events(), &[Event::Tone(Tone::Off)]);
    }

    #[test]
    fn on_send_sees_every_frame() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut ctl = controller();
        let sink = Rc::clone(&seen);
        ctl.set_on_send(move |f| sink.borrow_mut().push(*f));
        ctl.setup_switch(Voltage::V13, Tone::Off, 4, 8, Duration::ZERO).unwrap();
        assert_eq!(*seen.borrow(), vec![UNCOMMITTED_SWITCH[7], COMMITTED_SWITCH[3]]);
    }

    #[test]
    fn from_settings_applies_settle() {
        let settings = Settings {
            settle_delay: Duration::ZERO,
            ..Settings::default()
        };
        let ctl = Controller::from_settings(Recorder::new(), settings);
        assert_eq!(ctl.settings().settle_delay, Duration::ZERO);
    }

    #[test]
    fn configured_site_and_lnb_state_are_used() {
        let settings = Settings {
            site: Site::new(-33.9, 18.4),
            voltage: Voltage::V18,
            tone: Tone::On,
            servo_delay: Duration::ZERO,
            settle_delay: Duration::ZERO,
            motor_timeout: Duration::from_millis(10),
        };
        let mut ctl = Controller::from_settings(Recorder::new(), settings);

        ctl.select_switch(1, 0).unwrap();
        assert_eq!(
            ctl.transport().events(),
            &[
                Event::Tone(Tone::Off),
                Event::Voltage(Voltage::V18),
                Event::Command(COMMITTED_SWITCH[0]),
                Event::Tone(Tone::On),
            ]
        );

        ctl.transport_mut().clear();
        let sol = ctl.goto_satellite(30.5).unwrap();
        assert_eq!(sol.bytes, [0xD0, 0xDD]);
        assert_eq!(&ctl.transport().frames()[0].as_bytes()[3..5], &[0xD0, 0xDD]);
    }

    #[test]
    fn await_motor_uses_configured_timeout() {
        let settings = Settings {
            motor_timeout: Duration::from_millis(15),
            ..Settings::default()
        };
        let ctl = Controller::from_settings(Recorder::new(), settings);
        let start = Instant::now();
        assert_eq!(ctl.await_motor(|| false), WaitOutcome::TimedOut);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(15));
        assert!(elapsed < POLL_INTERVAL, "waited {elapsed:?}");
        assert_eq!(ctl.await_motor(|| true), WaitOutcome::Cancelled);
    }

    #[test]
    fn wait_cancelled() {
        let mut polls = 0;
        let outcome = wait_for_motor(Duration::from_secs(5), Duration::from_millis(1), || {
            polls += 1;
            polls == 3
        });
        assert_eq!(outcome, WaitOutcome::Cancelled);
        assert_eq!(polls, 3);
    }

    #[test]
    fn zero_poll_does_not_spin() {
        let mut polls = 0u32;
        let outcome = wait_for_motor(Duration::from_millis(20), Duration::ZERO, || {
            polls += 1;
            false
        });
        assert_eq!(outcome, WaitOutcome::TimedOut);
        // At least 1ms per poll over a 20ms deadline.
        assert!(polls <= 22, "polled {polls} times");
    }

    #[test]
    fn wait_times_out() {
        let start = Instant::now();
        let outcome = wait_for_motor(Duration::from_millis(20), Duration::from_millis(5), || false);
        assert_eq!(outcome, WaitOutcome::TimedOut);
        assert!(start.elapsed() >= Duration::from_millis(20));
    }
}
