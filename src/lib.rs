pub mod command;
pub mod config;
pub mod error;
pub mod frame;
pub mod rotor;
pub mod transport;
pub mod usals;

pub use command::{Command, Direction, SwitchSelection};
pub use config::Settings;
pub use error::CommandError;
pub use frame::CommandFrame;
pub use rotor::{ControlError, Controller, WaitOutcome};
pub use transport::{DeviceError, Tone, Transport, Voltage};
pub use usals::{Site, UsalsSolution, compute_usals};
