//! DiSEqC command set: byte constants, preset tables, builders and the
//! [`Command`] enum with encode/decode dispatch.
//!
//! Every builder is pure. Indices and slots are validated up front; nothing is
//! clamped or wrapped into range.

use std::fmt;

use crate::error::{CommandError, Result};
use crate::frame::CommandFrame;
use crate::usals;

// ---------------------------------------------------------------------------
// Byte constants
// ---------------------------------------------------------------------------

/// Framing byte: command from master, no reply required, first transmission.
pub const FRAMING_NO_REPLY: u8 = 0xE0;

/// Address: any LNB, switcher or SMATV device.
pub const ADDR_ANY_SWITCH: u8 = 0x10;
/// Address: polar/azimuth positioner.
pub const ADDR_AZIMUTH_POSITIONER: u8 = 0x31;

pub const CMD_WRITE_N0: u8 = 0x38;
pub const CMD_WRITE_N1: u8 = 0x39;
pub const CMD_DRIVE_EAST: u8 = 0x68;
pub const CMD_DRIVE_WEST: u8 = 0x69;
pub const CMD_STORE_NN: u8 = 0x6A;
pub const CMD_GOTO_NN: u8 = 0x6B;
pub const CMD_GOTO_ANGLE: u8 = 0x6E;

/// Drive data byte for a single step (timeout/steps field, two's complement -1).
pub const DRIVE_ONE_STEP: u8 = 0xFF;

// ---------------------------------------------------------------------------
// Preset tables
// ---------------------------------------------------------------------------

const fn switch_frame(cmd: u8, data: u8) -> CommandFrame {
    CommandFrame::preset([FRAMING_NO_REPLY, ADDR_ANY_SWITCH, cmd, data, 0x00, 0x00], 4)
}

const fn drive_frame(cmd: u8) -> CommandFrame {
    CommandFrame::preset(
        [FRAMING_NO_REPLY, ADDR_AZIMUTH_POSITIONER, cmd, DRIVE_ONE_STEP, 0x00, 0x00],
        4,
    )
}

/// Committed switch ports 1-4 (write N0).
pub static COMMITTED_SWITCH: [CommandFrame; 4] = [
    switch_frame(CMD_WRITE_N0, 0xF0),
    switch_frame(CMD_WRITE_N0, 0xF4),
    switch_frame(CMD_WRITE_N0, 0xF8),
    switch_frame(CMD_WRITE_N0, 0xFC),
];

/// Uncommitted switch ports 1-8 (write N1).
pub static UNCOMMITTED_SWITCH: [CommandFrame; 8] = [
    switch_frame(CMD_WRITE_N1, 0xF0),
    switch_frame(CMD_WRITE_N1, 0xF1),
    switch_frame(CMD_WRITE_N1, 0xF2),
    switch_frame(CMD_WRITE_N1, 0xF3),
    switch_frame(CMD_WRITE_N1, 0xF4),
    switch_frame(CMD_WRITE_N1, 0xF5),
    switch_frame(CMD_WRITE_N1, 0xF6),
    switch_frame(CMD_WRITE_N1, 0xF7),
];

/// One-step drive frames, indexed by [`Direction`].
pub static DRIVE_STEP: [CommandFrame; 2] = [drive_frame(CMD_DRIVE_EAST), drive_frame(CMD_DRIVE_WEST)];

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

/// Manual nudge direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Direction {
    East = 0,
    West = 1,
}

impl Direction {
    pub fn from_index(index: u8) -> Result<Self> {
        match index {
            0 => Ok(Self::East),
            1 => Ok(Self::West),
            _ => Err(CommandError::InvalidIndex {
                table: "direction",
                index: i64::from(index),
                len: DRIVE_STEP.len(),
            }),
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::East => write!(f, "east"),
            Self::West => write!(f, "west"),
        }
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

/// Frames for a switch selection, in transmission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SwitchSelection {
    pub uncommitted: Option<CommandFrame>,
    pub committed: Option<CommandFrame>,
}

impl SwitchSelection {
    /// Uncommitted first, then committed. Absent entries are skipped.
    pub fn frames(&self) -> impl Iterator<Item = CommandFrame> + '_ {
        self.uncommitted.into_iter().chain(self.committed)
    }
}

/// Look up the committed (1-4) and uncommitted (1-8) switch frames.
/// Index 0 means "leave this switch alone".
pub fn build_switch_command(committed: u8, uncommitted: u8) -> Result<SwitchSelection> {
    Ok(SwitchSelection {
        uncommitted: preset(&UNCOMMITTED_SWITCH, "uncommitted switch", uncommitted)?,
        committed: preset(&COMMITTED_SWITCH, "committed switch", committed)?,
    })
}

/// One-degree nudge frame. `direction` is 0 (East) or 1 (West).
pub fn build_directional_command(direction: u8) -> Result<CommandFrame> {
    Ok(DRIVE_STEP[Direction::from_index(direction)?.index()])
}

/// Go to the position stored in `slot`.
pub fn build_goto_position_command(slot: i32) -> Result<CommandFrame> {
    Ok(positioner_frame(CMD_GOTO_NN, slot_byte(slot)?))
}

/// Store the current position in `slot`.
pub fn build_save_position_command(slot: i32) -> Result<CommandFrame> {
    Ok(positioner_frame(CMD_STORE_NN, slot_byte(slot)?))
}

/// Go to the USALS angle given as an encoded byte pair.
pub fn build_usals_command(angle_bytes: [u8; 2]) -> CommandFrame {
    CommandFrame::preset(
        [
            FRAMING_NO_REPLY,
            ADDR_AZIMUTH_POSITIONER,
            CMD_GOTO_ANGLE,
            angle_bytes[0],
            angle_bytes[1],
            0x00,
        ],
        5,
    )
}

const fn positioner_frame(cmd: u8, slot: u8) -> CommandFrame {
    CommandFrame::preset([FRAMING_NO_REPLY, ADDR_AZIMUTH_POSITIONER, cmd, slot, 0x00, 0x00], 4)
}

fn preset(table: &[CommandFrame], name: &'static str, index: u8) -> Result<Option<CommandFrame>> {
    match index {
        0 => Ok(None),
        i => table
            .get(usize::from(i) - 1)
            .copied()
            .map(Some)
            .ok_or_else(|| CommandError::invalid_index(name, i, table.len())),
    }
}

fn slot_byte(slot: i32) -> Result<u8> {
    u8::try_from(slot).map_err(|_| CommandError::byte_out_of_range("position slot", slot))
}

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// A DiSEqC command this crate knows how to build and recognise.
///
/// Switch variants carry the 1-based port number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    CommittedSwitch(u8),
    UncommittedSwitch(u8),
    Drive(Direction),
    GotoPosition(u8),
    StorePosition(u8),
    GotoAngle([u8; 2]),
}

impl Command {
    /// Encode into a command frame. Fails only for switch port 0 or a port
    /// past the end of its table.
    pub fn encode(&self) -> Result<CommandFrame> {
        let frame = match *self {
            Self::CommittedSwitch(port) => switch_port(&COMMITTED_SWITCH, "committed switch", port)?,
            Self::UncommittedSwitch(port) => {
                switch_port(&UNCOMMITTED_SWITCH, "uncommitted switch", port)?
            }
            Self::Drive(dir) => DRIVE_STEP[dir.index()],
            Self::GotoPosition(slot) => positioner_frame(CMD_GOTO_NN, slot),
            Self::StorePosition(slot) => positioner_frame(CMD_STORE_NN, slot),
            Self::GotoAngle(bytes) => build_usals_command(bytes),
        };
        Ok(frame)
    }

    /// Recognise a frame built by this module.
    pub fn decode(frame: &CommandFrame) -> Result<Self> {
        let unknown = || CommandError::UnknownFrame(frame.to_string());
        let b = frame.as_bytes();
        if b.len() < 4 || b[0] != FRAMING_NO_REPLY {
            return Err(unknown());
        }

        let cmd = match (b[1], b[2], b.len()) {
            (ADDR_ANY_SWITCH, CMD_WRITE_N0, 4) => COMMITTED_SWITCH
                .iter()
                .position(|f| f == frame)
                .map(|i| Self::CommittedSwitch(i as u8 + 1)),
            (ADDR_ANY_SWITCH, CMD_WRITE_N1, 4) => UNCOMMITTED_SWITCH
                .iter()
                .position(|f| f == frame)
                .map(|i| Self::UncommittedSwitch(i as u8 + 1)),
            (ADDR_AZIMUTH_POSITIONER, CMD_DRIVE_EAST, 4) => Some(Self::Drive(Direction::East)),
            (ADDR_AZIMUTH_POSITIONER, CMD_DRIVE_WEST, 4) => Some(Self::Drive(Direction::West)),
            (ADDR_AZIMUTH_POSITIONER, CMD_GOTO_NN, 4) => Some(Self::GotoPosition(b[3])),
            (ADDR_AZIMUTH_POSITIONER, CMD_STORE_NN, 4) => Some(Self::StorePosition(b[3])),
            (ADDR_AZIMUTH_POSITIONER, CMD_GOTO_ANGLE, 5) => Some(Self::GotoAngle([b[3], b[4]])),
            _ => None,
        };
        cmd.ok_or_else(unknown)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CommittedSwitch(port) => write!(f, "committed switch port {port}"),
            Self::UncommittedSwitch(port) => write!(f, "uncommitted switch port {port}"),
            Self::Drive(dir) => write!(f, "drive {dir} 1 step"),
            Self::GotoPosition(slot) => write!(f, "goto position {slot}"),
            Self::StorePosition(slot) => write!(f, "store position {slot}"),
            Self::GotoAngle(bytes) => match usals::decode_angle(*bytes) {
                Ok(angle) => write!(f, "goto angle {angle:.4}°"),
                Err(_) => write!(f, "goto angle {:02x} {:02x}", bytes[0], bytes[1]),
            },
        }
    }
}

fn switch_port(table: &[CommandFrame], name: &'static str, port: u8) -> Result<CommandFrame> {
    preset(table, name, port)?.ok_or_else(|| CommandError::invalid_index(name, port, table.len()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
