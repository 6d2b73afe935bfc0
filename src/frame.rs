//! DiSEqC master command frame.
//!
//! Layout handed to the tuner front-end:
//! ```text
//! FRAMING ADDRESS COMMAND [DATA...]   (1..=6 bytes, zero-padded to 6)
//! ```

use std::fmt;

use crate::error::{CommandError, Result};

/// Capacity of a master command buffer.
pub const FRAME_CAPACITY: usize = 6;

/// A command frame: six bytes plus the count of bytes actually transmitted.
///
/// Bytes past `len` are always zero.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "WireFrame"))]
pub struct CommandFrame {
    msg: [u8; FRAME_CAPACITY],
    len: u8,
}

impl CommandFrame {
    /// Build a frame from the bytes to transmit.
    pub fn new(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() || bytes.len() > FRAME_CAPACITY {
            return Err(CommandError::FrameLength { len: bytes.len() });
        }
        let mut msg = [0u8; FRAME_CAPACITY];
        msg[..bytes.len()].copy_from_slice(bytes);
        Ok(Self { msg, len: bytes.len() as u8 })
    }

    /// Rebuild a frame from a kernel-style buffer and length. Bytes past `len`
    /// are dropped.
    pub fn from_parts(msg: [u8; FRAME_CAPACITY], len: u8) -> Result<Self> {
        let len = usize::from(len);
        if len == 0 || len > FRAME_CAPACITY {
            return Err(CommandError::FrameLength { len });
        }
        Self::new(&msg[..len])
    }

    /// Compile-time constructor for preset tables. Zeroes anything past `len`.
    pub(crate) const fn preset(bytes: [u8; FRAME_CAPACITY], len: u8) -> Self {
        let mut msg = [0u8; FRAME_CAPACITY];
        let mut i = 0;
        while i < len as usize {
            msg[i] = bytes[i];
            i += 1;
        }
        Self { msg, len }
    }

    /// The transmitted bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.msg[..self.len as usize]
    }

    /// The full zero-padded buffer, as the kernel command struct carries it.
    pub fn raw(&self) -> &[u8; FRAME_CAPACITY] {
        &self.msg
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Unchecked serialized shape; every decoded value goes through
/// [`CommandFrame::from_parts`].
#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct WireFrame {
    msg: [u8; FRAME_CAPACITY],
    len: u8,
}

#[cfg(feature = "serde")]
impl TryFrom<WireFrame> for CommandFrame {
    type Error = CommandError;

    fn try_from(w: WireFrame) -> Result<Self> {
        Self::from_parts(w.msg, w.len)
    }
}

impl fmt::Display for CommandFrame {
    // "e0 31 6e d0 12 00 (len=5)"
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.msg.iter() {
            write!(f, "{b:02x} ")?;
        }
        write!(f, "(len={})", self.len)
    }
}

impl fmt::Debug for CommandFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommandFrame[")?;
        for (i, b) in self.as_bytes().iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{b:02X}")?;
        }
        write!(f, "]")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
