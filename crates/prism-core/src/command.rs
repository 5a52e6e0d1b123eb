//! 32-bit packing for short note/control commands.
//!
//! Layout, most significant byte first:
//!
//! ```text
//! [ kind:8 ][ channel:8 ][ data1:8 ][ data2:8 ]
//! ```
//!
//! Packed commands travel through an [`IntRing`](crate::IntRing) so the
//! audio thread never sees a heap object. The free functions are plain
//! shifts and masks; [`Command`] is the typed view.

use core::fmt;

const SHIFT_KIND: u32 = 24;
const SHIFT_CHANNEL: u32 = 16;
const SHIFT_DATA1: u32 = 8;
const MASK: u32 = 0xFF;

/// Command codes carried in the top byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CommandKind {
    /// Note on.
    Add = 1,
    /// Parameter set.
    Set = 2,
    /// Remove a voice or entry.
    Remove = 3,
    /// Note off (begin release).
    NoteOff = 4,
    /// Restart a sounding note.
    Retrigger = 5,
}

impl CommandKind {
    /// Decode a kind byte. Unknown codes give `None`.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Add),
            2 => Some(Self::Set),
            3 => Some(Self::Remove),
            4 => Some(Self::NoteOff),
            5 => Some(Self::Retrigger),
            _ => None,
        }
    }

    /// Wire code for this kind.
    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Pack four bytes into a command word.
#[inline]
pub const fn pack(kind: u8, channel: u8, data1: u8, data2: u8) -> u32 {
    ((kind as u32) << SHIFT_KIND)
        | ((channel as u32) << SHIFT_CHANNEL)
        | ((data1 as u32) << SHIFT_DATA1)
        | data2 as u32
}

/// Kind byte of a packed command.
#[inline]
pub const fn kind(packed: u32) -> u8 {
    ((packed >> SHIFT_KIND) & MASK) as u8
}

/// Channel byte of a packed command.
#[inline]
pub const fn channel(packed: u32) -> u8 {
    ((packed >> SHIFT_CHANNEL) & MASK) as u8
}

/// First data byte (note number for note commands).
#[inline]
pub const fn data1(packed: u32) -> u8 {
    ((packed >> SHIFT_DATA1) & MASK) as u8
}

/// Second data byte (velocity for note commands).
#[inline]
pub const fn data2(packed: u32) -> u8 {
    (packed & MASK) as u8
}

/// Typed view of a packed command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Command {
    /// What to do
    pub kind: CommandKind,
    /// Target channel
    pub channel: u8,
    /// First data byte
    pub data1: u8,
    /// Second data byte
    pub data2: u8,
}

impl Command {
    /// Note on with velocity.
    pub fn note_on(channel: u8, note: u8, velocity: u8) -> Self {
        Self {
            kind: CommandKind::Add,
            channel,
            data1: note,
            data2: velocity,
        }
    }

    /// Note off. Velocity is zero.
    pub fn note_off(channel: u8, note: u8) -> Self {
        Self {
            kind: CommandKind::NoteOff,
            channel,
            data1: note,
            data2: 0,
        }
    }

    /// Retrigger a sounding note.
    pub fn retrigger(channel: u8, note: u8, velocity: u8) -> Self {
        Self {
            kind: CommandKind::Retrigger,
            channel,
            data1: note,
            data2: velocity,
        }
    }

    /// Remove an entry. Only `data1` is meaningful; channel is 0.
    pub fn remove(data1: u8) -> Self {
        Self {
            kind: CommandKind::Remove,
            channel: 0,
            data1,
            data2: 0,
        }
    }

    /// Pack into a command word.
    #[inline]
    pub fn pack(self) -> u32 {
        pack(self.kind.code(), self.channel, self.data1, self.data2)
    }

    /// Decode a command word. Returns `None` when the kind byte is unknown.
    #[inline]
    pub fn unpack(packed: u32) -> Option<Self> {
        CommandKind::from_code(kind(packed)).map(|kind| Self {
            kind,
            channel: channel(packed),
            data1: data1(packed),
            data2: data2(packed),
        })
    }
}

impl From<Command> for u32 {
    fn from(cmd: Command) -> u32 {
        cmd.pack()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Cmd{{{}}} Ch{{{}}} D1{{{}}} D2{{{}}}",
            self.kind.code(),
            self.channel,
            self.data1,
            self.data2
        )
    }
}
