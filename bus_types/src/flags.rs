//! Name-ownership request flags and daemon replies
//!
//! The bit positions match the daemon's `RequestName` flags argument, so a
//! [`RequestNameFlags`] value travels on the wire as [`RequestNameFlags::bits`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Ownership-acquisition semantics for a `RequestName` call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestNameFlags {
    /// Another connection requesting with `replace_existing` may take the name from us
    pub allow_replacement: bool,
    /// Take the name from its current owner if that owner allows replacement
    pub replace_existing: bool,
    /// Fail instead of waiting in the owner queue
    pub do_not_queue: bool,
}

impl RequestNameFlags {
    pub const ALLOW_REPLACEMENT: u32 = 0x1;
    pub const REPLACE_EXISTING: u32 = 0x2;
    pub const DO_NOT_QUEUE: u32 = 0x4;

    /// No flags set
    pub const fn none() -> Self {
        Self {
            allow_replacement: false,
            replace_existing: false,
            do_not_queue: false,
        }
    }

    /// Encodes the flags as the daemon's bitmask
    pub fn bits(&self) -> u32 {
        let mut bits = 0;
        if self.allow_replacement {
            bits |= Self::ALLOW_REPLACEMENT;
        }
        if self.replace_existing {
            bits |= Self::REPLACE_EXISTING;
        }
        if self.do_not_queue {
            bits |= Self::DO_NOT_QUEUE;
        }
        bits
    }

    /// Decodes the daemon's bitmask; unknown bits are ignored
    pub fn from_bits(bits: u32) -> Self {
        Self {
            allow_replacement: bits & Self::ALLOW_REPLACEMENT != 0,
            replace_existing: bits & Self::REPLACE_EXISTING != 0,
            do_not_queue: bits & Self::DO_NOT_QUEUE != 0,
        }
    }

    pub fn with_allow_replacement(mut self, value: bool) -> Self {
        self.allow_replacement = value;
        self
    }

    pub fn with_replace_existing(mut self, value: bool) -> Self {
        self.replace_existing = value;
        self
    }

    pub fn with_do_not_queue(mut self, value: bool) -> Self {
        self.do_not_queue = value;
        self
    }
}

/// Default flags steal a name from a prior owner that allows it, but never
/// let this connection be displaced without an explicit opt-in.
impl Default for RequestNameFlags {
    fn default() -> Self {
        Self {
            allow_replacement: false,
            replace_existing: true,
            do_not_queue: false,
        }
    }
}

/// Daemon reply to `RequestName`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestNameReply {
    /// The caller is now the primary owner
    PrimaryOwner,
    /// The name is owned elsewhere; the caller waits in the queue
    InQueue,
    /// The name is owned elsewhere and the caller asked not to queue
    Exists,
    /// The caller already owned the name
    AlreadyOwner,
}

impl RequestNameReply {
    pub fn code(&self) -> u32 {
        match self {
            Self::PrimaryOwner => 1,
            Self::InQueue => 2,
            Self::Exists => 3,
            Self::AlreadyOwner => 4,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(Self::PrimaryOwner),
            2 => Some(Self::InQueue),
            3 => Some(Self::Exists),
            4 => Some(Self::AlreadyOwner),
            _ => None,
        }
    }

    /// Whether the caller owns the name after this reply
    pub fn is_owner(&self) -> bool {
        matches!(self, Self::PrimaryOwner | Self::AlreadyOwner)
    }
}

impl fmt::Display for RequestNameReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::PrimaryOwner => "primary owner",
            Self::InQueue => "queued behind the current owner",
            Self::Exists => "name already has an owner",
            Self::AlreadyOwner => "already owner",
        };
        f.write_str(text)
    }
}

/// Daemon reply to `ReleaseName`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReleaseNameReply {
    Released,
    NonExistent,
    NotOwner,
}

impl ReleaseNameReply {
    pub fn code(&self) -> u32 {
        match self {
            Self::Released => 1,
            Self::NonExistent => 2,
            Self::NotOwner => 3,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(Self::Released),
            2 => Some(Self::NonExistent),
            3 => Some(Self::NotOwner),
            _ => None,
        }
    }
}
