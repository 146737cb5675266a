//! Receiver and sender settings.

use crate::Error;
use crate::connection::Role;

const KIB: usize = 1024;
const MIB: usize = 1024 * KIB;

/// Caps on what a peer may make the receiver hold in memory.
///
/// Exceeding any of them fails the connection with close code 1009.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Largest payload one frame may announce. Checked on the header, before
    /// the payload is buffered.
    ///
    /// Default: 16 MiB
    pub max_frame_size: usize,

    /// Largest reassembled message, counted after payload transforms so
    /// that an inflated message is measured at its real size.
    ///
    /// Default: 64 MiB
    pub max_message_size: usize,

    /// Most data frames one message may be split into.
    ///
    /// Default: 128
    pub max_fragment_count: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self::new(16 * MIB, 64 * MIB, 128)
    }
}

impl Limits {
    #[must_use]
    pub const fn new(
        max_frame_size: usize,
        max_message_size: usize,
        max_fragment_count: usize,
    ) -> Self {
        Self {
            max_frame_size,
            max_message_size,
            max_fragment_count,
        }
    }

    /// Tight limits for peers with little memory: 64 KiB frames, 256 KiB
    /// messages, 16 fragments.
    #[must_use]
    pub const fn embedded() -> Self {
        Self::new(64 * KIB, 256 * KIB, 16)
    }

    /// Only the decoder's own 4 GiB frame ceiling applies.
    ///
    /// Meant for trusted peers.
    #[must_use]
    pub const fn unrestricted() -> Self {
        Self::new(u32::MAX as usize, usize::MAX, usize::MAX)
    }

    /// # Errors
    ///
    /// `Error::MessageTooLarge` if `size` is above `max_message_size`.
    pub const fn check_message_size(&self, size: usize) -> Result<(), Error> {
        if size <= self.max_message_size {
            return Ok(());
        }
        Err(Error::MessageTooLarge {
            size,
            max: self.max_message_size,
        })
    }

    /// # Errors
    ///
    /// `Error::FrameTooLarge` if the announced payload length is above
    /// `max_frame_size`.
    pub const fn check_frame_size(&self, payload_len: u64) -> Result<(), Error> {
        if payload_len <= self.max_frame_size as u64 {
            return Ok(());
        }
        Err(Error::FrameTooLarge {
            size: payload_len as usize,
            max: self.max_frame_size,
        })
    }

    /// # Errors
    ///
    /// `Error::TooManyFragments` if `count` is above `max_fragment_count`.
    pub const fn check_fragment_count(&self, count: usize) -> Result<(), Error> {
        if count <= self.max_fragment_count {
            return Ok(());
        }
        Err(Error::TooManyFragments {
            count,
            max: self.max_fragment_count,
        })
    }
}

/// Settings for one end of a connection.
#[derive(Debug, Clone)]
pub struct Config {
    pub limits: Limits,

    /// Which end this is. Decides outgoing masking.
    ///
    /// Default: `Role::Client`
    pub role: Role,

    /// Enforce RFC 6455 masking by role: a server rejects unmasked frames
    /// and a client rejects masked ones.
    ///
    /// Off by default. Masked payloads are unmasked and unmasked payloads
    /// pass through whichever end receives them.
    ///
    /// Default: false
    pub strict_masking: bool,

    /// Have [`WebSocketCodec`](crate::WebSocketCodec) answer pings and echo
    /// the peer's Close.
    ///
    /// Default: true
    pub auto_pong: bool,

    /// Initial receive buffer capacity, also the size of each socket read.
    ///
    /// Default: 8 KiB
    pub read_buffer_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            role: Role::Client,
            strict_masking: false,
            auto_pong: true,
            read_buffer_size: 8 * KIB,
        }
    }
}

impl Config {
    /// Defaults for the connecting side.
    #[must_use]
    pub fn client() -> Self {
        Self::default()
    }

    /// Defaults for the accepting side.
    #[must_use]
    pub fn server() -> Self {
        Self::default().with_role(Role::Server)
    }

    #[must_use]
    pub const fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    #[must_use]
    pub const fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    #[must_use]
    pub const fn with_strict_masking(mut self, strict: bool) -> Self {
        self.strict_masking = strict;
        self
    }

    #[must_use]
    pub const fn with_auto_pong(mut self, enabled: bool) -> Self {
        self.auto_pong = enabled;
        self
    }

    #[must_use]
    pub const fn with_read_buffer_size(mut self, bytes: usize) -> Self {
        self.read_buffer_size = bytes;
        self
    }
}
