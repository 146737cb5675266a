//! Which end of the connection an engine instance serves.

/// Connection role.
///
/// The initiating side masks everything it sends, the accepting side masks
/// nothing (RFC 6455 Section 5.3). Incoming masking is only checked against
/// the role when strict masking is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Role {
    /// Connection-initiating side. Masks outgoing frames.
    #[default]
    Client,
    /// Accepting side. Sends unmasked frames.
    Server,
}

impl Role {
    /// Whether frames sent by this role carry a masking key.
    #[inline]
    #[must_use]
    pub const fn must_mask(&self) -> bool {
        matches!(self, Role::Client)
    }

    /// Whether frames received by this role should carry a masking key.
    #[inline]
    #[must_use]
    pub const fn expects_masked(&self) -> bool {
        matches!(self, Role::Server)
    }

    /// The role of the other end.
    #[inline]
    #[must_use]
    pub const fn peer(&self) -> Role {
        match self {
            Role::Client => Role::Server,
            Role::Server => Role::Client,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Client => write!(f, "client"),
            Role::Server => write!(f, "server"),
        }
    }
}
