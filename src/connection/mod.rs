//! Per-connection receive and send state.
//!
//! - [`Receiver`] decodes incoming bytes, keeps the fragmentation state and
//!   the pending handler queue, and delivers events in decode order.
//! - [`Sender`] encodes outgoing messages for the connection's [`Role`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use wsengine::{Config, EventLog, Receiver};
//!
//! let mut receiver = Receiver::new(Config::server());
//! let mut events = EventLog::new();
//!
//! receiver.feed(&bytes_from_socket)?;
//! receiver.drain(&mut events).await?;
//! ```

pub mod queue;
pub mod receiver;
mod role;
pub mod sender;
pub mod state;

pub use queue::{HandlerQueue, PendingTask};
pub use receiver::Receiver;
pub use role::Role;
pub use sender::Sender;
pub use state::{FragmentState, FrameSnapshot, ReadState};
