//! # wsengine - WebSocket wire-protocol engine
//!
//! `wsengine` decodes and encodes RFC 6455 frames and runs the receive-side
//! state machine on top of them: fragment reassembly, control frame rules,
//! close frame parsing, UTF-8 checks and an ordered pipeline of payload
//! transforms such as permessage-deflate.
//!
//! The HTTP upgrade, TLS and socket handling are left to the caller. Bytes
//! go in through [`Receiver::feed`], events come out through an
//! [`EventHandler`], and [`Sender`] produces outgoing frames.
//!
//! ## Features
//!
//! - **Incremental decoding**: bytes may arrive in slices of any size
//! - **Strict validation** of masking, reserved bits and control frames
//! - **Ordered delivery** even when payload transforms complete asynchronously
//! - **Resource limits** on frame size, message size and fragment count
//! - `async-tokio` (default): [`WebSocketCodec`] over tokio streams
//! - `compression`: permessage-deflate via `flate2`
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use wsengine::{Config, EventLog, Receiver};
//!
//! let mut receiver = Receiver::new(Config::client());
//! let mut events = EventLog::new();
//!
//! receiver.feed(&[0x81, 0x02, b'h', b'i'])?;
//! receiver.drain(&mut events).await?;
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod extensions;
pub mod handler;
pub mod message;
pub mod protocol;

#[cfg(feature = "async-tokio")]
pub mod codec;

pub use config::{Config, Limits};
pub use connection::{Receiver, Role, Sender};
pub use error::{Error, Result};
pub use extensions::{Transform, TransformPipeline};
pub use handler::{Event, EventHandler, EventLog, FrameMeta};
pub use message::{CloseCode, CloseFrame, Message};
pub use protocol::{
    Frame, FrameHeader, OpCode, decode_header, decode_payload, encode_frame,
    encode_frame_with_mask,
};

#[cfg(feature = "async-tokio")]
pub use codec::WebSocketCodec;
