//! Message-level driver over tokio streams.
//!
//! [`WebSocketCodec`] reads from an `AsyncRead + AsyncWrite` stream, feeds
//! the bytes to a [`Receiver`](crate::connection::Receiver) and writes what
//! the [`Sender`](crate::connection::Sender) produces, answering pings and
//! close frames along the way.

mod framed;

pub use framed::WebSocketCodec;
