use std::collections::VecDeque;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::config::Config;
use crate::connection::{Receiver, Role, Sender};
use crate::error::{Error, Result};
use crate::extensions::TransformPipeline;
use crate::handler::{Event, EventLog};
use crate::message::{CloseCode, CloseFrame, Message};

/// A [`Receiver`] and [`Sender`] driven over an async byte stream.
///
/// The stream must already be past the HTTP upgrade.
pub struct WebSocketCodec<T> {
    io: T,
    receiver: Receiver,
    sender: Sender,
    events: EventLog,
    backlog: VecDeque<Event>,
    failure: Option<Error>,
    read_buf: Vec<u8>,
    auto_pong: bool,
    close_sent: bool,
}

impl<T> WebSocketCodec<T> {
    #[must_use]
    pub fn new(io: T, config: Config) -> Self {
        let sender = Sender::new(config.role);
        Self::from_parts(io, Receiver::new(config), sender)
    }

    /// Assemble a codec from a prepared receiver and sender.
    #[must_use]
    pub fn from_parts(io: T, receiver: Receiver, sender: Sender) -> Self {
        let config = receiver.config();
        Self {
            io,
            read_buf: vec![0; config.read_buffer_size.max(1)],
            auto_pong: config.auto_pong,
            receiver,
            sender,
            events: EventLog::new(),
            backlog: VecDeque::new(),
            failure: None,
            close_sent: false,
        }
    }

    /// Install receive-side payload transforms on the current receiver.
    ///
    /// Anything the receiver has already buffered is kept.
    #[must_use]
    pub fn with_transforms(mut self, transforms: TransformPipeline) -> Self {
        let placeholder = Receiver::new(self.receiver.config().clone());
        let receiver = std::mem::replace(&mut self.receiver, placeholder);
        self.receiver = receiver.with_transforms(transforms);
        self
    }

    /// Replace the sender, e.g. one with compression enabled.
    #[must_use]
    pub fn with_sender(mut self, sender: Sender) -> Self {
        self.sender = sender;
        self
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.sender.role()
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        self.receiver.config()
    }

    /// Whether a Close frame has been sent.
    #[must_use]
    pub fn close_sent(&self) -> bool {
        self.close_sent
    }

    #[must_use]
    pub fn get_ref(&self) -> &T {
        &self.io
    }

    #[must_use]
    pub fn into_inner(self) -> T {
        self.io
    }
}

impl<T: AsyncRead + AsyncWrite + Unpin> WebSocketCodec<T> {
    /// Receive the next message.
    ///
    /// Returns `Ok(None)` once a Close has been delivered, after a failure
    /// has been reported, or when the stream ends. With `auto_pong` every
    /// Ping is answered and the first Close is echoed before it is returned.
    ///
    /// # Errors
    ///
    /// A protocol error is returned once, after a Close frame carrying its
    /// close code has been written to the peer. I/O errors are returned as
    /// they occur.
    pub async fn recv(&mut self) -> Result<Option<Message>> {
        loop {
            if let Some(event) = self.backlog.pop_front() {
                return self.deliver(event).await;
            }
            if self.receiver.is_closed() || self.receiver.failure().is_some() {
                return Ok(None);
            }

            let n = self.io.read(&mut self.read_buf).await?;
            if n == 0 {
                debug!(role = %self.role(), "stream ended");
                return Ok(None);
            }
            self.receiver.feed(&self.read_buf[..n])?;
            if let Err(err) = self.receiver.drain(&mut self.events).await {
                self.fail(err).await;
            }
            self.backlog.extend(self.events.take());
        }
    }

    /// Send one message and flush.
    ///
    /// # Errors
    ///
    /// - `Error::ConnectionClosed` after a Close has been sent
    /// - encoding errors from [`Sender::encode`]
    /// - I/O errors
    pub async fn send(&mut self, message: Message) -> Result<()> {
        if self.close_sent {
            return Err(Error::ConnectionClosed(None));
        }
        if matches!(message, Message::Close(_)) {
            self.close_sent = true;
        }
        let bytes = self.sender.encode(message)?;
        self.write(&bytes).await
    }

    /// Start the closing handshake.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn close(&mut self, code: CloseCode, reason: &str) -> Result<()> {
        self.send(Message::close(code, reason)).await
    }

    pub async fn flush(&mut self) -> Result<()> {
        self.io.flush().await?;
        Ok(())
    }

    async fn deliver(&mut self, event: Event) -> Result<Option<Message>> {
        match event {
            Event::Text(text) => Ok(Some(Message::Text(text))),
            Event::Binary(data) => Ok(Some(Message::Binary(data))),
            Event::Pong(data) => Ok(Some(Message::Pong(data))),
            Event::Ping(data) => {
                if self.auto_pong && !self.close_sent {
                    let pong = self.sender.pong(data.clone())?;
                    self.write(&pong).await?;
                }
                Ok(Some(Message::Ping(data)))
            }
            Event::Close { code, reason } => {
                let close = CloseFrame::new(CloseCode::from_u16(code), reason);
                if self.auto_pong && !self.close_sent {
                    self.close_sent = true;
                    let echo = self.sender.encode(Message::Close(Some(close.clone())))?;
                    self.write(&echo).await?;
                }
                Ok(Some(Message::Close(Some(close))))
            }
            Event::ProtocolError { message, .. } => Err(self
                .failure
                .take()
                .unwrap_or(Error::ProtocolViolation(message))),
        }
    }

    async fn fail(&mut self, err: Error) {
        if !self.close_sent {
            self.close_sent = true;
            let code = err.close_code();
            debug!(error = %err, code = code.as_u16(), "sending close after failure");
            if let Ok(bytes) = self.sender.close(code, "") {
                let _ = self.write(&bytes).await;
            }
        }
        self.failure = Some(err);
    }

    async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.io.write_all(bytes).await?;
        self.io.flush().await?;
        Ok(())
    }
}
