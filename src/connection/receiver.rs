//! Opcode state machine for incoming frames.
//!
//! [`Receiver::feed`] takes bytes as they arrive, decodes as many complete
//! frames as the buffer holds, checks each header and queues one task per
//! frame together with a snapshot of the fragmentation state.
//! [`Receiver::drain`] runs the queued tasks in order: payload transforms,
//! reassembly, UTF-8 and close-code checks, then the [`EventHandler`]
//! callback.
//!
//! Any error fails the connection for good. The handler hears about it once
//! through `on_protocol_error`, partial messages are discarded and later
//! input is refused.

use bytes::{Buf, BytesMut};
use tracing::{debug, trace};

use crate::config::Config;
use crate::connection::queue::{HandlerQueue, PendingTask};
use crate::connection::state::{FragmentState, FrameSnapshot, ReadState};
use crate::error::{Error, Result};
use crate::extensions::TransformPipeline;
use crate::handler::EventHandler;
use crate::message::{CloseCode, CloseFrame};
use crate::protocol::frame::FrameHeader;
use crate::protocol::{FrameValidator, OpCode, decode_header, decode_payload, validate_utf8};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Open,
    CloseReceived,
    Failed(CloseCode),
}

/// Receive side of one connection.
#[derive(Debug)]
pub struct Receiver {
    config: Config,
    validator: FrameValidator,
    transforms: TransformPipeline,
    buffer: BytesMut,
    read_state: ReadState,
    fragments: FragmentState,
    queue: HandlerQueue,
    lifecycle: Lifecycle,
}

impl Receiver {
    /// Create a receiver with an empty transform pipeline.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let validator = FrameValidator::new(config.role, config.limits.clone())
            .with_strict_masking(config.strict_masking);
        Self {
            buffer: BytesMut::with_capacity(config.read_buffer_size),
            config,
            validator,
            transforms: TransformPipeline::new(),
            read_state: ReadState::Idle,
            fragments: FragmentState::new(),
            queue: HandlerQueue::new(),
            lifecycle: Lifecycle::Open,
        }
    }

    /// Install the payload transforms negotiated for this connection.
    ///
    /// RSV1 becomes legal on data frames if a transform claims it.
    #[must_use]
    pub fn with_transforms(mut self, transforms: TransformPipeline) -> Self {
        self.validator = self.validator.with_rsv1(transforms.rsv_bits().rsv1);
        self.transforms = transforms;
        self
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Decoding stage of the frame at the front of the buffer.
    #[must_use]
    pub fn read_state(&self) -> ReadState {
        self.read_state
    }

    /// Number of queued tasks not yet drained.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Bytes buffered towards the next frame.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Whether a Close frame has been decoded.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lifecycle == Lifecycle::CloseReceived
    }

    /// Close code the connection failed with, if it failed.
    #[must_use]
    pub fn failure(&self) -> Option<CloseCode> {
        match self.lifecycle {
            Lifecycle::Failed(code) => Some(code),
            _ => None,
        }
    }

    /// Buffer `data` and queue every frame that is now complete.
    ///
    /// Returns the number of frames queued. A malformed frame does not make
    /// this call fail; it is queued as a failure behind the frames decoded
    /// before it and reported by [`drain`](Self::drain). Bytes arriving
    /// after a Close frame are ignored.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConnectionClosed` once the connection has failed.
    pub fn feed(&mut self, data: &[u8]) -> Result<usize> {
        match self.lifecycle {
            Lifecycle::Open => {}
            Lifecycle::CloseReceived => return Ok(0),
            Lifecycle::Failed(code) => return Err(Error::ConnectionClosed(Some(code.as_u16()))),
        }

        self.buffer.extend_from_slice(data);
        let mut queued = 0;
        while self.lifecycle == Lifecycle::Open {
            match self.decode_next() {
                Ok(Some(task)) => {
                    self.queue.push(task);
                    queued += 1;
                }
                Ok(None) => break,
                Err(err) => {
                    let code = err.close_code();
                    debug!(error = %err, code = code.as_u16(), "frame rejected");
                    self.queue.push(PendingTask::Fail(err));
                    self.lifecycle = Lifecycle::Failed(code);
                    self.buffer.clear();
                    self.set_read_state(ReadState::Idle);
                }
            }
        }
        if self.lifecycle == Lifecycle::CloseReceived {
            self.buffer.clear();
        }
        Ok(queued)
    }

    /// Run every queued task in order, delivering results to `handler`.
    ///
    /// A task is finished, transform included, before the next one starts.
    /// Returns the number of tasks run.
    ///
    /// # Errors
    ///
    /// On the first failure the handler's `on_protocol_error` is called, the
    /// remaining tasks are dropped and the same error is returned so the
    /// caller can answer with a Close frame.
    pub async fn drain<H>(&mut self, handler: &mut H) -> Result<usize>
    where
        H: EventHandler + ?Sized,
    {
        let mut ran = 0;
        while let Some(task) = self.queue.pop() {
            let outcome = match task {
                PendingTask::Frame { snapshot, payload } => {
                    self.run(snapshot, payload, handler).await
                }
                PendingTask::Fail(err) => Err(err),
            };
            if let Err(err) = outcome {
                self.fail(&err, handler);
                return Err(err);
            }
            ran += 1;
        }
        Ok(ran)
    }

    fn decode_next(&mut self) -> Result<Option<PendingTask>> {
        let header = match decode_header(&self.buffer) {
            Ok(header) => header,
            Err(err) if err.is_incomplete() => {
                self.set_read_state(ReadState::of_partial(&self.buffer));
                return Ok(None);
            }
            Err(err) => return Err(err),
        };

        self.validator.validate(&header, self.fragments.in_message())?;
        if !header.opcode.is_control() {
            let count = if header.opcode.starts_message() {
                1
            } else {
                self.fragments.fragment_count + 1
            };
            self.config.limits.check_fragment_count(count)?;
        }

        let payload = match decode_payload(&self.buffer[header.header_len..], &header) {
            Ok(payload) => payload,
            Err(err) if err.is_incomplete() => {
                self.set_read_state(ReadState::AwaitingPayload);
                return Ok(None);
            }
            Err(err) => return Err(err),
        };
        self.buffer.advance(header.frame_len()?);

        trace!(
            opcode = %header.opcode,
            fin = header.fin,
            rsv1 = header.rsv1,
            masked = header.masked,
            len = header.payload_len,
            "decoded frame"
        );
        self.set_read_state(ReadState::Dispatching);
        let task = self.snapshot_frame(&header, payload);
        self.set_read_state(ReadState::Idle);
        Ok(Some(task))
    }

    fn snapshot_frame(&mut self, header: &FrameHeader, payload: Vec<u8>) -> PendingTask {
        let snapshot = match header.opcode {
            OpCode::Text | OpCode::Binary | OpCode::Continuation => {
                self.fragments
                    .begin_fragment(header.opcode, header.fin, header.rsv1, header.masked);
                let snapshot = self.fragments.snapshot(payload.len());
                if header.fin {
                    self.fragments.end_message();
                }
                snapshot
            }
            OpCode::Close => {
                self.lifecycle = Lifecycle::CloseReceived;
                FrameSnapshot::control(header.opcode, header.masked, payload.len())
            }
            OpCode::Ping | OpCode::Pong => {
                FrameSnapshot::control(header.opcode, header.masked, payload.len())
            }
        };
        PendingTask::Frame { snapshot, payload }
    }

    async fn run<H>(&mut self, snapshot: FrameSnapshot, payload: Vec<u8>, handler: &mut H) -> Result<()>
    where
        H: EventHandler + ?Sized,
    {
        trace!(
            opcode = %snapshot.opcode,
            fragment = snapshot.fragment_index,
            last = snapshot.last_fragment,
            "running queued frame"
        );
        let meta = snapshot.meta();
        match snapshot.opcode {
            OpCode::Text | OpCode::Binary => {
                let output = self
                    .transforms
                    .apply(payload, snapshot.last_fragment, snapshot.compressed)
                    .await?;
                if let Some(chunk) = output {
                    let size = self.fragments.push_output(chunk);
                    self.config.limits.check_message_size(size)?;
                }
                if !snapshot.last_fragment {
                    return Ok(());
                }
                let data = self.fragments.take_message();
                if snapshot.opcode == OpCode::Text {
                    handler.on_text(validate_utf8(data)?, &meta);
                } else {
                    handler.on_binary(data, &meta);
                }
            }
            OpCode::Close => {
                let close = CloseFrame::parse(&payload)?;
                debug!(code = close.code.as_u16(), reason = %close.reason, "close frame received");
                handler.on_close(close.code, close.reason, &meta);
                self.fragments.reset();
                self.transforms.reset();
            }
            OpCode::Ping => handler.on_ping(payload, &meta),
            OpCode::Pong => handler.on_pong(payload, &meta),
            OpCode::Continuation => {
                return Err(Error::ProtocolViolation(
                    "Continuation frame without a message".into(),
                ));
            }
        }
        Ok(())
    }

    fn fail<H>(&mut self, err: &Error, handler: &mut H)
    where
        H: EventHandler + ?Sized,
    {
        let code = err.close_code();
        debug!(error = %err, code = code.as_u16(), dropped = self.queue.len(), "connection failed");
        self.queue.clear();
        self.fragments.reset();
        self.transforms.reset();
        self.buffer.clear();
        self.set_read_state(ReadState::Idle);
        self.lifecycle = Lifecycle::Failed(code);
        handler.on_protocol_error(err, code);
    }

    fn set_read_state(&mut self, next: ReadState) {
        if self.read_state != next {
            trace!(from = %self.read_state, to = %next, "read state");
            self.read_state = next;
        }
    }
}
