//! Pending handler queue.
//!
//! One task is appended per decoded frame. Tasks run strictly front to back
//! and the queue only advances once the front task has finished, so a slow
//! transform on an early fragment holds back everything decoded after it.

use std::collections::VecDeque;

use crate::connection::state::FrameSnapshot;
use crate::error::Error;

/// Deferred work for one decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingTask {
    /// A frame whose payload still has to be transformed, validated and
    /// delivered.
    Frame {
        /// Fragmentation flags at decode time.
        snapshot: FrameSnapshot,
        /// Unmasked payload.
        payload: Vec<u8>,
    },
    /// Decoding failed after the frames queued before it.
    Fail(Error),
}

/// FIFO of [`PendingTask`]s owned by one receiver.
#[derive(Debug, Default)]
pub struct HandlerQueue {
    tasks: VecDeque<PendingTask>,
}

impl HandlerQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a task behind everything already queued.
    pub fn push(&mut self, task: PendingTask) {
        self.tasks.push_back(task);
    }

    /// Take the oldest task.
    pub fn pop(&mut self) -> Option<PendingTask> {
        self.tasks.pop_front()
    }

    /// Number of tasks waiting.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether no task is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Drop every waiting task.
    pub fn clear(&mut self) {
        self.tasks.clear();
    }
}
