//! Payload transform pipeline (RFC 6455 Section 9).
//!
//! Negotiated extensions that rewrite message payloads (permessage-deflate
//! being the usual one) plug in here as [`Transform`]s. The receiver hands
//! every data fragment to the pipeline as
//! `(payload, is_last_fragment, is_compressed)` and appends whatever comes
//! back. A transform may return `None` to say "no output yet", e.g. while it
//! buffers fragments of a compressed message internally.
//!
//! Transforms return futures so that an implementation can offload work to
//! another task or thread. The receiver awaits them one at a time in frame
//! order, so output order never depends on completion order.
//!
//! # Example
//!
//! ```rust,ignore
//! use wsengine::extensions::{Transform, TransformFuture, TransformPipeline, ready};
//!
//! struct Uppercase;
//!
//! impl Transform for Uppercase {
//!     fn name(&self) -> &str { "x-uppercase" }
//!
//!     fn apply(&mut self, mut payload: Vec<u8>, _last: bool, _compressed: bool) -> TransformFuture<'_> {
//!         payload.make_ascii_uppercase();
//!         ready(Ok(Some(payload)))
//!     }
//! }
//!
//! let mut pipeline = TransformPipeline::new();
//! pipeline.add(Box::new(Uppercase))?;
//! ```

#[cfg(feature = "compression")]
pub mod deflate;

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use crate::error::{Error, Result};

/// Future returned by [`Transform::apply`].
pub type TransformFuture<'a> = Pin<Box<dyn Future<Output = Result<Option<Vec<u8>>>> + Send + 'a>>;

/// Wrap an already computed result as a [`TransformFuture`].
pub fn ready(output: Result<Option<Vec<u8>>>) -> TransformFuture<'static> {
    Box::pin(std::future::ready(output))
}

/// RSV bit usage declaration for transforms.
///
/// Transforms must declare which RSV bits they use to prevent conflicts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RsvBits {
    /// Transform uses RSV1 bit (e.g., permessage-deflate).
    pub rsv1: bool,
    /// Transform uses RSV2 bit.
    pub rsv2: bool,
    /// Transform uses RSV3 bit.
    pub rsv3: bool,
}

impl RsvBits {
    /// No RSV bits used.
    pub const NONE: Self = Self {
        rsv1: false,
        rsv2: false,
        rsv3: false,
    };

    /// RSV1 only (used by permessage-deflate).
    pub const RSV1: Self = Self {
        rsv1: true,
        rsv2: false,
        rsv3: false,
    };

    /// Check if any bits conflict with another declaration.
    #[must_use]
    pub const fn conflicts_with(&self, other: &RsvBits) -> bool {
        (self.rsv1 && other.rsv1) || (self.rsv2 && other.rsv2) || (self.rsv3 && other.rsv3)
    }

    const fn union(self, other: RsvBits) -> Self {
        Self {
            rsv1: self.rsv1 || other.rsv1,
            rsv2: self.rsv2 || other.rsv2,
            rsv3: self.rsv3 || other.rsv3,
        }
    }
}

/// A payload transform applied to incoming data fragments.
pub trait Transform: Send {
    /// Extension name as used in the Sec-WebSocket-Extensions header.
    fn name(&self) -> &str;

    /// Which RSV bits this transform claims.
    fn rsv_bits(&self) -> RsvBits {
        RsvBits::NONE
    }

    /// Transform one fragment.
    ///
    /// `is_compressed` is the RSV1 flag of the message's first fragment and
    /// stays the same for every continuation of that message.
    ///
    /// # Errors
    ///
    /// Any error fails the connection, with close code 1009 for
    /// `Error::MessageTooLarge` and 1007 otherwise.
    fn apply(&mut self, payload: Vec<u8>, is_last: bool, is_compressed: bool)
    -> TransformFuture<'_>;

    /// Drop buffered state after the connection failed.
    fn reset(&mut self) {}
}

/// Transform that passes every fragment through untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl Transform for Identity {
    fn name(&self) -> &str {
        "identity"
    }

    fn apply(
        &mut self,
        payload: Vec<u8>,
        _is_last: bool,
        _is_compressed: bool,
    ) -> TransformFuture<'_> {
        ready(Ok(Some(payload)))
    }
}

/// Ordered chain of transforms.
///
/// Each fragment runs through the transforms in registration order. A
/// transform returning `None` ends the chain for that fragment.
#[derive(Default)]
pub struct TransformPipeline {
    transforms: Vec<Box<dyn Transform>>,
    used_rsv_bits: RsvBits,
}

impl TransformPipeline {
    /// Create an empty pipeline, equivalent to [`Identity`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a transform.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidExtension`] if its RSV bits overlap those of a
    /// transform already in the pipeline.
    pub fn add(&mut self, transform: Box<dyn Transform>) -> Result<()> {
        let rsv = transform.rsv_bits();
        if self.used_rsv_bits.conflicts_with(&rsv) {
            return Err(Error::InvalidExtension(format!(
                "Transform '{}' RSV bits conflict with existing transforms",
                transform.name()
            )));
        }
        self.used_rsv_bits = self.used_rsv_bits.union(rsv);
        self.transforms.push(transform);
        Ok(())
    }

    /// Builder form of [`add`](Self::add).
    ///
    /// # Errors
    ///
    /// See [`add`](Self::add).
    pub fn with(mut self, transform: Box<dyn Transform>) -> Result<Self> {
        self.add(transform)?;
        Ok(self)
    }

    /// RSV bits claimed by all transforms together.
    #[must_use]
    pub fn rsv_bits(&self) -> RsvBits {
        self.used_rsv_bits
    }

    /// Number of transforms.
    #[must_use]
    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    /// Check if the pipeline is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    /// Run one fragment through every transform in order.
    ///
    /// # Errors
    ///
    /// A transform failure is reported as [`Error::Transform`] (1007).
    /// `Error::MessageTooLarge` from a transform that hit the message limit
    /// passes through unchanged and keeps its 1009.
    pub async fn apply(
        &mut self,
        payload: Vec<u8>,
        is_last: bool,
        is_compressed: bool,
    ) -> Result<Option<Vec<u8>>> {
        let mut data = payload;
        for transform in &mut self.transforms {
            let result = transform.apply(data, is_last, is_compressed).await;
            match result {
                Ok(Some(out)) => data = out,
                Ok(None) => return Ok(None),
                Err(err @ (Error::Transform(_) | Error::MessageTooLarge { .. })) => return Err(err),
                Err(other) => {
                    return Err(Error::Transform(format!("{}: {other}", transform.name())));
                }
            }
        }
        Ok(Some(data))
    }

    /// Reset every transform.
    pub fn reset(&mut self) {
        for transform in &mut self.transforms {
            transform.reset();
        }
    }
}

impl fmt::Debug for TransformPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformPipeline")
            .field(
                "transforms",
                &self.transforms.iter().map(|t| t.name()).collect::<Vec<_>>(),
            )
            .field("used_rsv_bits", &self.used_rsv_bits)
            .finish()
    }
}
