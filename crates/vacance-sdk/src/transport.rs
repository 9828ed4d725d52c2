//! Transport abstraction for the real-time channel.
//!
//! A [`Connector`] opens one duplex, message-framed connection and returns
//! it as a sink of outbound text frames and a stream of inbound ones. The
//! stream ending (or yielding an error) means the transport closed.

use std::pin::Pin;

use futures::future::BoxFuture;
use futures::{Sink, Stream};

use crate::error::SdkError;

/// Outbound half of a connection.
pub type FrameSink = Pin<Box<dyn Sink<String, Error = SdkError> + Send>>;

/// Inbound half of a connection.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String, SdkError>> + Send>>;

/// Opens connections to a URL.
pub trait Connector: Send + Sync + 'static {
    /// Start one connection attempt.
    fn connect(&self, url: &str) -> BoxFuture<'static, Result<(FrameSink, FrameStream), SdkError>>;
}
