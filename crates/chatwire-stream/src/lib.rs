//! # chatwire-stream: chat subscription engine
//!
//! Consumes the `text/event-stream` body of a chat subscription and delivers
//! decoded [`EventEnvelope`](chatwire_protocol::EventEnvelope)s to a
//! [`SubscriptionHandler`], in wire order, on one task.
//!
//! ## Module Overview
//!
//! - [`frame`]: FrameSplitter, blank-line framing over arbitrary chunks
//! - [`decode`]: `decode_frame` and the `envelope_stream` adapter
//! - [`transport`]: Transport port, `HttpTransport` (reqwest)
//! - [`config`]: SubscriptionConfig and the subscribe URL
//! - [`subscription`]: state machine, handler trait, spawned handles
//! - [`error`]: StreamError, DecodeError

pub mod config;
pub mod decode;
pub mod error;
pub mod frame;
pub mod subscription;
pub mod transport;

pub use config::{DEFAULT_HOST, DEFAULT_PORT, SubscriptionConfig};
pub use decode::{DONE_SENTINEL, decode_frame, envelope_stream};
pub use error::{DecodeError, StreamError};
pub use frame::{FrameSplitter, MAX_FRAME_BYTES};
pub use subscription::{
    SubscriptionHandle, SubscriptionHandler, SubscriptionState, run_subscription, subscribe,
};
pub use transport::{ByteStream, HttpTransport, Transport};
