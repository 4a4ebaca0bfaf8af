//! # waggle-client
//!
//! Client for a partitioned, cluster-aware broker.
//!
//! The heart of the crate is the [`RequestController`]: a cooperative,
//! non-blocking state machine that drives one outbound request at a time —
//! resolving the target broker from a cached [`TopologyView`], sending the
//! encoded frame through a [`TransportOutput`], decoding the response, and
//! retrying against a refreshed topology until a wall-clock deadline.
//! Controllers are pooled by the [`RequestDispatcher`] and stepped from a
//! single runner thread; callers observe results through a thread-safe
//! one-shot [`ResponseFuture`].
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │               Caller                             │
//! │   send_command / send_control_message            │
//! │           → ResponseFuture                       │
//! ├──────────────────────────────────────────────────┤
//! │   RequestDispatcher (pool + duty cycle)          │
//! ├──────────────────────────────────────────────────┤
//! │   RequestController (state machine, deadline,    │
//! │   retry loop, single sink completion)            │
//! ├───────────────┬──────────────────┬───────────────┤
//! │ TopologyView  │ TransportOutput  │ waggle-protocol│
//! │ (leader cache │ (sockets, slots, │ (frame codecs) │
//! │  + refresh)   │  pending replies)│                │
//! └───────────────┴──────────────────┴───────────────┘
//! ```
//!
//! ## Components
//!
//! | Component | Purpose |
//! |-----------|---------|
//! | [`RequestController`] | Per-request state machine with deadline and retry |
//! | [`RequestDispatcher`] | Controller pool and cooperative stepping |
//! | [`TopologyView`] | Cached (topic, partition) → broker directory |
//! | [`TransportOutput`] | Outbound transport seam (sockets live elsewhere) |
//! | [`ResponseFuture`] | Thread-safe one-shot result handle |
//!
//! ## Concurrency model
//!
//! Single-threaded cooperative: one runner thread owns a dispatcher and
//! calls [`RequestDispatcher::poll`] in its duty cycle. `step()` never
//! blocks; waiting is a 0-work-unit return. Only the response sink crosses
//! threads, and it is the one piece built on `Arc`.

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]

mod addr;
mod clock;
mod codec;
mod config;
mod controller;
mod dispatcher;
mod error;
mod request;
mod sink;
mod topology;
mod transport;

// Addressing exports
pub use addr::{AddressParseError, BrokerAddress};

// Clock exports
pub use clock::{Clock, SystemClock};

// Payload codec exports
pub use codec::{CodecError, JsonCodec, PayloadCodec};

// Config exports
pub use config::{ClientConfig, DEFAULT_MAX_IN_FLIGHT, DEFAULT_REQUEST_TIMEOUT};

// Controller exports
pub use controller::{ReleaseFn, RequestController};

// Dispatcher exports
pub use dispatcher::RequestDispatcher;

// Error exports
pub use error::ClientError;

// Request/response exports
pub use request::{Command, CommandResponse, ControlMessage, ControlResponse, ResponseValue, Routing};

// Sink exports
pub use sink::{ResponseFuture, ResponseSink, response_channel};

// Topology exports
pub use topology::{RefreshCompleter, RefreshHandle, StaticTopology, TopologyError, TopologyView};

// Transport exports
pub use transport::{PendingResponse, TransportError, TransportOutput};

// Protocol re-exports for convenience
pub use waggle_protocol::{ControlMessageType, ErrorCode};
