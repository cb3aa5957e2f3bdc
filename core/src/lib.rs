//! Client core for a content-addressed storage gateway's HTTP API.
//!
//! # Overview
//! Every call runs the same pipeline: resolve the active `Provider`, encode
//! a `Request` into an `HttpRequest` (multipart when there is a payload),
//! hand it to a `Transport`, and decode the buffered `HttpResponse` into a
//! `Decoded` value or a `GatewayError`.
//!
//! # Design
//! - Encoding and decoding are pure and synchronous; the only await point is
//!   the transport.
//! - `Transport` is a trait so the pipeline can run over `reqwest`, any other
//!   HTTP stack, or a scripted stand-in in tests.
//! - `GatewayClient` holds the provider as an immutable snapshot behind a
//!   lock; reconfiguration swaps the snapshot and never touches calls that
//!   already started.

pub mod client;
pub mod decode;
pub mod error;
pub mod http;
pub mod payload;
pub mod provider;
pub mod transport;
pub mod types;

pub use client::GatewayClient;
pub use decode::{decode, Decoded};
pub use error::{ErrorKind, GatewayError, TransportErrorKind};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use payload::{encode, Payload, Request};
pub use provider::{Protocol, Provider, ProviderOptions};
pub use transport::{dispatch, ReqwestTransport, Transport};
pub use types::Added;
