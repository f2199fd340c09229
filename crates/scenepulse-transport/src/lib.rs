//! `scenepulse-transport` – live sensor stream client.
//!
//! Keeps a single logical connection to the sensor hub, decodes typed
//! envelopes and hands them to subscribers, and reconnects on failure.
//!
//! # Modules
//!
//! - [`codec`] – JSON frame decoding/encoding (`{type, payload}` envelopes).
//! - [`subscribers`] – per-[`EventKind`][scenepulse_types::EventKind]
//!   callback lists, invoked in registration order.
//! - [`reconnect`] – the [`ConnectionState`] machine with its bounded,
//!   single-timer retry policy.
//! - [`connector`] – the [`Connector`] / [`Connection`] seam plus the
//!   WebSocket implementation built on `tokio-tungstenite`.
//! - [`client`] – [`TransportClient`] (the run loop) and its cloneable
//!   [`TransportHandle`].
//! - [`mock_hub`] – [`MockHub`], a local WebSocket server emitting sample
//!   envelopes for development without sensors.

pub mod client;
pub mod codec;
pub mod connector;
pub mod mock_hub;
pub mod reconnect;
pub mod subscribers;

pub use client::{SendOutcome, TransportClient, TransportConfig, TransportHandle};
pub use connector::{Connection, Connector, WsConnector};
pub use mock_hub::{MockHub, MockHubConfig};
pub use reconnect::{ConnectionMachine, ConnectionState, RetryDecision};
pub use subscribers::SubscriberRegistry;
