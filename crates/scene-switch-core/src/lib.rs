//! Core library for scene-switch
//!
//! Drives a streaming host application (Streamlabs-style scene service) over a
//! local interprocess pipe. The host speaks newline-delimited JSON: one request
//! line, one response line, one message in flight at a time.
//!
//! This crate provides:
//! - [`config`]: the on-disk configuration record and its loader
//! - [`protocol`]: request/response envelopes for the scene service
//! - [`transport`]: the duplex pipe connection and its line framing
//! - [`client`]: the scene RPC client with reconnect and retry policy
//! - [`logging`]: process-level tracing initialization

pub mod client;
pub mod config;
pub mod logging;
pub mod protocol;
pub mod transport;

pub use client::{CallError, ReconnectPlan, ReconnectPolicy, SceneClient, SwitchError};
pub use config::{Config, ConfigError};
pub use protocol::{RpcRequest, RpcResponse, Scene};
pub use transport::{Connector, NamedPipeConnector, PipeStream, PipeTransport, TransportError};
