//! APDU-over-IP: a smart-card platform mirrored across an RPC boundary.
//!
//! ## Layers
//!
//! - **platform**: the capability traits ([`SmartCardPlatform`],
//!   [`SmartCardDevice`], [`SmartCard`]) and an in-process mock
//! - **transport**: the client/server transport contracts and the in-memory,
//!   HTTP and WebSocket bindings
//! - **server**: [`SmartCardPlatformAdapter`], which owns the handle tables and
//!   dispatches requests onto a real platform
//! - **client**: [`PlatformProxy`] and friends, which implement the same
//!   traits by issuing requests
//! - **config**: bridge configuration loaded from TOML and the environment
//!
//! Code written against `dyn SmartCardPlatform` cannot tell which side of the
//! wire it is on.

pub mod client;
pub mod config;
pub mod error;
pub mod platform;
pub mod server;
pub mod transport;

#[cfg(test)]
mod tests;

pub use client::{CardProxy, DeviceProxy, PlatformProxy};
pub use config::BridgeConfig;
pub use error::{ConfigError, SmartCardError, TransportError};
pub use platform::mock::MockPlatform;
pub use platform::{EmulatedCard, SmartCard, SmartCardDevice, SmartCardPlatform};
pub use server::{SmartCardPlatformAdapter, UnavailableHandler};
pub use transport::{
    ClientTransport, HttpClientTransport, HttpServerConfig, HttpServerTransport,
    InMemoryTransport, RpcHandler, ServerTransport, WsClientTransport, WsServerConfig,
    WsServerTransport,
};
