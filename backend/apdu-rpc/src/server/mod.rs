//! Server side of the RPC boundary.
//!
//! [`SmartCardPlatformAdapter`] owns the handle tables and turns method names
//! into calls on a wrapped [`crate::platform::SmartCardPlatform`].
//! [`UnavailableHandler`] stands in when no platform could be built.

mod adapter;
mod handles;
pub(crate) mod params;
mod unavailable;

pub use adapter::SmartCardPlatformAdapter;
pub use handles::HandleTable;
pub use unavailable::UnavailableHandler;
