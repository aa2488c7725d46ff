//! Client side of the boundary: proxies implementing the capability traits
//! by turning every call into an RPC request.
//!
//! The platform proxy owns its device proxies; a device proxy owns at most
//! one card proxy. Releases cascade downwards and each level untracks itself
//! from its parent once released.

mod card;
mod device;
mod platform;
mod request_id;
mod rpc;

pub use card::CardProxy;
pub use device::DeviceProxy;
pub use platform::PlatformProxy;
pub use request_id::RequestIdGenerator;
