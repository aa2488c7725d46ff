pub mod config;
pub mod smart_card;
pub mod transport;

pub use config::ConfigError;
pub use smart_card::SmartCardError;
pub use transport::TransportError;
