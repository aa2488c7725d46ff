mod config;
mod handles;
mod mock;
mod params;
mod smart_card_error;
