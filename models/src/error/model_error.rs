use crate::ErrorLocation;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum ModelError {
    #[error("Validation Error: {message} {location}")]
    Validation {
        message: String,
        location: ErrorLocation,
    },

    #[error("APDU Encoding Error: {message} {location}")]
    Encoding {
        message: String,
        location: ErrorLocation,
    },

    #[error("APDU Decoding Error: {message} {location}")]
    Decoding {
        message: String,
        location: ErrorLocation,
    },
}
