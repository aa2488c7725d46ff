use crate::ErrorLocation;
use crate::apdu::sw;
use crate::error::model_error::ModelError;

use std::panic::Location;

/// A response APDU: body followed by the two status bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseApdu {
    data: Vec<u8>,
    sw1: u8,
    sw2: u8,
}

impl ResponseApdu {
    pub fn new(data: Vec<u8>, sw1: u8, sw2: u8) -> Self {
        Self { data, sw1, sw2 }
    }

    /// Body-less response carrying only a status word.
    pub fn status(sw: u16) -> Self {
        let [sw1, sw2] = sw.to_be_bytes();
        Self::new(Vec::new(), sw1, sw2)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn sw1(&self) -> u8 {
        self.sw1
    }

    pub fn sw2(&self) -> u8 {
        self.sw2
    }

    pub fn sw(&self) -> u16 {
        u16::from_be_bytes([self.sw1, self.sw2])
    }

    pub fn is_success(&self) -> bool {
        self.sw() == sw::SUCCESS
    }

    /// Retry counter reported by a `63Cx` VERIFY failure.
    pub fn remaining_pin_attempts(&self) -> Option<u8> {
        (self.sw1 == 0x63).then_some(self.sw2 & 0x0F)
    }

    /// `data ‖ sw1 ‖ sw2`
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.data.len() + 2);
        out.extend_from_slice(&self.data);
        out.push(self.sw1);
        out.push(self.sw2);
        out
    }

    #[track_caller]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ModelError> {
        let [data @ .., sw1, sw2] = bytes else {
            return Err(ModelError::Decoding {
                message: format!(
                    "Response APDU needs at least 2 status bytes, got {}",
                    bytes.len()
                ),
                location: ErrorLocation::from(Location::caller()),
            });
        };
        Ok(Self::new(data.to_vec(), *sw1, *sw2))
    }
}
