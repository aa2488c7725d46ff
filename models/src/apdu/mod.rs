//! ISO 7816-4 command/response units.

mod command;
mod response;
mod serialized;

pub use command::CommandApdu;
pub use response::ResponseApdu;
pub use serialized::{SerializedCommandApdu, SerializedResponseApdu};

/// Status words the rest of the workspace branches on.
pub mod sw {
    pub const SUCCESS: u16 = 0x9000;
    pub const WRONG_LENGTH: u16 = 0x6700;
    pub const INCOMPATIBLE_FILE_STRUCTURE: u16 = 0x6981;
    pub const SECURITY_STATUS_NOT_SATISFIED: u16 = 0x6982;
    pub const AUTH_METHOD_BLOCKED: u16 = 0x6983;
    pub const FILE_NOT_FOUND: u16 = 0x6A82;
    pub const INCORRECT_P1_P2: u16 = 0x6A86;
    pub const WRONG_OFFSET: u16 = 0x6B00;
    pub const INS_NOT_SUPPORTED: u16 = 0x6D00;
    pub const CLA_NOT_SUPPORTED: u16 = 0x6E00;
}
