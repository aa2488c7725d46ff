use crate::error::model_error::ModelError;
use crate::{CommandApdu, ResponseApdu};

use serde::{Deserialize, Serialize};

/// Wire form of [`CommandApdu`]. `data` and `le` are always present,
/// `null` when absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedCommandApdu {
    pub cla: u8,
    pub ins: u8,
    pub p1: u8,
    pub p2: u8,
    #[serde(default)]
    pub data: Option<Vec<u8>>,
    #[serde(default)]
    pub le: Option<u32>,
}

impl From<&CommandApdu> for SerializedCommandApdu {
    fn from(apdu: &CommandApdu) -> Self {
        Self {
            cla: apdu.cla(),
            ins: apdu.ins(),
            p1: apdu.p1(),
            p2: apdu.p2(),
            data: apdu.data().map(<[u8]>::to_vec),
            le: apdu.le(),
        }
    }
}

impl TryFrom<SerializedCommandApdu> for CommandApdu {
    type Error = ModelError;

    #[track_caller]
    fn try_from(wire: SerializedCommandApdu) -> Result<Self, Self::Error> {
        CommandApdu::new(wire.cla, wire.ins, wire.p1, wire.p2, wire.data, wire.le)
    }
}

/// Wire form of [`ResponseApdu`]. The combined status word is never sent;
/// receivers derive it from `sw1`/`sw2`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedResponseApdu {
    pub data: Vec<u8>,
    pub sw1: u8,
    pub sw2: u8,
}

impl From<&ResponseApdu> for SerializedResponseApdu {
    fn from(apdu: &ResponseApdu) -> Self {
        Self {
            data: apdu.data().to_vec(),
            sw1: apdu.sw1(),
            sw2: apdu.sw2(),
        }
    }
}

impl From<SerializedResponseApdu> for ResponseApdu {
    fn from(wire: SerializedResponseApdu) -> Self {
        ResponseApdu::new(wire.data, wire.sw1, wire.sw2)
    }
}
