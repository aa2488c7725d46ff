use crate::ErrorLocation;
use crate::error::model_error::ModelError;

use std::panic::Location;

const SHORT_MAX_LC: usize = 0xFF;
const SHORT_MAX_LE: u32 = 0x100;
const EXTENDED_MAX_LC: usize = 0xFFFF;
const EXTENDED_MAX_LE: u32 = 0x1_0000;

const INS_SELECT: u8 = 0xA4;
const INS_VERIFY: u8 = 0x20;
const INS_READ_BINARY: u8 = 0xB0;

/// A command APDU: four header bytes, optional body, optional expected length.
///
/// `le` is Ne, the maximum number of response bytes expected. `Some(0)` asks
/// for "as much as the card has" and encodes identically to the maximum of
/// the chosen form (`0x00` short, `0x0000` extended). Decoding always yields
/// the explicit maximum, `256` or `65536`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandApdu {
    cla: u8,
    ins: u8,
    p1: u8,
    p2: u8,
    data: Option<Vec<u8>>,
    le: Option<u32>,
}

impl CommandApdu {
    /// Empty `data` is normalized to `None`; ISO 7816-4 forbids `Lc = 0`.
    #[track_caller]
    pub fn new(
        cla: u8,
        ins: u8,
        p1: u8,
        p2: u8,
        data: Option<Vec<u8>>,
        le: Option<u32>,
    ) -> Result<Self, ModelError> {
        let data = data.filter(|d| !d.is_empty());

        if let Some(body) = &data
            && body.len() > EXTENDED_MAX_LC
        {
            return Err(ModelError::Encoding {
                message: format!(
                    "Command data length {} exceeds {EXTENDED_MAX_LC}",
                    body.len()
                ),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        if let Some(ne) = le
            && ne > EXTENDED_MAX_LE
        {
            return Err(ModelError::Encoding {
                message: format!("Le {ne} exceeds {EXTENDED_MAX_LE}"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        Ok(Self {
            cla,
            ins,
            p1,
            p2,
            data,
            le,
        })
    }

    /// Header-only command. Never fails.
    pub fn header(cla: u8, ins: u8, p1: u8, p2: u8) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data: None,
            le: None,
        }
    }

    /// SELECT by DF name (AID), no FCI requested.
    #[track_caller]
    pub fn select_df(aid: &[u8]) -> Result<Self, ModelError> {
        Self::new(0x00, INS_SELECT, 0x04, 0x0C, Some(aid.to_vec()), None)
    }

    /// SELECT EF under the current DF by two-byte file identifier.
    pub fn select_ef(fid: u16) -> Self {
        Self {
            data: Some(fid.to_be_bytes().to_vec()),
            ..Self::header(0x00, INS_SELECT, 0x02, 0x0C)
        }
    }

    /// VERIFY against the PIN stored in short EF `ef`. An empty `pin` asks
    /// only for the retry counter.
    #[track_caller]
    pub fn verify(pin: &[u8], ef: u8) -> Result<Self, ModelError> {
        Self::new(
            0x00,
            INS_VERIFY,
            0x00,
            0x80 | (ef & 0x1F),
            Some(pin.to_vec()),
            None,
        )
    }

    /// READ BINARY of the currently selected EF.
    #[track_caller]
    pub fn read_binary(offset: u16, le: u32) -> Result<Self, ModelError> {
        if offset > 0x7FFF {
            return Err(ModelError::Encoding {
                message: format!("READ BINARY offset {offset:#06x} exceeds 15 bits"),
                location: ErrorLocation::from(Location::caller()),
            });
        }
        let [p1, p2] = offset.to_be_bytes();
        Self::new(0x00, INS_READ_BINARY, p1, p2, None, Some(le))
    }

    /// READ BINARY of a whole EF addressed by short EF identifier.
    pub fn read_ef_binary_full(short_ef: u8) -> Self {
        Self {
            le: Some(0),
            ..Self::header(0x00, INS_READ_BINARY, 0x80 | (short_ef & 0x1F), 0x00)
        }
    }

    pub fn cla(&self) -> u8 {
        self.cla
    }

    pub fn ins(&self) -> u8 {
        self.ins
    }

    pub fn p1(&self) -> u8 {
        self.p1
    }

    pub fn p2(&self) -> u8 {
        self.p2
    }

    pub fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    pub fn le(&self) -> Option<u32> {
        self.le
    }

    /// Upper bound on response data length implied by `le`, `0` if none.
    pub fn ne(&self) -> usize {
        match self.le {
            None => 0,
            Some(0) if self.is_extended() => EXTENDED_MAX_LE as usize,
            Some(0) => SHORT_MAX_LE as usize,
            Some(ne) => ne as usize,
        }
    }

    /// True when either length field needs the three-byte extended form.
    pub fn is_extended(&self) -> bool {
        let lc = self.data.as_ref().map_or(0, Vec::len);
        lc > SHORT_MAX_LC || self.le.is_some_and(|ne| ne > SHORT_MAX_LE)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let lc = self.data.as_ref().map_or(0, Vec::len);
        let mut out = Vec::with_capacity(4 + 3 + lc + 2);
        out.extend_from_slice(&[self.cla, self.ins, self.p1, self.p2]);

        if self.is_extended() {
            out.push(0x00);
            if let Some(body) = &self.data {
                out.extend_from_slice(&(body.len() as u16).to_be_bytes());
                out.extend_from_slice(body);
            }
            if let Some(ne) = self.le {
                // 65536 wraps to 0x0000
                out.extend_from_slice(&((ne % EXTENDED_MAX_LE) as u16).to_be_bytes());
            }
        } else {
            if let Some(body) = &self.data {
                out.push(body.len() as u8);
                out.extend_from_slice(body);
            }
            if let Some(ne) = self.le {
                out.push((ne % SHORT_MAX_LE) as u8);
            }
        }
        out
    }

    #[track_caller]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ModelError> {
        let len = bytes.len();

        let [cla, ins, p1, p2, body @ ..] = bytes else {
            return Err(malformed(len, "shorter than the 4 byte header"));
        };
        let mut apdu = Self::header(*cla, *ins, *p1, *p2);

        match body {
            // Case 1
            [] => {}
            // Case 2S
            [le] => apdu.le = Some(short_le(*le)),
            // Extended forms start with a zero byte.
            [0x00, rest @ ..] if rest.len() >= 2 => {
                let lc = u16::from_be_bytes([rest[0], rest[1]]) as usize;
                let tail = &rest[2..];
                if tail.is_empty() {
                    // Case 2E: the two bytes were Le.
                    apdu.le = Some(extended_le(rest[0], rest[1]));
                } else if lc == 0 {
                    return Err(malformed(len, "extended Lc of zero"));
                } else if tail.len() == lc {
                    // Case 3E
                    apdu.data = Some(tail.to_vec());
                } else if tail.len() == lc + 2 {
                    // Case 4E
                    apdu.data = Some(tail[..lc].to_vec());
                    apdu.le = Some(extended_le(tail[lc], tail[lc + 1]));
                } else {
                    return Err(malformed(len, "extended Lc does not match body length"));
                }
            }
            [0x00, ..] => return Err(malformed(len, "truncated extended length")),
            [lc, rest @ ..] => {
                let lc = *lc as usize;
                if rest.len() == lc {
                    // Case 3S
                    apdu.data = Some(rest.to_vec());
                } else if rest.len() == lc + 1 {
                    // Case 4S
                    apdu.data = Some(rest[..lc].to_vec());
                    apdu.le = Some(short_le(rest[lc]));
                } else {
                    return Err(malformed(len, "Lc does not match body length"));
                }
            }
        }

        Ok(apdu)
    }
}

#[track_caller]
fn malformed(len: usize, why: &str) -> ModelError {
    ModelError::Decoding {
        message: format!("Malformed command APDU ({len} bytes): {why}"),
        location: ErrorLocation::from(Location::caller()),
    }
}

fn short_le(byte: u8) -> u32 {
    if byte == 0 { SHORT_MAX_LE } else { byte as u32 }
}

fn extended_le(hi: u8, lo: u8) -> u32 {
    match u16::from_be_bytes([hi, lo]) {
        0 => EXTENDED_MAX_LE,
        ne => ne as u32,
    }
}
