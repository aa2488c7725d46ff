//! In-process platform emulating a reader with a My Number card inserted.
//!
//! The card implements just enough of the Kenhojo (券面事項入力補助) application
//! to run the select, verify, read sequence: SELECT DF/EF, VERIFY with a
//! persistent retry counter, and READ BINARY of the basic-four TLV.

use crate::error::SmartCardError;
use crate::platform::{SmartCard, SmartCardDevice, SmartCardPlatform};

use models::apdu::sw;
use models::{
    CommandApdu, D2cProtocol, DeviceInfo, ModelError, P2dProtocol, ResponseApdu, codes,
};

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info};
use tokio::sync::watch;

pub const DEFAULT_MOCK_DEVICE_ID: &str = "mock-reader-0";

/// Kenhojo application DF name.
pub const KENHOJO_AID: [u8; 8] = [0xD3, 0x92, 0x10, 0x00, 0x00, 0x00, 0x01, 0x01];
/// Short EF holding the card input support PIN.
pub const KENHOJO_EF_PIN: u8 = 0x11;
/// Short EF holding the basic-four TLV.
pub const KENHOJO_EF_BASIC_FOUR: u8 = 0x02;

pub const TAG_NAME: u16 = 0xDF22;
pub const TAG_ADDRESS: u16 = 0xDF23;
pub const TAG_BIRTH_DATE: u16 = 0xDF24;
pub const TAG_SEX: u16 = 0xDF25;

const MOCK_ATR: [u8; 20] = [
    0x3B, 0x8F, 0x80, 0x01, 0x80, 0x4F, 0x0C, 0xA0, 0x00, 0x00, 0x00, 0x63, 0x50, 0x4B, 0x43,
    0x53, 0x2D, 0x31, 0x35, 0x56,
];

const INS_SELECT: u8 = 0xA4;
const INS_VERIFY: u8 = 0x20;
const INS_READ_BINARY: u8 = 0xB0;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// What the emulated card holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCardProfile {
    pub pin: String,
    pub max_pin_attempts: u8,
    pub name: String,
    pub address: String,
    pub birth_date: String,
    pub sex: String,
}

impl Default for MockCardProfile {
    fn default() -> Self {
        Self {
            pin: String::from("1234"),
            max_pin_attempts: 3,
            name: String::from("山田太郎"),
            address: String::from("東京都千代田区霞が関1-2-3"),
            birth_date: String::from("19800101"),
            sex: String::from("1"),
        }
    }
}

impl MockCardProfile {
    /// `DF22 name ‖ DF23 address ‖ DF24 birth date ‖ DF25 sex`, BER lengths.
    pub fn basic_four_tlv(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for (tag, value) in [
            (TAG_NAME, &self.name),
            (TAG_ADDRESS, &self.address),
            (TAG_BIRTH_DATE, &self.birth_date),
            (TAG_SEX, &self.sex),
        ] {
            out.extend_from_slice(&tag.to_be_bytes());
            push_ber_length(&mut out, value.len());
            out.extend_from_slice(value.as_bytes());
        }
        out
    }
}

fn push_ber_length(out: &mut Vec<u8>, len: usize) {
    match len {
        0..=0x7F => out.push(len as u8),
        0x80..=0xFF => out.extend_from_slice(&[0x81, len as u8]),
        _ => {
            out.push(0x82);
            out.extend_from_slice(&(len as u16).to_be_bytes());
        }
    }
}

pub struct MockPlatform {
    initialized: AtomicBool,
    devices: Vec<Arc<MockDevice>>,
    acquired: Arc<Mutex<HashSet<String>>>,
}

impl MockPlatform {
    pub fn new<I, S>(device_ids: I) -> Result<Self, ModelError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_profile(device_ids, MockCardProfile::default())
    }

    /// Every reader gets a card holding `profile`. Cards start inserted.
    pub fn with_profile<I, S>(device_ids: I, profile: MockCardProfile) -> Result<Self, ModelError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let acquired = Arc::new(Mutex::new(HashSet::new()));
        let devices = device_ids
            .into_iter()
            .map(|id| {
                let id = id.into();
                let info = DeviceInfo::builder()
                    .with_friendly_name(format!("Mock Card Reader {id}"))
                    .with_id(id)
                    .with_description("Mock smart card reader")
                    .with_supports_apdu(true)
                    .with_supports_hce(false)
                    .with_integrated_device(false)
                    .with_removable_device(true)
                    .with_d2c_protocol(D2cProtocol::Iso7816)
                    .with_p2d_protocol(P2dProtocol::Usb)
                    .with_apdu_api("mock")
                    .build()?;
                Ok(Arc::new(MockDevice::new(
                    info,
                    profile.clone(),
                    Arc::clone(&acquired),
                )))
            })
            .collect::<Result<Vec<_>, ModelError>>()?;

        Ok(Self {
            initialized: AtomicBool::new(false),
            devices,
            acquired,
        })
    }

    /// Direct handle on a reader, for driving card insertion and removal.
    pub fn device(&self, id: &str) -> Option<Arc<MockDevice>> {
        self.devices
            .iter()
            .find(|d| d.info.id() == id)
            .map(Arc::clone)
    }
}

#[async_trait]
impl SmartCardPlatform for MockPlatform {
    async fn init(&self, force: bool) -> Result<(), SmartCardError> {
        if self.initialized.swap(true, Ordering::SeqCst) && !force {
            return Err(SmartCardError::already_initialized(
                "Platform already initialized",
            ));
        }
        info!("Mock platform initialized with {} reader(s)", self.devices.len());
        Ok(())
    }

    async fn release(&self, force: bool) -> Result<(), SmartCardError> {
        if !self.initialized.load(Ordering::SeqCst) && !force {
            return Err(SmartCardError::not_initialized("Platform not initialized"));
        }
        for device in &self.devices {
            device.reset_session();
        }
        lock(&self.acquired).clear();
        self.initialized.store(false, Ordering::SeqCst);
        info!("Mock platform released");
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    async fn get_device_info(&self) -> Result<Vec<DeviceInfo>, SmartCardError> {
        if !self.is_initialized() {
            return Err(SmartCardError::not_initialized("Platform not initialized"));
        }
        Ok(self.devices.iter().map(|d| d.info.clone()).collect())
    }

    async fn acquire_device(&self, id: &str) -> Result<Arc<dyn SmartCardDevice>, SmartCardError> {
        if !self.is_initialized() {
            return Err(SmartCardError::not_initialized("Platform not initialized"));
        }
        let device = self.device(id).ok_or_else(|| {
            SmartCardError::card(codes::DEVICE_NOT_FOUND, format!("Device not found: {id}"))
        })?;
        if !lock(&self.acquired).insert(id.to_string()) {
            return Err(SmartCardError::already_connected(format!(
                "Device already acquired: {id}"
            )));
        }
        debug!("Mock device {id} acquired");
        Ok(device)
    }
}

#[derive(Debug)]
struct DeviceState {
    session_active: bool,
    remaining_attempts: u8,
}

pub struct MockDevice {
    info: DeviceInfo,
    profile: MockCardProfile,
    presence: watch::Sender<bool>,
    state: Arc<Mutex<DeviceState>>,
    acquired: Arc<Mutex<HashSet<String>>>,
}

impl MockDevice {
    fn new(
        info: DeviceInfo,
        profile: MockCardProfile,
        acquired: Arc<Mutex<HashSet<String>>>,
    ) -> Self {
        let (presence, _) = watch::channel(true);
        let state = DeviceState {
            session_active: false,
            remaining_attempts: profile.max_pin_attempts,
        };
        Self {
            info,
            profile,
            presence,
            state: Arc::new(Mutex::new(state)),
            acquired,
        }
    }

    /// Insert (`true`) or pull (`false`) the card. Wakes pending waiters.
    pub fn set_card_present(&self, present: bool) {
        self.presence.send_replace(present);
    }

    /// PIN retries left, shared by every session on this reader.
    pub fn remaining_pin_attempts(&self) -> u8 {
        lock(&self.state).remaining_attempts
    }

    fn reset_session(&self) {
        lock(&self.state).session_active = false;
    }
}

#[async_trait]
impl SmartCardDevice for MockDevice {
    fn get_device_info(&self) -> DeviceInfo {
        self.info.clone()
    }

    fn is_session_active(&self) -> bool {
        lock(&self.state).session_active
    }

    async fn is_device_available(&self) -> Result<bool, SmartCardError> {
        Ok(true)
    }

    async fn is_card_present(&self) -> Result<bool, SmartCardError> {
        Ok(*self.presence.borrow())
    }

    async fn start_session(&self) -> Result<Arc<dyn SmartCard>, SmartCardError> {
        if !*self.presence.borrow() {
            return Err(SmartCardError::card(
                codes::CARD_NOT_PRESENT,
                "Card not present",
            ));
        }
        {
            let mut state = lock(&self.state);
            if state.session_active {
                return Err(SmartCardError::already_connected(format!(
                    "Session already active on {}",
                    self.info.id()
                )));
            }
            state.session_active = true;
        }
        debug!("Mock session started on {}", self.info.id());
        Ok(Arc::new(MockCard {
            profile: self.profile.clone(),
            presence: self.presence.subscribe(),
            device: Arc::clone(&self.state),
            state: Mutex::new(CardState::default()),
            released: AtomicBool::new(false),
        }))
    }

    async fn wait_for_card_presence(&self, timeout: Duration) -> Result<(), SmartCardError> {
        let mut presence = self.presence.subscribe();
        match tokio::time::timeout(timeout, presence.wait_for(|present| *present)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(_)) => Err(SmartCardError::internal("Card presence channel closed")),
            Err(_) => Err(SmartCardError::card(
                codes::TIMEOUT,
                format!("No card detected within {}ms", timeout.as_millis()),
            )),
        }
    }

    async fn release(&self) -> Result<(), SmartCardError> {
        self.reset_session();
        lock(&self.acquired).remove(self.info.id());
        debug!("Mock device {} released", self.info.id());
        Ok(())
    }
}

#[derive(Debug, Default)]
struct CardState {
    df_selected: bool,
    selected_ef: Option<u16>,
    verified: bool,
}

struct MockCard {
    profile: MockCardProfile,
    presence: watch::Receiver<bool>,
    device: Arc<Mutex<DeviceState>>,
    state: Mutex<CardState>,
    released: AtomicBool,
}

impl MockCard {
    fn ensure_usable(&self) -> Result<(), SmartCardError> {
        if self.released.load(Ordering::SeqCst) {
            return Err(SmartCardError::card(
                codes::READER_ERROR,
                "Card session already released",
            ));
        }
        if !*self.presence.borrow() {
            return Err(SmartCardError::card(
                codes::CARD_NOT_PRESENT,
                "Card removed during session",
            ));
        }
        Ok(())
    }

    fn respond(&self, command: &CommandApdu) -> ResponseApdu {
        if command.cla() & 0xF0 != 0x00 {
            return ResponseApdu::status(sw::CLA_NOT_SUPPORTED);
        }
        match command.ins() {
            INS_SELECT => self.select(command),
            INS_VERIFY => self.verify(command),
            INS_READ_BINARY => self.read_binary(command),
            _ => ResponseApdu::status(sw::INS_NOT_SUPPORTED),
        }
    }

    fn select(&self, command: &CommandApdu) -> ResponseApdu {
        let mut state = lock(&self.state);
        match (command.p1(), command.data()) {
            (0x04, Some(aid)) if aid == KENHOJO_AID => {
                state.df_selected = true;
                state.selected_ef = None;
                state.verified = false;
                ResponseApdu::status(sw::SUCCESS)
            }
            (0x02, Some([hi, lo])) if state.df_selected => {
                state.selected_ef = Some(u16::from_be_bytes([*hi, *lo]));
                ResponseApdu::status(sw::SUCCESS)
            }
            _ => ResponseApdu::status(sw::FILE_NOT_FOUND),
        }
    }

    fn verify(&self, command: &CommandApdu) -> ResponseApdu {
        let mut state = lock(&self.state);
        if !state.df_selected {
            return ResponseApdu::status(sw::FILE_NOT_FOUND);
        }
        if command.p2() & 0x80 == 0 || command.p2() & 0x1F != KENHOJO_EF_PIN {
            return ResponseApdu::status(sw::INCORRECT_P1_P2);
        }

        let mut device = lock(&self.device);
        if device.remaining_attempts == 0 {
            return ResponseApdu::status(sw::AUTH_METHOD_BLOCKED);
        }

        let Some(pin) = command.data() else {
            return ResponseApdu::new(Vec::new(), 0x63, 0xC0 | device.remaining_attempts);
        };

        if pin == self.profile.pin.as_bytes() {
            device.remaining_attempts = self.profile.max_pin_attempts;
            state.verified = true;
            ResponseApdu::status(sw::SUCCESS)
        } else {
            device.remaining_attempts -= 1;
            state.verified = false;
            debug!(
                "Mock card rejected PIN, {} attempt(s) left",
                device.remaining_attempts
            );
            ResponseApdu::new(Vec::new(), 0x63, 0xC0 | device.remaining_attempts)
        }
    }

    fn read_binary(&self, command: &CommandApdu) -> ResponseApdu {
        let state = lock(&self.state);
        if !state.verified {
            return ResponseApdu::status(sw::SECURITY_STATUS_NOT_SATISFIED);
        }

        let offset = if command.p1() & 0x80 != 0 {
            if command.p1() & 0x1F != KENHOJO_EF_BASIC_FOUR {
                return ResponseApdu::status(sw::FILE_NOT_FOUND);
            }
            command.p2() as usize
        } else {
            match state.selected_ef {
                None => {}
                Some(fid) if fid == KENHOJO_EF_BASIC_FOUR as u16 => {}
                Some(_) => return ResponseApdu::status(sw::INCOMPATIBLE_FILE_STRUCTURE),
            }
            u16::from_be_bytes([command.p1(), command.p2()]) as usize
        };

        let tlv = self.profile.basic_four_tlv();
        if offset > tlv.len() {
            return ResponseApdu::status(sw::WRONG_OFFSET);
        }
        let end = match command.ne() {
            0 => tlv.len(),
            ne => tlv.len().min(offset + ne),
        };
        ResponseApdu::new(tlv[offset..end].to_vec(), 0x90, 0x00)
    }
}

#[async_trait]
impl SmartCard for MockCard {
    async fn get_atr(&self) -> Result<Vec<u8>, SmartCardError> {
        self.ensure_usable()?;
        Ok(MOCK_ATR.to_vec())
    }

    async fn transmit(&self, command: &CommandApdu) -> Result<ResponseApdu, SmartCardError> {
        self.ensure_usable()?;
        Ok(self.respond(command))
    }

    async fn transmit_raw(&self, command: &[u8]) -> Result<Vec<u8>, SmartCardError> {
        self.ensure_usable()?;
        let response = match CommandApdu::from_bytes(command) {
            Ok(parsed) => self.respond(&parsed),
            Err(e) => {
                debug!("Mock card could not parse raw command: {e}");
                ResponseApdu::status(sw::WRONG_LENGTH)
            }
        };
        Ok(response.to_bytes())
    }

    async fn reset(&self) -> Result<(), SmartCardError> {
        self.ensure_usable()?;
        *lock(&self.state) = CardState::default();
        Ok(())
    }

    async fn release(&self) -> Result<(), SmartCardError> {
        if !self.released.swap(true, Ordering::SeqCst) {
            lock(&self.device).session_active = false;
        }
        Ok(())
    }
}
