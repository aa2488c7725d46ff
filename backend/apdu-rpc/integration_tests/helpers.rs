//! Shared fixtures for the integration tests.
//!
//! - [`Fixture`]: mock platform behind an adapter, wired through an
//!   in-memory transport
//! - [`RecordingTransport`]: wraps a client transport, records every method
//!   name in call order and can fail chosen methods
//! - [`FixedResponseTransport`]: answers every call with one canned response
//! - [`CountingPlatform`]: a one-reader platform whose card records how many
//!   exchanges overlap and panics on `reset`

use apdu_rpc::error::{SmartCardError, TransportError};
use apdu_rpc::platform::mock::{DEFAULT_MOCK_DEVICE_ID, MockPlatform};
use apdu_rpc::{
    ClientTransport, InMemoryTransport, SmartCard, SmartCardDevice, SmartCardPlatform,
    SmartCardPlatformAdapter,
};

use models::{
    CommandApdu, D2cProtocol, DeviceInfo, P2dProtocol, ResponseApdu, RpcError, RpcRequest,
    RpcResponse, codes,
};

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

pub const KENHOJO_AID: [u8; 8] = [0xD3, 0x92, 0x10, 0x00, 0x00, 0x00, 0x01, 0x01];

pub fn request(id: &str, method: &str, params: Vec<Value>) -> RpcRequest {
    RpcRequest::new(id, method, params)
}

/// Mock platform served by an adapter. `client` is the in-memory transport a
/// proxy should be built on.
pub struct Fixture {
    pub mock: Arc<MockPlatform>,
    pub adapter: SmartCardPlatformAdapter,
    pub client: Arc<InMemoryTransport>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_devices(&[DEFAULT_MOCK_DEVICE_ID])
    }

    pub fn with_devices(ids: &[&str]) -> Self {
        let mock = Arc::new(MockPlatform::new(ids.iter().copied()).expect("mock platform"));
        let server = InMemoryTransport::new();
        let client = Arc::new(server.clone());
        let adapter = SmartCardPlatformAdapter::new(
            Arc::clone(&mock) as Arc<dyn SmartCardPlatform>,
            Arc::new(server),
        );
        Self {
            mock,
            adapter,
            client,
        }
    }

    pub async fn call(&self, method: &str, params: Vec<Value>) -> RpcResponse {
        self.adapter
            .handle_request(request("test", method, params))
            .await
    }

    pub async fn call_ok(&self, method: &str, params: Vec<Value>) -> Value {
        let response = self.call(method, params).await;
        match response.into_result() {
            Ok(value) => value,
            Err(e) => panic!("{method} failed: {e}"),
        }
    }

    pub async fn call_err(&self, method: &str, params: Vec<Value>) -> RpcError {
        let response = self.call(method, params).await;
        match response.into_result() {
            Ok(value) => panic!("{method} unexpectedly succeeded with {value}"),
            Err(e) => e,
        }
    }
}

/// Records method names in call order. Methods listed in `fail` answer with
/// `READER_ERROR` instead of reaching the inner transport.
pub struct RecordingTransport {
    inner: Arc<dyn ClientTransport>,
    calls: Mutex<Vec<String>>,
    fail: Mutex<HashSet<String>>,
}

impl RecordingTransport {
    pub fn new(inner: Arc<dyn ClientTransport>) -> Self {
        Self {
            inner,
            calls: Mutex::new(Vec::new()),
            fail: Mutex::new(HashSet::new()),
        }
    }

    pub fn fail_method(&self, method: &str) {
        self.fail.lock().expect("lock").insert(method.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("lock").clone()
    }

    pub fn clear(&self) {
        self.calls.lock().expect("lock").clear();
    }
}

#[async_trait]
impl ClientTransport for RecordingTransport {
    async fn call(&self, request: RpcRequest) -> Result<RpcResponse, TransportError> {
        self.calls.lock().expect("lock").push(request.method.clone());
        if self.fail.lock().expect("lock").contains(&request.method) {
            return Ok(RpcResponse::failure(
                request.id,
                RpcError::new(codes::READER_ERROR, "Injected failure"),
            ));
        }
        self.inner.call(request).await
    }
}

pub struct FixedResponseTransport {
    response: RpcResponse,
}

impl FixedResponseTransport {
    pub fn new(response: RpcResponse) -> Self {
        Self { response }
    }
}

#[async_trait]
impl ClientTransport for FixedResponseTransport {
    async fn call(&self, _request: RpcRequest) -> Result<RpcResponse, TransportError> {
        Ok(self.response.clone())
    }
}

pub const COUNTING_DEVICE_ID: &str = "counting-0";

/// Counters shared by every card the counting device opens.
#[derive(Default)]
pub struct ExchangeCounters {
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub exchanges: AtomicUsize,
}

pub struct CountingPlatform {
    initialized: AtomicBool,
    pub counters: Arc<ExchangeCounters>,
}

impl CountingPlatform {
    pub fn new() -> Self {
        Self {
            initialized: AtomicBool::new(false),
            counters: Arc::new(ExchangeCounters::default()),
        }
    }

    fn info() -> DeviceInfo {
        DeviceInfo::builder()
            .with_id(COUNTING_DEVICE_ID)
            .with_supports_apdu(true)
            .with_apdu_api("counting")
            .with_d2c_protocol(D2cProtocol::Iso7816)
            .with_p2d_protocol(P2dProtocol::Usb)
            .build()
            .expect("counting device info")
    }
}

#[async_trait]
impl SmartCardPlatform for CountingPlatform {
    async fn init(&self, _force: bool) -> Result<(), SmartCardError> {
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn release(&self, _force: bool) -> Result<(), SmartCardError> {
        self.initialized.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    async fn get_device_info(&self) -> Result<Vec<DeviceInfo>, SmartCardError> {
        Ok(vec![Self::info()])
    }

    async fn acquire_device(&self, _id: &str) -> Result<Arc<dyn SmartCardDevice>, SmartCardError> {
        Ok(Arc::new(CountingDevice {
            counters: Arc::clone(&self.counters),
        }))
    }
}

struct CountingDevice {
    counters: Arc<ExchangeCounters>,
}

#[async_trait]
impl SmartCardDevice for CountingDevice {
    fn get_device_info(&self) -> DeviceInfo {
        CountingPlatform::info()
    }

    fn is_session_active(&self) -> bool {
        false
    }

    async fn is_device_available(&self) -> Result<bool, SmartCardError> {
        Ok(true)
    }

    async fn is_card_present(&self) -> Result<bool, SmartCardError> {
        Ok(true)
    }

    async fn start_session(&self) -> Result<Arc<dyn SmartCard>, SmartCardError> {
        Ok(Arc::new(CountingCard {
            counters: Arc::clone(&self.counters),
        }))
    }

    async fn wait_for_card_presence(&self, _timeout: Duration) -> Result<(), SmartCardError> {
        Ok(())
    }

    async fn release(&self) -> Result<(), SmartCardError> {
        Ok(())
    }
}

struct CountingCard {
    counters: Arc<ExchangeCounters>,
}

impl CountingCard {
    async fn exchange(&self) {
        let now = self.counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(10)).await;
        self.counters.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.counters.exchanges.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl SmartCard for CountingCard {
    async fn get_atr(&self) -> Result<Vec<u8>, SmartCardError> {
        Ok(vec![0x3B, 0x00])
    }

    async fn transmit(&self, _command: &CommandApdu) -> Result<ResponseApdu, SmartCardError> {
        self.exchange().await;
        Ok(ResponseApdu::new(vec![0x01], 0x90, 0x00))
    }

    async fn transmit_raw(&self, command: &[u8]) -> Result<Vec<u8>, SmartCardError> {
        self.exchange().await;
        Ok(command.to_vec())
    }

    async fn reset(&self) -> Result<(), SmartCardError> {
        panic!("reader exploded");
    }

    async fn release(&self) -> Result<(), SmartCardError> {
        self.exchange().await;
        Ok(())
    }
}

/// Pulls `tag`'s value out of a flat TLV run with two-byte tags.
pub fn find_tlv(bytes: &[u8], tag: u16) -> Option<&[u8]> {
    let mut rest = bytes;
    while rest.len() >= 3 {
        let found = u16::from_be_bytes([rest[0], rest[1]]);
        let (len, header) = match rest[2] {
            0x81 => (*rest.get(3)? as usize, 4),
            0x82 => (u16::from_be_bytes([*rest.get(3)?, *rest.get(4)?]) as usize, 5),
            short => (short as usize, 3),
        };
        let value = rest.get(header..header + len)?;
        if found == tag {
            return Some(value);
        }
        rest = &rest[header + len..];
    }
    None
}
