//! Shared test fixtures

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use bayeux_core::factory;
use bayeux_core::json::parse;
use bayeux_core::BayeuxMessage;
use bayeux_router::{Transport, TransportHandle};

/// Route engine traces to the test writer. Honors RUST_LOG; safe to
/// call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Records everything the engine does to a reply channel.
pub struct MockTransport {
    writable: AtomicBool,
    writes: Mutex<Vec<String>>,
    closes: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            writable: AtomicBool::new(true),
            writes: Mutex::new(Vec::new()),
            closes: AtomicUsize::new(0),
        })
    }

    pub fn unwritable() -> Arc<Self> {
        let t = Self::new();
        t.writable.store(false, Ordering::SeqCst);
        t
    }

    pub fn handle(self: &Arc<Self>) -> TransportHandle {
        Arc::clone(self) as TransportHandle
    }

    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().clone()
    }

    pub fn last_write(&self) -> Option<String> {
        self.writes.lock().last().cloned()
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl Transport for MockTransport {
    fn is_writable(&self) -> bool {
        self.writable.load(Ordering::SeqCst)
    }

    fn write(&self, payload: &str) {
        self.writes.lock().push(payload.to_string());
    }

    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Build a request message from wire text.
pub fn request(text: &str) -> BayeuxMessage {
    factory::create(&parse(text).unwrap().unwrap())
}

/// Parse a flushed payload back into messages.
pub fn parse_batch(payload: &str) -> Vec<BayeuxMessage> {
    let value = parse(payload).unwrap().unwrap();
    value
        .as_array()
        .expect("payload is a JSON array")
        .iter()
        .map(factory::create)
        .collect()
}
