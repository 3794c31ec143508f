use crate::auth::{compute_authentication_string, TIMESTAMP_HEADER};
use crate::flow::{BodyProducer, Consumer, Producer};
use crate::identity::Identity;
use crate::util::unquote_plus;
use bytes::Bytes;
use httptest::matchers::{ExecutionContext, Matcher};
use lazy_static::lazy_static;
use std::env;
use std::fmt;
use std::sync::{Arc, LockResult, Mutex, MutexGuard, Weak};

// environment is global to the process, so we need to ensure that only one test uses
// it at a time.
lazy_static! {
    static ref ENV_LOCK: Mutex<()> = Mutex::new(());
}

/// Lock the environment and clear every variable starting with one of the given prefixes
pub(crate) fn clear_env(prefixes: &[&str]) -> LockResult<MutexGuard<'static, ()>> {
    let guard = ENV_LOCK.lock();
    for (key, _) in env::vars() {
        if prefixes.iter().any(|p| key.starts_with(p)) {
            env::remove_var(key);
        }
    }
    guard
}

#[derive(Default)]
struct Collected {
    data: Vec<u8>,
    writes: usize,
    producer: Option<Weak<dyn Producer>>,
    registered: bool,
    unregistered: bool,
}

/// A consumer that keeps everything written to it, optionally pausing its producer after
/// every write.
#[derive(Default)]
pub(crate) struct CollectingConsumer {
    pause_each_write: bool,
    collected: Mutex<Collected>,
}

impl CollectingConsumer {
    pub(crate) fn pausing() -> Self {
        Self {
            pause_each_write: true,
            ..Self::default()
        }
    }

    pub(crate) fn data(&self) -> Vec<u8> {
        self.collected.lock().unwrap().data.clone()
    }

    pub(crate) fn writes(&self) -> usize {
        self.collected.lock().unwrap().writes
    }

    pub(crate) fn was_registered(&self) -> bool {
        self.collected.lock().unwrap().registered
    }

    pub(crate) fn was_unregistered(&self) -> bool {
        self.collected.lock().unwrap().unregistered
    }
}

impl Consumer for CollectingConsumer {
    fn register_producer(&self, producer: Arc<dyn Producer>) {
        let mut collected = self.collected.lock().unwrap();
        collected.registered = true;
        collected.producer = Some(Arc::downgrade(&producer));
    }

    fn unregister_producer(&self) {
        self.collected.lock().unwrap().unregistered = true;
    }

    fn write(&self, data: Bytes) {
        let producer = {
            let mut collected = self.collected.lock().unwrap();
            collected.data.extend_from_slice(&data);
            collected.writes += 1;
            if self.pause_each_write {
                collected.producer.as_ref().and_then(Weak::upgrade)
            } else {
                None
            }
        };
        if let Some(producer) = producer {
            producer.pause_producing();
        }
    }
}

/// A body producer with all of its data available up front.
pub(crate) struct StaticBody(Vec<Bytes>);

impl StaticBody {
    pub(crate) fn new(chunks: &[&'static [u8]]) -> Arc<Self> {
        Arc::new(Self(chunks.iter().map(|c| Bytes::from_static(c)).collect()))
    }
}

impl Producer for StaticBody {
    fn pause_producing(&self) {}
    fn resume_producing(&self) {}
    fn stop_producing(&self) {}
}

impl BodyProducer for StaticBody {
    fn length(&self) -> u64 {
        self.0.iter().map(|c| c.len() as u64).sum()
    }

    fn start_producing(&self, consumer: Arc<dyn Consumer>) {
        for chunk in &self.0 {
            consumer.write(chunk.clone());
        }
        consumer.unregister_producer();
    }
}

/// An httptest matcher that will check nimbus.io request signatures with the given identity.
pub(crate) fn signed_with(identity: Identity) -> SignedWith {
    SignedWith(identity)
}

#[derive(Debug)]
pub(crate) struct SignedWith(Identity);

impl<B> Matcher<httptest::http::Request<B>> for SignedWith {
    fn matches(&mut self, input: &httptest::http::Request<B>, _ctx: &mut ExecutionContext) -> bool {
        let header = |name: &str| {
            input
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned)
        };
        let (auth, timestamp) = match (header("authorization"), header(TIMESTAMP_HEADER)) {
            (Some(auth), Some(ts)) => (auth, ts),
            _ => {
                println!("missing authorization or timestamp header");
                return false;
            }
        };
        let timestamp: u64 = match timestamp.parse() {
            Ok(ts) => ts,
            Err(_) => {
                println!("timestamp {} is not an integer", timestamp);
                return false;
            }
        };
        let path = input
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let expected = compute_authentication_string(
            self.0.auth_key_id,
            &self.0.auth_key,
            &self.0.user_name,
            input.method().as_str(),
            timestamp,
            &unquote_plus(path),
        );
        if auth != expected {
            println!("signature mismatch: got {}, expected {}", auth, expected);
            return false;
        }
        true
    }

    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        <Self as fmt::Debug>::fmt(self, f)
    }
}
