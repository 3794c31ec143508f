use bytes::{Bytes, BytesMut};
use log::{debug, warn};
use nimbusio::{BodyProducer, Consumer, Producer};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

struct Inner {
    /// data fed while no consumer was attached, or while paused
    buffer: BytesMut,
    bytes_written: u64,
    consumer: Option<Arc<dyn Consumer>>,
    started: bool,
    sha256: Sha256,
}

/// A PassThruProducer is a request body whose total length is known in advance, but whose data
/// is fed to it incrementally, by the caller, while the request is in flight.
///
/// Data passes straight through to the connection when it can.  Anything fed before the
/// request starts, or while the connection has the producer paused, is buffered and written
/// in order once the connection is ready.  The producer finishes when exactly `length` bytes
/// have been written; feeding more than that is a programming error.
///
/// Cancellation is not supported: `stop_producing` only logs.  To abandon an upload, drop the
/// request future.
pub struct PassThruProducer {
    name: String,
    length: u64,

    /// Set and cleared by the connection.  This is kept outside of `inner` because the
    /// connection pauses the producer from within `Consumer::write`.
    paused: AtomicBool,

    inner: Mutex<Inner>,
    finished: watch::Sender<bool>,
}

impl PassThruProducer {
    /// Create a new producer of `length` bytes.  The name is used only for logging.
    pub fn new<S: Into<String>>(name: S, length: u64) -> Self {
        Self {
            name: name.into(),
            length,
            paused: AtomicBool::new(false),
            inner: Mutex::new(Inner {
                buffer: BytesMut::new(),
                bytes_written: 0,
                consumer: None,
                started: false,
                sha256: Sha256::new(),
            }),
            finished: watch::Sender::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The number of bytes that have not yet been fed to this producer
    pub fn bytes_remaining_to_write(&self) -> u64 {
        let inner = self.inner.lock().unwrap();
        self.remaining(&inner)
    }

    fn remaining(&self, inner: &Inner) -> u64 {
        let fed = inner.buffer.len() as u64 + inner.bytes_written;
        assert!(
            fed <= self.length,
            "{} has {} bytes fed, more than its length {}",
            self.name,
            fed,
            self.length
        );
        self.length - fed
    }

    /// True once all `length` bytes have been written to the connection
    pub fn is_finished(&self) -> bool {
        *self.finished.borrow()
    }

    /// Wait until all `length` bytes have been written to the connection.
    pub async fn finished(&self) {
        let mut receiver = self.finished.subscribe();
        // the sender is owned by self, so it cannot be dropped while we wait
        let _ = receiver.wait_for(|finished| *finished).await;
    }

    /// The hex-encoded SHA256 digest of the data written.
    ///
    /// ## Panics
    ///
    /// This must only be called after the producer has finished.
    pub fn digest(&self) -> String {
        assert!(self.is_finished(), "{} is not finished", self.name);
        let inner = self.inner.lock().unwrap();
        hex::encode(inner.sha256.clone().finalize())
    }

    /// Feed data to the producer, writing it to the connection if possible and buffering it
    /// otherwise.
    ///
    /// ## Panics
    ///
    /// The total data fed must not exceed the producer's length.
    pub fn feed(&self, data: Bytes) {
        if data.is_empty() {
            return;
        }
        let mut inner = self.inner.lock().unwrap();
        let remaining = self.remaining(&inner);
        assert!(
            data.len() as u64 <= remaining,
            "{} fed {} bytes with only {} remaining",
            self.name,
            data.len(),
            remaining
        );

        if inner.consumer.is_none() || self.paused.load(Ordering::Acquire) {
            inner.buffer.extend_from_slice(&data);
        } else if inner.buffer.is_empty() {
            self.write_to_consumer(&mut inner, data);
        } else {
            // keep feed order behind any backlog not yet flushed
            inner.buffer.extend_from_slice(&data);
            self.flush(&mut inner);
        }
    }

    fn flush(&self, inner: &mut Inner) {
        if inner.buffer.is_empty() {
            return;
        }
        let data = inner.buffer.split().freeze();
        self.write_to_consumer(inner, data);
    }

    fn write_to_consumer(&self, inner: &mut Inner, data: Bytes) {
        let consumer = match inner.consumer {
            Some(ref consumer) => consumer.clone(),
            None => return,
        };
        debug!("{} writing {} bytes to consumer", self.name, data.len());
        inner.sha256.update(&data);
        inner.bytes_written += data.len() as u64;
        consumer.write(data);

        if inner.bytes_written >= self.length {
            self.finish(inner, consumer);
        }
    }

    fn finish(&self, inner: &mut Inner, consumer: Arc<dyn Consumer>) {
        debug!("{} finished", self.name);
        inner.consumer = None;
        consumer.unregister_producer();
        self.finished.send_if_modified(|finished| {
            if *finished {
                false
            } else {
                *finished = true;
                true
            }
        });
    }
}

impl Producer for PassThruProducer {
    fn pause_producing(&self) {
        debug!("{} pause_producing", self.name);
        self.paused.store(true, Ordering::Release);
    }

    fn resume_producing(&self) {
        debug!("{} resume_producing", self.name);
        let mut inner = self.inner.lock().unwrap();
        self.paused.store(false, Ordering::Release);
        self.flush(&mut inner);
    }

    fn stop_producing(&self) {
        warn!("{} stop_producing", self.name);
    }
}

impl BodyProducer for PassThruProducer {
    fn length(&self) -> u64 {
        self.length
    }

    fn start_producing(&self, consumer: Arc<dyn Consumer>) {
        debug!("{} start_producing", self.name);
        let mut inner = self.inner.lock().unwrap();
        assert!(!inner.started, "{} started twice", self.name);
        inner.started = true;

        if self.length == 0 {
            self.finish(&mut inner, consumer);
            return;
        }

        inner.consumer = Some(consumer);
        if !self.paused.load(Ordering::Acquire) {
            self.flush(&mut inner);
        }
    }
}
