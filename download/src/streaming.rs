use bytes::Bytes;
use log::debug;
use nimbusio::{Consumer, Producer};
use sha2::{Digest, Sha256};
use std::sync::{Arc, Mutex, Weak};

type Handler = Box<dyn FnMut(Bytes) + Send>;

struct State {
    bytes_read: u64,
    sha256: Sha256,
    producer: Option<Weak<dyn Producer>>,
    done: bool,
}

/// A StreamingSink hands each chunk of a response body to a caller-supplied handler as it
/// arrives, keeping nothing but a running byte count and SHA256 digest, so that the caller can
/// verify the body once the request completes.
///
/// The caller can apply backpressure with [`pause`](StreamingSink::pause) and
/// [`resume`](StreamingSink::resume).  A paced sink pauses itself after every chunk, so that
/// nothing more is read from the connection until the caller resumes it.  A paced sink that is
/// never resumed simply stops making progress.
pub struct StreamingSink {
    handler: Mutex<Handler>,
    paced: bool,
    state: Mutex<State>,
}

impl StreamingSink {
    /// Create a sink that passes each chunk to `handler`
    pub fn new<F: FnMut(Bytes) + Send + 'static>(handler: F) -> Self {
        Self::build(Box::new(handler), false)
    }

    /// Create a sink that passes each chunk to `handler`, then pauses until resumed
    pub fn paced<F: FnMut(Bytes) + Send + 'static>(handler: F) -> Self {
        Self::build(Box::new(handler), true)
    }

    /// Create a sink that only counts and hashes what it receives
    pub fn discarding() -> Self {
        Self::new(|_| {})
    }

    fn build(handler: Handler, paced: bool) -> Self {
        Self {
            handler: Mutex::new(handler),
            paced,
            state: Mutex::new(State {
                bytes_read: 0,
                sha256: Sha256::new(),
                producer: None,
                done: false,
            }),
        }
    }

    fn producer(&self) -> Option<Arc<dyn Producer>> {
        self.state
            .lock()
            .unwrap()
            .producer
            .as_ref()
            .and_then(Weak::upgrade)
    }

    /// Ask the producer to stop delivering data until resumed
    pub fn pause(&self) {
        if let Some(producer) = self.producer() {
            producer.pause_producing();
        }
    }

    /// Resume delivery after a pause
    pub fn resume(&self) {
        if let Some(producer) = self.producer() {
            producer.resume_producing();
        }
    }

    /// Detach from the producer and ask it to stop.  The request this sink was given to then
    /// fails, unless it had already completed.
    pub fn done(&self) {
        let producer = {
            let mut state = self.state.lock().unwrap();
            state.done = true;
            state.producer.take().and_then(|p| p.upgrade())
        };
        if let Some(producer) = producer {
            producer.stop_producing();
        }
    }

    pub fn is_done(&self) -> bool {
        self.state.lock().unwrap().done
    }

    /// The number of bytes received so far
    pub fn bytes_read(&self) -> u64 {
        self.state.lock().unwrap().bytes_read
    }

    /// The hex-encoded SHA256 digest of the bytes received so far
    pub fn digest(&self) -> String {
        hex::encode(self.state.lock().unwrap().sha256.clone().finalize())
    }
}

impl Consumer for StreamingSink {
    fn register_producer(&self, producer: Arc<dyn Producer>) {
        self.state.lock().unwrap().producer = Some(Arc::downgrade(&producer));
    }

    fn unregister_producer(&self) {
        debug!("StreamingSink unregister_producer");
        self.state.lock().unwrap().producer = None;
    }

    fn write(&self, data: Bytes) {
        let producer = {
            let mut state = self.state.lock().unwrap();
            if state.done {
                debug!("StreamingSink discarding {} bytes after done", data.len());
                return;
            }
            state.bytes_read += data.len() as u64;
            state.sha256.update(&data);
            if self.paced {
                state.producer.as_ref().and_then(Weak::upgrade)
            } else {
                None
            }
        };

        (self.handler.lock().unwrap())(data);

        if let Some(producer) = producer {
            producer.pause_producing();
        }
    }
}
