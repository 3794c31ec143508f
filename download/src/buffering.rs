use anyhow::Result;
use bytes::{Bytes, BytesMut};
use log::error;
use nimbusio::{Consumer, Producer};
use serde::de::DeserializeOwned;
use std::sync::{Arc, Mutex};

/// A BufferingSink accumulates an entire response body in memory.
///
/// The buffer is meaningful only once the request it was given to has completed successfully;
/// a failed request may leave a partial body behind.
#[derive(Default)]
pub struct BufferingSink {
    buffer: Mutex<BytesMut>,
}

impl BufferingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// The data received so far
    pub fn buffer(&self) -> Bytes {
        self.buffer.lock().unwrap().clone().freeze()
    }

    /// The number of bytes received so far
    pub fn len(&self) -> usize {
        self.buffer.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take the data received, leaving the sink empty
    pub fn take(&self) -> Bytes {
        self.buffer.lock().unwrap().split().freeze()
    }

    /// Decode the data received as JSON.  A decoding failure is logged and returned.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        let buffer = self.buffer.lock().unwrap();
        serde_json::from_slice(&buffer).map_err(|err| {
            error!(
                "BufferingSink cannot decode {} bytes as JSON: {}",
                buffer.len(),
                err
            );
            err.into()
        })
    }
}

impl Consumer for BufferingSink {
    fn register_producer(&self, _producer: Arc<dyn Producer>) {}

    fn unregister_producer(&self) {
        // the relay only unregisters when the response stream was torn down early
        error!("BufferingSink unexpected unregister_producer");
    }

    fn write(&self, data: Bytes) {
        self.buffer.lock().unwrap().extend_from_slice(&data);
    }
}
