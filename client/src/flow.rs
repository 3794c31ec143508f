//! Producer and consumer roles for streaming data through a request.
//!
//! Data moves from a [`Producer`] to a [`Consumer`] one chunk at a time.  The consumer can
//! apply backpressure by pausing the producer that was registered with it, resuming it
//! when it is ready for more, or stopping it altogether.
//!
//! Two pairs are wired up for every streaming request:
//!
//!  * uploads: a [`BodyProducer`] (such as a pass-through producer fed by the caller) writes
//!    into the transport's body pipe, which pauses it when the connection falls behind;
//!  * downloads: a [`ResponseRelay`](crate::ResponseRelay) writes response chunks into a
//!    caller-supplied consumer, which may pause the relay and with it the connection.
//!
//! All methods take `&self`; implementations keep their mutable state behind a lock.  A
//! consumer must not call back into its producer while holding a lock that the producer's
//! `write` path also takes.

use bytes::Bytes;
use std::sync::Arc;

/// A source of data that can be asked to slow down or stop.
pub trait Producer: Send + Sync {
    /// Stop producing until `resume_producing` is called.
    fn pause_producing(&self);

    /// Resume producing after a pause, delivering anything held back in the meantime.
    fn resume_producing(&self);

    /// Stop producing for good.
    fn stop_producing(&self);
}

/// A destination for data from a single registered [`Producer`].
pub trait Consumer: Send + Sync {
    /// Associate this consumer with the producer that will write to it.
    fn register_producer(&self, producer: Arc<dyn Producer>);

    /// The producer is going away; no more data will be written.
    fn unregister_producer(&self);

    /// Accept a chunk of data.  Chunks arrive in the order they were produced.
    fn write(&self, data: Bytes);
}

/// A [`Producer`] of a request body whose total length is known in advance.
pub trait BodyProducer: Producer {
    /// The total number of bytes this producer will write.
    fn length(&self) -> u64;

    /// Attach the transport's consumer and begin writing to it.  This is called exactly once,
    /// by the transport; any data already buffered is written immediately.  The producer calls
    /// [`Consumer::unregister_producer`] once all `length()` bytes have been written.
    fn start_producing(&self, consumer: Arc<dyn Consumer>);
}
