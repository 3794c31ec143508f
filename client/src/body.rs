use crate::flow::{Consumer, Producer};
use bytes::Bytes;
use futures_util::stream::Stream;
use log::debug;
use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex, Weak};
use std::task::{Context, Poll, Waker};

/// Once this many bytes are queued and not yet taken by the connection, the producer is paused.
const HIGH_WATER_MARK: usize = 1024 * 1024;

#[derive(Default)]
struct PipeState {
    queue: VecDeque<Bytes>,
    queued: usize,
    producer: Option<Weak<dyn Producer>>,
    paused_producer: bool,
    finished: bool,
    closed: bool,
    waker: Option<Waker>,
}

/// BodyPipe is the transport's side of a streaming request body: a [`Consumer`] that queues
/// what a [`BodyProducer`](crate::BodyProducer) writes until the connection reads it through
/// the paired [`BodyStream`].  When the connection falls behind, the producer is paused, and
/// when it catches up the producer is resumed.
pub(crate) struct BodyPipe {
    state: Mutex<PipeState>,
}

impl BodyPipe {
    pub(crate) fn new() -> (Arc<Self>, BodyStream) {
        let pipe = Arc::new(Self {
            state: Mutex::new(PipeState::default()),
        });
        let stream = BodyStream(pipe.clone());
        (pipe, stream)
    }

    fn producer(state: &PipeState) -> Option<Arc<dyn Producer>> {
        state.producer.as_ref().and_then(Weak::upgrade)
    }
}

impl Consumer for BodyPipe {
    fn register_producer(&self, producer: Arc<dyn Producer>) {
        let mut state = self.state.lock().unwrap();
        state.producer = Some(Arc::downgrade(&producer));
    }

    fn unregister_producer(&self) {
        let mut state = self.state.lock().unwrap();
        state.finished = true;
        state.producer = None;
        if let Some(waker) = state.waker.take() {
            waker.wake();
        }
    }

    fn write(&self, data: Bytes) {
        let pause = {
            let mut state = self.state.lock().unwrap();
            if state.closed {
                debug!("request body discarding {} bytes; connection closed", data.len());
                return;
            }
            state.queued += data.len();
            state.queue.push_back(data);
            if let Some(waker) = state.waker.take() {
                waker.wake();
            }
            if state.queued >= HIGH_WATER_MARK && !state.paused_producer {
                state.paused_producer = true;
                Self::producer(&state)
            } else {
                None
            }
        };

        // call back into the producer without holding the lock
        if let Some(producer) = pause {
            producer.pause_producing();
        }
    }
}

/// The stream of request body chunks handed to the HTTP connection.  Dropping it (as the
/// connection does when the request fails) closes the pipe.
pub(crate) struct BodyStream(Arc<BodyPipe>);

impl Stream for BodyStream {
    type Item = Result<Bytes, io::Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let (poll, resume) = {
            let mut state = self.0.state.lock().unwrap();
            match state.queue.pop_front() {
                Some(chunk) => {
                    state.queued -= chunk.len();
                    let resume = if state.queued == 0 && state.paused_producer {
                        state.paused_producer = false;
                        BodyPipe::producer(&state)
                    } else {
                        None
                    };
                    (Poll::Ready(Some(Ok(chunk))), resume)
                }
                None if state.finished => (Poll::Ready(None), None),
                None => {
                    state.waker = Some(cx.waker().clone());
                    (Poll::Pending, None)
                }
            }
        };

        if let Some(producer) = resume {
            producer.resume_producing();
        }
        poll
    }
}

impl Drop for BodyStream {
    fn drop(&mut self) {
        let mut state = self.0.state.lock().unwrap();
        state.closed = true;
        state.queue.clear();
        state.queued = 0;
    }
}
