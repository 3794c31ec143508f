use crate::completion::Completion;
use crate::error::RequestError;
use crate::flow::{Consumer, Producer};
use anyhow::{Error, Result};
use bytes::Bytes;
use futures_util::stream::{Stream, StreamExt};
use log::{debug, error, warn};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{oneshot, watch};

/// The lifecycle of a [`ResponseRelay`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    /// Constructed, no consumer yet
    Created,
    /// A consumer has been added
    Connected,
    /// At least one chunk has been passed to the consumer
    Receiving,
    /// The stream ended cleanly
    Succeeded,
    /// The stream was aborted, errored, or stopped
    Failed,
}

/// Flow-control state shared between the relay and the loop reading the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Running,
    Paused,
    Stopped,
}

/// A ResponseRelay sits between the body stream of an HTTP response and a [`Consumer`].  It
/// passes every chunk to the consumer in the order received, forwards the consumer's
/// pause/resume/stop requests to the transport, and resolves its completion exactly once:
/// with `Ok(())` when the stream ends cleanly, or with the reason it did not.
pub struct ResponseRelay {
    completion: Completion<Result<()>>,
    state: Mutex<RelayState>,
    consumer: Mutex<Option<Arc<dyn Consumer>>>,

    /// Flow control for the transport, present only while a body is being delivered
    transport: Mutex<Option<watch::Sender<Flow>>>,

    idle_timeout: Option<Duration>,
}

impl ResponseRelay {
    /// Create a new relay, returning it along with the receiver for its completion.  If
    /// `idle_timeout` is given, a body that produces no chunk for that long fails the relay.
    pub fn new(idle_timeout: Option<Duration>) -> (Arc<Self>, oneshot::Receiver<Result<()>>) {
        let (completion, receiver) = Completion::new();
        let relay = Arc::new(Self {
            completion,
            state: Mutex::new(RelayState::Created),
            consumer: Mutex::new(None),
            transport: Mutex::new(None),
            idle_timeout,
        });
        (relay, receiver)
    }

    pub fn state(&self) -> RelayState {
        *self.state.lock().unwrap()
    }

    pub fn is_complete(&self) -> bool {
        self.completion.is_resolved()
    }

    fn set_state(&self, state: RelayState) {
        *self.state.lock().unwrap() = state;
    }

    fn consumer(&self) -> Option<Arc<dyn Consumer>> {
        self.consumer.lock().unwrap().clone()
    }

    /// Add the consumer that will receive the response body.
    ///
    /// ## Panics
    ///
    /// A relay has exactly one consumer; adding a second panics.
    pub fn add_consumer(&self, consumer: Arc<dyn Consumer>) {
        let mut slot = self.consumer.lock().unwrap();
        assert!(slot.is_none(), "ResponseRelay already has a consumer");
        *slot = Some(consumer);
        drop(slot);
        self.set_state(RelayState::Connected);
    }

    /// Pass a chunk of the response body to the consumer.  Chunks arriving after the relay has
    /// completed are discarded.
    ///
    /// ## Panics
    ///
    /// Data must not arrive before a consumer has been added.
    pub fn data_received(&self, data: Bytes) {
        if self.completion.is_resolved() {
            debug!(
                "ResponseRelay discarding {} bytes received after completion",
                data.len()
            );
            return;
        }
        let consumer = self
            .consumer()
            .expect("ResponseRelay received data before a consumer was added");
        self.set_state(RelayState::Receiving);
        consumer.write(data);
    }

    /// The response stream has ended, cleanly (`Ok`) or not.  Only the first call has any
    /// effect; later calls are logged and ignored.
    pub fn connection_lost(&self, reason: Result<()>) {
        match reason {
            Ok(()) => {
                if self.completion.resolve(Ok(())) {
                    self.set_state(RelayState::Succeeded);
                } else {
                    debug!("ResponseRelay already complete; ignoring end of stream");
                }
            }
            Err(err) => {
                let message = format!("{:#}", err);
                if self.completion.resolve(Err(err)) {
                    error!("ResponseRelay connection lost {}", message);
                    self.set_state(RelayState::Failed);
                    if let Some(consumer) = self.consumer() {
                        consumer.unregister_producer();
                    }
                } else {
                    debug!(
                        "ResponseRelay already complete; ignoring stream error {}",
                        message
                    );
                }
            }
        }
    }

    /// Read the response body from the transport, passing each chunk to the consumer, until
    /// the stream ends, fails, or is stopped.  On return the relay has completed.  While the
    /// consumer has the relay paused, nothing further is read from the transport.
    pub async fn deliver_body<S, E>(&self, body: S)
    where
        S: Stream<Item = std::result::Result<Bytes, E>>,
        E: Into<Error>,
    {
        if self.completion.is_resolved() {
            debug!("ResponseRelay already complete; not reading response body");
            return;
        }

        let (flow_tx, mut flow_rx) = watch::channel(Flow::Running);
        {
            let mut transport = self.transport.lock().unwrap();
            assert!(
                transport.is_none(),
                "ResponseRelay is already delivering a body"
            );
            *transport = Some(flow_tx);
        }

        futures_util::pin_mut!(body);

        loop {
            if wait_unpaused(&mut flow_rx).await == Flow::Stopped {
                break;
            }

            let next = tokio::select! {
                next = next_chunk(&mut body, self.idle_timeout) => next,
                _ = wait_stopped(&mut flow_rx) => break,
            };

            match next {
                Some(Ok(chunk)) => self.data_received(chunk),
                Some(Err(err)) => {
                    self.connection_lost(Err(err));
                    break;
                }
                None => {
                    self.connection_lost(Ok(()));
                    break;
                }
            }
        }

        self.transport.lock().unwrap().take();
    }

    /// Send a flow-control change to the transport, if there is one.
    fn signal(&self, flow: Flow, operation: &str) {
        match self.transport.lock().unwrap().as_ref() {
            Some(transport) => {
                transport.send_if_modified(|current| {
                    if *current == flow || *current == Flow::Stopped {
                        false
                    } else {
                        *current = flow;
                        true
                    }
                });
            }
            None => warn!(
                "ResponseRelay {} with no transport attached; ignoring",
                operation
            ),
        }
    }
}

async fn wait_unpaused(flow: &mut watch::Receiver<Flow>) -> Flow {
    match flow.wait_for(|f| *f != Flow::Paused).await {
        Ok(f) => *f,
        Err(_) => Flow::Stopped,
    }
}

async fn wait_stopped(flow: &mut watch::Receiver<Flow>) {
    let _ = flow.wait_for(|f| *f == Flow::Stopped).await.map(|_| ());
}

async fn next_chunk<S, E>(
    body: &mut std::pin::Pin<&mut S>,
    idle_timeout: Option<Duration>,
) -> Option<Result<Bytes>>
where
    S: Stream<Item = std::result::Result<Bytes, E>>,
    E: Into<Error>,
{
    let next = match idle_timeout {
        Some(idle) => match tokio::time::timeout(idle, body.next()).await {
            Ok(next) => next,
            Err(_) => return Some(Err(RequestError::StreamIdle(idle).into())),
        },
        None => body.next().await,
    };
    next.map(|res| res.map_err(Into::into))
}

impl Producer for ResponseRelay {
    fn pause_producing(&self) {
        if self.completion.is_resolved() {
            debug!("ResponseRelay pause_producing after completion");
            return;
        }
        debug!("ResponseRelay pause_producing");
        self.signal(Flow::Paused, "pause_producing");
    }

    fn resume_producing(&self) {
        if self.completion.is_resolved() {
            debug!("ResponseRelay resume_producing after completion");
            return;
        }
        debug!("ResponseRelay resume_producing");
        self.signal(Flow::Running, "resume_producing");
    }

    fn stop_producing(&self) {
        if self.completion.is_resolved() {
            debug!("ResponseRelay stop_producing after completion");
            return;
        }
        self.signal(Flow::Stopped, "stop_producing");
        if self.completion.resolve(Err(RequestError::Stopped.into())) {
            warn!("ResponseRelay stopped by its consumer");
            self.set_state(RelayState::Failed);
        }
    }
}
