use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::sync::oneshot;

/// A single-assignment completion handle.  The first call to [`resolve`](Completion::resolve)
/// delivers its value to the paired receiver; every later call is a no-op and returns false,
/// no matter which thread it comes from.
#[derive(Debug)]
pub struct Completion<T> {
    resolved: AtomicBool,
    sender: Mutex<Option<oneshot::Sender<T>>>,
}

impl<T> Completion<T> {
    /// Create a new, unresolved completion and the receiver that will observe its value.
    pub fn new() -> (Self, oneshot::Receiver<T>) {
        let (sender, receiver) = oneshot::channel();
        let completion = Self {
            resolved: AtomicBool::new(false),
            sender: Mutex::new(Some(sender)),
        };
        (completion, receiver)
    }

    /// Resolve with the given value.  Returns true if this call won; false if the completion
    /// was already resolved, in which case `value` is dropped.
    pub fn resolve(&self, value: T) -> bool {
        if self
            .resolved
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        if let Some(sender) = self.sender.lock().unwrap().take() {
            // the receiver may have been dropped, in which case nobody is waiting
            let _ = sender.send(value);
        }
        true
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.load(Ordering::Acquire)
    }
}
