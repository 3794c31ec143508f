//! Counting the outcomes of a batch of concurrent operations.
//!
//! Each operation in a batch holds a [`Ticket`] and reports on it exactly once.  The batch is
//! complete when it has been [finished](Batch::finish) and every ticket has reported.
use anyhow::{anyhow, Error};
use log::{error, info};
use nimbusio::Completion;
use std::fmt;
use std::ops::AddAssign;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

/// Unsuccessful outcomes.  An error is a request that succeeded but returned the wrong thing;
/// a failure is a request that did not succeed at all.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Counts {
    pub errors: usize,
    pub failures: usize,
}

impl Counts {
    pub fn is_clean(&self) -> bool {
        self.errors == 0 && self.failures == 0
    }
}

impl AddAssign for Counts {
    fn add_assign(&mut self, other: Counts) {
        self.errors += other.errors;
        self.failures += other.failures;
    }
}

impl fmt::Display for Counts {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} errors, {} failures", self.errors, self.failures)
    }
}

struct Inner<T> {
    pending: usize,
    sealed: bool,
    results: Vec<T>,
    counts: Counts,
}

struct Shared<T> {
    name: String,
    completion: Completion<()>,
    inner: Mutex<Inner<T>>,
}

impl<T> Shared<T> {
    fn resolve_if_complete(&self, inner: &Inner<T>) {
        if inner.sealed && inner.pending == 0 {
            self.completion.resolve(());
        }
    }
}

/// A group of operations whose outcomes are collected together.
pub struct Batch<T> {
    shared: Arc<Shared<T>>,
    done: oneshot::Receiver<()>,
}

/// The outcome of a finished batch: the values of its successful operations, in the order
/// they reported, and the count of those that did not succeed.
#[derive(Debug)]
pub struct BatchResult<T> {
    pub results: Vec<T>,
    pub counts: Counts,
}

impl<T> Batch<T> {
    pub fn new<S: Into<String>>(name: S) -> Self {
        let (completion, done) = Completion::new();
        Self {
            shared: Arc::new(Shared {
                name: name.into(),
                completion,
                inner: Mutex::new(Inner {
                    pending: 0,
                    sealed: false,
                    results: vec![],
                    counts: Counts::default(),
                }),
            }),
            done,
        }
    }

    /// Issue a ticket for one more operation.  The label appears in log messages.
    pub fn ticket<L: Into<String>>(&self, label: L) -> Ticket<T> {
        self.shared.inner.lock().unwrap().pending += 1;
        Ticket {
            shared: self.shared.clone(),
            label: label.into(),
            reported: false,
        }
    }

    /// Stop issuing tickets and wait for every outstanding ticket to report.
    pub async fn finish(self) -> BatchResult<T> {
        let Batch { shared, done } = self;
        {
            let mut inner = shared.inner.lock().unwrap();
            inner.sealed = true;
            shared.resolve_if_complete(&inner);
        }

        // `shared` owns the completion, so it cannot be dropped unresolved while we wait
        let _ = done.await;

        let mut inner = shared.inner.lock().unwrap();
        info!("{} complete: {}", shared.name, inner.counts);
        BatchResult {
            results: std::mem::take(&mut inner.results),
            counts: inner.counts,
        }
    }
}

enum Report<T> {
    Success(T),
    Error(String),
    Failure(Error),
}

/// The obligation to report the outcome of one operation in a [`Batch`].  A ticket dropped
/// without reporting (for example, by a panicking task) counts as a failure.
pub struct Ticket<T> {
    shared: Arc<Shared<T>>,
    label: String,
    reported: bool,
}

impl<T> Ticket<T> {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn success(mut self, value: T) {
        self.report(Report::Success(value));
    }

    /// The operation completed, but its result was wrong
    pub fn error<S: Into<String>>(mut self, message: S) {
        self.report(Report::Error(message.into()));
    }

    /// The operation did not complete
    pub fn failure(mut self, err: Error) {
        self.report(Report::Failure(err));
    }

    fn report(&mut self, report: Report<T>) {
        self.reported = true;
        let name = &self.shared.name;
        let mut inner = self.shared.inner.lock().unwrap();
        inner.pending -= 1;
        match report {
            Report::Success(value) => {
                info!("{} {} successful; {} pending", name, self.label, inner.pending);
                inner.results.push(value);
            }
            Report::Error(message) => {
                error!("{} {} error: {}", name, self.label, message);
                inner.counts.errors += 1;
            }
            Report::Failure(err) => {
                error!("{} {} failure: {:#}", name, self.label, err);
                inner.counts.failures += 1;
            }
        }
        self.shared.resolve_if_complete(&inner);
    }
}

impl<T> Drop for Ticket<T> {
    fn drop(&mut self) {
        if !self.reported {
            self.report(Report::Failure(anyhow!("dropped without reporting")));
        }
    }
}

/// Running totals across the phases of a test run
#[derive(Debug, Default)]
pub struct Tally {
    phases: Vec<(String, Counts)>,
}

impl Tally {
    pub fn add<S: Into<String>>(&mut self, phase: S, counts: Counts) {
        self.phases.push((phase.into(), counts));
    }

    pub fn total(&self) -> Counts {
        let mut total = Counts::default();
        for (_, counts) in &self.phases {
            total += *counts;
        }
        total
    }

    pub fn is_clean(&self) -> bool {
        self.total().is_clean()
    }

    /// Log each phase's counts, and the total
    pub fn report(&self) {
        for (phase, counts) in &self.phases {
            if counts.is_clean() {
                info!("{}: ok", phase);
            } else {
                error!("{}: {}", phase, counts);
            }
        }
        info!("total: {}", self.total());
    }
}
