//! SerialQueue: strict FIFO, single-flight task execution.
//!
//! Tasks are appended to an unbounded channel drained by exactly one worker
//! task, so at most one task runs at a time and tasks never interleave. The
//! worker is spawned lazily on the current tokio runtime and respawned if a
//! previous runtime went away.

use std::future::Future;
use std::pin::Pin;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

type Job = Pin<Box<dyn Future<Output = ()> + Send>>;

#[derive(Default)]
pub struct SerialQueue {
    sender: Mutex<Option<mpsc::UnboundedSender<Job>>>,
}

impl SerialQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `task`. The receiver resolves with its output once every
    /// earlier task has finished and this one has run. It errors if the task
    /// was dropped (no runtime, or the worker died on a panic).
    pub fn push<Fut>(&self, task: Fut) -> oneshot::Receiver<Fut::Output>
    where
        Fut: Future + Send + 'static,
        Fut::Output: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job: Job = Box::pin(async move {
            let _ = tx.send(task.await);
        });

        let mut sender = self.sender.lock();
        let job = match sender.as_ref() {
            Some(live) => match live.send(job) {
                Ok(()) => return rx,
                Err(mpsc::error::SendError(job)) => job,
            },
            None => job,
        };

        match spawn_worker() {
            Some(fresh) => {
                let _ = fresh.send(job);
                *sender = Some(fresh);
            }
            None => tracing::warn!("no tokio runtime available, dropping queued task"),
        }
        rx
    }
}

fn spawn_worker() -> Option<mpsc::UnboundedSender<Job>> {
    let handle = tokio::runtime::Handle::try_current().ok()?;
    let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
    handle.spawn(async move {
        while let Some(job) = rx.recv().await {
            job.await;
        }
    });
    Some(tx)
}
