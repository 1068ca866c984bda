//! Fan-out of independent inputs over a pool of worker threads.
//!
//! Workers pull the next input index from a shared cursor and send `(index, result)` back over a channel,
//! so results are reassembled in input order whatever the completion order.
//! Every worker owns the intermediate state of the input it is working on; only the configuration and the
//! cancellation flag are shared.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;

use log::{debug, info, warn};

use crate::{
    config::FailurePolicy,
    error::{PersistenceError, Result},
};

/// Shared flag for aborting a batch.
///
/// Raising it stops queued inputs from starting and makes in-flight ones return
/// [`PersistenceError::Cancelled`] at their next check.
/// A fail-fast batch raises its own token when an input fails.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn flag(&self) -> &AtomicBool {
        &self.0
    }
}

/// Run `task` on every input with up to `n_workers` threads and return the outputs in input order.
///
/// Under [`FailurePolicy::FailFast`] the first failure cancels the rest of the batch and the failure with the
/// lowest index observed is returned, tagged with that index.
/// Under [`FailurePolicy::CollectAll`] every input runs and all failures are returned together.
pub fn run_batch<I, T, F>(
    inputs: &[I],
    n_workers: usize,
    policy: FailurePolicy,
    token: &CancellationToken,
    task: F,
) -> Result<Vec<T>>
where
    I: Sync,
    T: Send,
    F: Fn(usize, &I, &AtomicBool) -> Result<T> + Sync,
{
    let n_inputs = inputs.len();
    let n_workers = n_workers.clamp(1, n_inputs.max(1));
    info!("Running batch of {n_inputs} inputs on {n_workers} workers");

    let cursor = AtomicUsize::new(0);
    let mut outputs: Vec<Option<T>> = (0..n_inputs).map(|_| None).collect();
    let mut failures: Vec<(usize, PersistenceError)> = vec![];

    thread::scope(|scope| {
        let (sender, receiver) = mpsc::channel();
        for worker in 0..n_workers {
            let sender = sender.clone();
            let cursor = &cursor;
            let task = &task;
            scope.spawn(move || loop {
                if token.is_cancelled() {
                    break;
                }
                let index = cursor.fetch_add(1, Ordering::Relaxed);
                let Some(input) = inputs.get(index) else {
                    break;
                };
                debug!("Worker {worker} starting input {index}");
                let result = task(index, input, token.flag());
                if sender.send((index, result)).is_err() {
                    break;
                }
            });
        }
        // Receiving ends once every worker has dropped its sender
        drop(sender);

        for (index, result) in receiver {
            match result {
                Ok(output) => outputs[index] = Some(output),
                Err(PersistenceError::Cancelled) => {}
                Err(err) => {
                    if policy == FailurePolicy::FailFast && !token.is_cancelled() {
                        warn!("Input {index} failed, cancelling batch: {err}");
                        token.cancel();
                    }
                    failures.push((index, err));
                }
            }
        }
    });

    if !failures.is_empty() {
        failures.sort_by_key(|(index, _)| *index);
        warn!("{} of {n_inputs} inputs failed", failures.len());
        return match policy {
            FailurePolicy::FailFast => {
                let (index, err) = failures.swap_remove(0);
                Err(err.at_index(index))
            }
            FailurePolicy::CollectAll => Err(PersistenceError::Batch { failures }),
        };
    }

    let outputs: Option<Vec<T>> = outputs.into_iter().collect();
    match outputs {
        Some(outputs) => {
            info!("Completed batch of {n_inputs} inputs");
            Ok(outputs)
        }
        None => {
            warn!("Batch cancelled before all inputs completed");
            Err(PersistenceError::Cancelled)
        }
    }
}
