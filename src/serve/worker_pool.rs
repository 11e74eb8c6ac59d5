//! Per-worker request queues.
//!
//! Each worker owns a dedicated bounded channel, so receivers never
//! contend; senders share one atomic round-robin counter for even
//! distribution across connections.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam::channel;

use crate::serve::RequestData;

pub(crate) struct WorkerQueues {
    senders: Vec<channel::Sender<RequestData>>,
    receivers: Vec<channel::Receiver<RequestData>>,
    next_worker: Arc<AtomicUsize>,
}

impl WorkerQueues {
    pub(crate) fn new(num_workers: usize, capacity_per_worker: usize) -> Self {
        let mut senders = Vec::with_capacity(num_workers);
        let mut receivers = Vec::with_capacity(num_workers);

        for _ in 0..num_workers {
            let (tx, rx) = channel::bounded(capacity_per_worker);
            senders.push(tx);
            receivers.push(rx);
        }

        Self {
            senders,
            receivers,
            next_worker: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A sender that round-robins across all workers.
    pub(crate) fn get_sender(&self) -> WorkerSender {
        WorkerSender {
            senders: self.senders.clone(),
            next_worker: self.next_worker.clone(),
        }
    }

    /// The dedicated receiver for one worker.
    pub(crate) fn get_receiver(&self, worker_id: usize) -> channel::Receiver<RequestData> {
        self.receivers[worker_id].clone()
    }
}

#[derive(Clone)]
pub(crate) struct WorkerSender {
    senders: Vec<channel::Sender<RequestData>>,
    next_worker: Arc<AtomicUsize>,
}

impl WorkerSender {
    /// Non-blocking send; returns the request back if the target queue is
    /// full, so the async side never blocks a tokio thread.
    #[allow(clippy::result_large_err)]
    pub(crate) fn try_send(
        &self,
        data: RequestData,
    ) -> Result<(), channel::TrySendError<RequestData>> {
        let worker = self.next_worker.fetch_add(1, Ordering::Relaxed) % self.senders.len();
        self.senders[worker].try_send(data)
    }
}
