//! Worker-pool expansion.
//!
//! A fixed number of tokio tasks claim ranges from a shared queue, enumerate
//! them, and send every address into one bounded channel. A single collector
//! drains the channel:
//!
//! ```text
//! WorkQueue --claim--> worker 0..N --send--> mpsc(capacity) --recv--> collector
//!                          |                                           ^
//!                          +--try_send--> error slot (capacity 1) -----+
//! ```
//!
//! The bounded channel caps memory in flight: producers wait while the
//! collector is behind. A supervisor task joins every worker before dropping
//! the last sender, so the channel closes exactly once, after all producers
//! are done. Output order across (and within) ranges is unspecified.

use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::engine::{
    capacity_hint, ExpandOptions, Expansion, ExpansionStatus, CANCEL_CHECK_INTERVAL,
};
use crate::error::{ExpandError, Result};
use crate::lookup::SharedLookup;
use crate::range::AddressRange;

/// Ranges waiting to be claimed by workers.
struct WorkQueue {
    ranges: Vec<AddressRange>,
    next: AtomicUsize,
}

impl WorkQueue {
    fn new(ranges: &[AddressRange]) -> Self {
        Self {
            ranges: ranges.to_vec(),
            next: AtomicUsize::new(0),
        }
    }

    /// Hand out each range exactly once; `None` once the queue is drained.
    fn claim(&self) -> Option<&AddressRange> {
        let idx = self.next.fetch_add(1, Ordering::Relaxed);
        self.ranges.get(idx)
    }
}

/// Why a worker stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkerExit {
    Drained,
    Stopped,
    Failed,
}

/// Expand `ranges` with a pool of `options.concurrency` workers.
///
/// `lookup` must already be built over the same ranges. If any worker fails,
/// the collected addresses are discarded and the first error is returned.
/// If `cancel` fires, the addresses collected so far are returned with
/// [`ExpansionStatus::Cancelled`].
pub async fn expand_parallel(
    ranges: &[AddressRange],
    lookup: SharedLookup,
    options: &ExpandOptions,
    cancel: &CancellationToken,
) -> Result<Expansion> {
    let workers = options.concurrency.max(1);
    let queue = Arc::new(WorkQueue::new(ranges));
    let (addr_tx, mut addr_rx) = mpsc::channel::<Ipv4Addr>(options.channel_capacity.max(1));
    let (err_tx, mut err_rx) = mpsc::channel::<ExpandError>(1);

    // Fires on user cancellation, and on the first worker failure so that the
    // remaining workers stop wasting time on a result that will be discarded.
    let stop = cancel.child_token();

    let mut pool = JoinSet::new();
    for worker_id in 0..workers {
        pool.spawn(run_worker(
            worker_id,
            queue.clone(),
            lookup.clone(),
            addr_tx.clone(),
            err_tx.clone(),
            stop.clone(),
        ));
    }

    tracing::debug!(
        phase = "running",
        workers,
        ranges = ranges.len(),
        capacity = options.channel_capacity,
        "Worker pool started"
    );

    let supervisor = tokio::spawn(async move {
        let mut stopped_early = false;
        while let Some(joined) = pool.join_next().await {
            match joined {
                Ok(WorkerExit::Drained) => {}
                Ok(WorkerExit::Stopped) | Ok(WorkerExit::Failed) => stopped_early = true,
                Err(e) => {
                    stopped_early = true;
                    report_error(&err_tx, ExpandError::Worker(e.to_string()));
                }
            }
        }
        // Every worker has been joined; this is the last sender.
        drop(addr_tx);
        stopped_early
    });

    let mut addresses = Vec::with_capacity(capacity_hint(ranges));
    while let Some(addr) = addr_rx.recv().await {
        addresses.push(addr);
    }

    tracing::debug!(phase = "draining", addresses = addresses.len(), "Output channel closed");

    let stopped_early = supervisor
        .await
        .map_err(|e| ExpandError::Worker(e.to_string()))?;

    if let Ok(err) = err_rx.try_recv() {
        tracing::error!(
            error = %err,
            discarded = addresses.len(),
            "Expansion worker failed, discarding results"
        );
        return Err(err);
    }

    let status = if stopped_early && cancel.is_cancelled() {
        ExpansionStatus::Cancelled
    } else {
        ExpansionStatus::Completed
    };

    Ok(Expansion { addresses, status })
}

async fn run_worker(
    worker_id: usize,
    queue: Arc<WorkQueue>,
    lookup: SharedLookup,
    out: mpsc::Sender<Ipv4Addr>,
    errors: mpsc::Sender<ExpandError>,
    stop: CancellationToken,
) -> WorkerExit {
    let mut claimed = 0usize;

    // The token is checked at the first address of every claimed range, so a
    // Stopped exit always leaves part of a claimed range unproduced.
    loop {
        let Some(range) = queue.claim() else {
            tracing::trace!(worker_id, claimed, "Work queue drained");
            return WorkerExit::Drained;
        };
        claimed += 1;

        for addr in range.addresses() {
            if (addr - range.start) % CANCEL_CHECK_INTERVAL == 0 && stop.is_cancelled() {
                tracing::trace!(worker_id, block = %range.block, "Worker stopped mid-range");
                return WorkerExit::Stopped;
            }

            if lookup.contains(addr).is_none() {
                report_error(
                    &errors,
                    ExpandError::LookupMiss {
                        address: Ipv4Addr::from(addr),
                        range: *range,
                    },
                );
                stop.cancel();
                return WorkerExit::Failed;
            }

            // The collector drains until every sender is gone, so a send can
            // only fail if the collector itself was dropped.
            if out.send(Ipv4Addr::from(addr)).await.is_err() {
                return WorkerExit::Stopped;
            }
        }
    }
}

/// Put `err` into the single-slot error channel. The first error wins.
fn report_error(slot: &mpsc::Sender<ExpandError>, err: ExpandError) {
    if let Err(mpsc::error::TrySendError::Full(dropped)) = slot.try_send(err) {
        tracing::debug!(error = %dropped, "Error slot already taken, dropping error");
    }
}
