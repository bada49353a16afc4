use std::fmt;
use std::sync::{Arc, Mutex};

use crossbeam_channel::{Receiver, Sender, unbounded};
use hashbrown::HashSet;
use rayon::{ThreadPool, ThreadPoolBuilder};
use strata_chunk::ChunkCoord;

use crate::relevance::RelevanceSnapshot;

/// Failure surfaced by a stage operation. Caught at the phase boundary; the
/// position becomes eligible for re-queueing.
#[derive(Debug)]
pub struct PhaseError {
    message: String,
}

impl PhaseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for PhaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for PhaseError {}

/// One "process this position" operation, injected per stage instance.
pub type PhaseOp = Arc<dyn Fn(ChunkCoord) -> Result<(), PhaseError> + Send + Sync>;

#[derive(Default)]
struct RequestSet {
    pending: HashSet<ChunkCoord>,
    processing: HashSet<ChunkCoord>,
    unpolled: HashSet<ChunkCoord>,
}

/// A bounded worker pool over a relevance-ranked request set. Positions move
/// pending -> processing -> completed-unpolled; a position is in at most one
/// of those at a time, which is what makes `queue` idempotent.
pub struct ChunkPhase {
    name: &'static str,
    requests: Arc<Mutex<RequestSet>>,
    ticket_tx: Mutex<Option<Sender<()>>>,
    done_rx: Receiver<ChunkCoord>,
    _pool: ThreadPool,
}

impl ChunkPhase {
    pub fn new(
        name: &'static str,
        workers: usize,
        relevance: Arc<RelevanceSnapshot>,
        op: PhaseOp,
    ) -> Self {
        let (ticket_tx, ticket_rx) = unbounded::<()>();
        let (done_tx, done_rx) = unbounded::<ChunkCoord>();
        let requests = Arc::new(Mutex::new(RequestSet::default()));

        let pool = ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(move |i| format!("{name}-{i}"))
            .build()
            .expect("phase pool");

        for _ in 0..workers.max(1) {
            let ticket_rx = ticket_rx.clone();
            let done_tx = done_tx.clone();
            let requests = Arc::clone(&requests);
            let relevance = Arc::clone(&relevance);
            let op = Arc::clone(&op);
            pool.spawn(move || {
                // One ticket per admitted position; dequeue picks the best
                // pending position at that moment, not the one the ticket
                // was sent for.
                while ticket_rx.recv().is_ok() {
                    let coord = {
                        let mut req = requests.lock().unwrap();
                        let best = req
                            .pending
                            .iter()
                            .copied()
                            .min_by_key(|c| relevance.score(*c));
                        let Some(coord) = best else { continue };
                        req.pending.remove(&coord);
                        req.processing.insert(coord);
                        coord
                    };
                    match op(coord) {
                        Ok(()) => {
                            let mut req = requests.lock().unwrap();
                            req.processing.remove(&coord);
                            req.unpolled.insert(coord);
                            drop(req);
                            let _ = done_tx.send(coord);
                        }
                        Err(err) => {
                            log::warn!("{name}: {err} ({coord:?})");
                            requests.lock().unwrap().processing.remove(&coord);
                        }
                    }
                }
            });
        }

        Self {
            name,
            requests,
            ticket_tx: Mutex::new(Some(ticket_tx)),
            done_rx,
            _pool: pool,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Admit a position unless it is already tracked anywhere in the phase.
    pub fn queue(&self, coord: ChunkCoord) {
        {
            let mut req = self.requests.lock().unwrap();
            if req.pending.contains(&coord)
                || req.processing.contains(&coord)
                || req.unpolled.contains(&coord)
            {
                return;
            }
            req.pending.insert(coord);
        }
        if let Some(tx) = self.ticket_tx.lock().unwrap().as_ref() {
            let _ = tx.send(());
        }
    }

    /// True while the position is pending or actively in-flight.
    pub fn processing(&self, coord: ChunkCoord) -> bool {
        let req = self.requests.lock().unwrap();
        req.pending.contains(&coord) || req.processing.contains(&coord)
    }

    pub fn has_result(&self) -> bool {
        !self.done_rx.is_empty()
    }

    /// Surface at most one completed position; the rest stay buffered.
    pub fn poll(&self) -> Option<ChunkCoord> {
        let coord = self.done_rx.try_recv().ok()?;
        self.requests.lock().unwrap().unpolled.remove(&coord);
        Some(coord)
    }

    pub fn backlog(&self) -> usize {
        let req = self.requests.lock().unwrap();
        req.pending.len() + req.processing.len()
    }

    /// Stop accepting work and let workers drain out. Pending positions are
    /// dropped; in-flight positions may be abandoned.
    pub fn dispose(&self) {
        self.ticket_tx.lock().unwrap().take();
        self.requests.lock().unwrap().pending.clear();
    }
}

impl Drop for ChunkPhase {
    fn drop(&mut self) {
        // The rayon pool joins spawned tasks on drop; workers only exit once
        // the ticket channel disconnects.
        self.dispose();
    }
}
