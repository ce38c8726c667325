//! Deferred per-chunk surface extraction.
//!
//! Extraction runs on a dedicated tokio runtime's blocking pool against
//! immutable snapshots; results come back over an unbounded channel and are
//! applied on the caller's thread in [`RemeshQueue::poll`]. Each chunk has at
//! most one extraction in flight. Snapshots submitted while one is running are
//! coalesced into a single pending slot (last one wins) that is dispatched as
//! soon as the running extraction completes.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use serde::Serialize;
use tokio::runtime::{Builder, Runtime};
use tokio::sync::mpsc;

use crate::core::{Error, Result};
use crate::mesh::{ChunkMesh, DensitySnapshot, MeshPiece, MeshStore, Mesher};
use crate::voxel::chunk::ChunkCoord;

/// Counters for diagnostics
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RemeshStats {
    /// Snapshots handed to `submit`
    pub submitted: u64,
    /// Extractions actually started
    pub dispatched: u64,
    /// Pending snapshots superseded before they started
    pub coalesced: u64,
    pub completed: u64,
    pub failed: u64,
}

/// Result of one extraction, sent back from a worker
struct Completion {
    coord: ChunkCoord,
    revision: u64,
    result: Result<Vec<MeshPiece>>,
}

#[derive(Debug, Default)]
struct ChunkSlot {
    /// Revision currently being extracted
    in_flight: Option<u64>,
    /// Latest snapshot waiting for the running extraction to finish
    pending: Option<DensitySnapshot>,
}

/// Per-chunk extraction task queue with atomic mesh swap
pub struct RemeshQueue {
    mesher: Arc<dyn Mesher>,
    /// `None` runs extraction inline on submit
    runtime: Option<Runtime>,
    result_tx: mpsc::UnboundedSender<Completion>,
    result_rx: mpsc::UnboundedReceiver<Completion>,
    slots: HashMap<ChunkCoord, ChunkSlot>,
    store: MeshStore,
    stats: RemeshStats,
}

impl RemeshQueue {
    /// Create a queue backed by `workers` background extraction threads
    pub fn new(mesher: impl Mesher + 'static, workers: usize) -> Result<Self> {
        if workers == 0 {
            return Err(Error::InvalidConfiguration("remesh queue needs at least one worker".to_string()));
        }
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(workers)
            .thread_name("remesh")
            .build()?;
        log::debug!("Remesh queue started with {} workers", workers);
        Ok(Self::with_runtime(Arc::new(mesher), Some(runtime)))
    }

    /// A queue that extracts synchronously inside `submit`.
    ///
    /// Same swap and failure policy as the threaded queue, without a runtime.
    pub fn immediate(mesher: impl Mesher + 'static) -> Self {
        Self::with_runtime(Arc::new(mesher), None)
    }

    fn with_runtime(mesher: Arc<dyn Mesher>, runtime: Option<Runtime>) -> Self {
        let (result_tx, result_rx) = mpsc::unbounded_channel();
        Self {
            mesher,
            runtime,
            result_tx,
            result_rx,
            slots: HashMap::new(),
            store: MeshStore::new(),
            stats: RemeshStats::default(),
        }
    }

    /// Schedule extraction of a chunk snapshot.
    ///
    /// Starts immediately when the chunk has nothing in flight; otherwise the
    /// snapshot replaces any pending one.
    pub fn submit(&mut self, snapshot: DensitySnapshot) {
        self.stats.submitted += 1;
        let coord = snapshot.coord;
        let slot = self.slots.entry(coord).or_default();
        if let Some(running) = slot.in_flight {
            log::trace!(
                "Chunk {:?} busy with revision {}, queueing revision {}",
                coord,
                running,
                snapshot.revision
            );
            if slot.pending.replace(snapshot).is_some() {
                self.stats.coalesced += 1;
            }
            return;
        }
        self.dispatch(snapshot);
    }

    fn dispatch(&mut self, snapshot: DensitySnapshot) {
        let coord = snapshot.coord;
        let revision = snapshot.revision;
        self.slots.entry(coord).or_default().in_flight = Some(revision);
        self.stats.dispatched += 1;

        match &self.runtime {
            Some(runtime) => {
                let mesher = Arc::clone(&self.mesher);
                let tx = self.result_tx.clone();
                runtime.spawn_blocking(move || {
                    let result = extract_guarded(mesher.as_ref(), &snapshot);
                    // Receiver only goes away with the queue itself
                    let _ = tx.send(Completion { coord, revision, result });
                });
            }
            None => {
                let result = extract_guarded(self.mesher.as_ref(), &snapshot);
                self.finish(Completion { coord, revision, result });
            }
        }
    }

    fn finish(&mut self, completion: Completion) {
        let Completion { coord, revision, result } = completion;
        match result {
            Ok(pieces) => {
                self.stats.completed += 1;
                let newer = self.store.get(coord).is_some_and(|mesh| mesh.revision > revision);
                if newer {
                    log::trace!("Dropping mesh for {:?} at revision {}, store is newer", coord, revision);
                } else {
                    self.store.replace(ChunkMesh { coord, revision, pieces });
                }
            }
            Err(e) => {
                self.stats.failed += 1;
                log::warn!(
                    "Extraction of chunk {:?} at revision {} failed, keeping previous mesh: {}",
                    coord,
                    revision,
                    e
                );
            }
        }

        let next = match self.slots.get_mut(&coord) {
            Some(slot) => {
                slot.in_flight = None;
                slot.pending.take()
            }
            None => None,
        };
        match next {
            Some(snapshot) => self.dispatch(snapshot),
            None => {
                self.slots.remove(&coord);
            }
        }
    }

    /// Apply every completed extraction without blocking.
    ///
    /// Returns the number of completions processed.
    pub fn poll(&mut self) -> usize {
        let mut processed = 0;
        while let Ok(completion) = self.result_rx.try_recv() {
            self.finish(completion);
            processed += 1;
        }
        processed
    }

    /// Block until no chunk has in-flight or pending work
    pub fn wait_idle(&mut self) {
        while !self.is_idle() {
            let next = self.result_rx.blocking_recv();
            match next {
                Some(completion) => self.finish(completion),
                None => break,
            }
        }
    }

    /// Drain outstanding work and forget every stored mesh
    pub fn clear(&mut self) {
        self.wait_idle();
        self.slots.clear();
        self.store.clear();
    }

    pub fn is_idle(&self) -> bool {
        self.slots.values().all(|slot| slot.in_flight.is_none())
    }

    pub fn is_in_flight(&self, coord: ChunkCoord) -> bool {
        self.slots.get(&coord).is_some_and(|slot| slot.in_flight.is_some())
    }

    pub fn has_pending(&self, coord: ChunkCoord) -> bool {
        self.slots.get(&coord).is_some_and(|slot| slot.pending.is_some())
    }

    pub fn in_flight_count(&self) -> usize {
        self.slots.values().filter(|slot| slot.in_flight.is_some()).count()
    }

    /// Latest completed mesh of a chunk
    pub fn mesh(&self, coord: ChunkCoord) -> Option<Arc<ChunkMesh>> {
        self.store.get(coord)
    }

    pub fn store(&self) -> &MeshStore {
        &self.store
    }

    pub fn stats(&self) -> RemeshStats {
        self.stats
    }
}

impl Drop for RemeshQueue {
    fn drop(&mut self) {
        // Running extractions finish on their own; results are discarded
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

/// Run a mesher, turning a panic into an extraction error for that chunk
fn extract_guarded(mesher: &dyn Mesher, snapshot: &DensitySnapshot) -> Result<Vec<MeshPiece>> {
    panic::catch_unwind(AssertUnwindSafe(|| mesher.extract(snapshot))).unwrap_or_else(|_| {
        Err(Error::Extraction {
            coord: snapshot.coord,
            reason: "mesher panicked".to_string(),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{UVec3, Vec3};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::{Duration, Instant};

    /// Records the revision of every snapshot it extracts
    #[derive(Default)]
    struct RecordingMesher {
        extracted: Mutex<Vec<u64>>,
        fail: AtomicBool,
    }

    impl Mesher for RecordingMesher {
        fn extract(&self, snapshot: &DensitySnapshot) -> Result<Vec<MeshPiece>> {
            self.extracted.lock().unwrap().push(snapshot.revision);
            if self.fail.load(Ordering::SeqCst) {
                return Err(Error::Extraction {
                    coord: snapshot.coord,
                    reason: "forced failure".to_string(),
                });
            }
            Ok(vec![MeshPiece {
                vertices: Vec::new(),
                indices: vec![0, 0, 0],
            }])
        }
    }

    struct PanickingMesher;

    impl Mesher for PanickingMesher {
        fn extract(&self, _snapshot: &DensitySnapshot) -> Result<Vec<MeshPiece>> {
            panic!("boom");
        }
    }

    fn snapshot(coord: ChunkCoord, revision: u64) -> DensitySnapshot {
        DensitySnapshot {
            coord,
            revision,
            size: UVec3::splat(2),
            cell_size: Vec3::ONE,
            iso_level: 0.0,
            values: Arc::from(vec![0.0f32; 8]),
        }
    }

    #[test]
    fn test_coalesces_while_in_flight() {
        let mesher = Arc::new(RecordingMesher::default());
        let mut queue = RemeshQueue::new(Arc::clone(&mesher), 2).unwrap();
        let coord = ChunkCoord::new(0, 0, 0);

        queue.submit(snapshot(coord, 1));
        assert!(queue.is_in_flight(coord));
        assert!(!queue.has_pending(coord));

        queue.submit(snapshot(coord, 2));
        queue.submit(snapshot(coord, 3));
        assert!(queue.has_pending(coord));

        queue.wait_idle();

        assert_eq!(*mesher.extracted.lock().unwrap(), vec![1, 3]);
        let stats = queue.stats();
        assert_eq!(stats.submitted, 3);
        assert_eq!(stats.dispatched, 2);
        assert_eq!(stats.coalesced, 1);
        assert_eq!(stats.completed, 2);
        assert_eq!(queue.mesh(coord).unwrap().revision, 3);
        assert!(queue.is_idle());
    }

    #[test]
    fn test_chunks_are_independent() {
        let mesher = Arc::new(RecordingMesher::default());
        let mut queue = RemeshQueue::new(Arc::clone(&mesher), 4).unwrap();

        for x in 0..4 {
            queue.submit(snapshot(ChunkCoord::new(x, 0, 0), 1));
        }
        assert_eq!(queue.in_flight_count(), 4);
        queue.wait_idle();

        assert_eq!(queue.store().len(), 4);
        assert_eq!(queue.stats().coalesced, 0);
        assert_eq!(queue.store().total_triangles(), 4);
    }

    #[test]
    fn test_failure_keeps_previous_mesh() {
        let mesher = Arc::new(RecordingMesher::default());
        let mut queue = RemeshQueue::new(Arc::clone(&mesher), 1).unwrap();
        let coord = ChunkCoord::new(1, 0, 0);

        queue.submit(snapshot(coord, 1));
        queue.wait_idle();
        assert_eq!(queue.mesh(coord).unwrap().revision, 1);

        mesher.fail.store(true, Ordering::SeqCst);
        queue.submit(snapshot(coord, 2));
        queue.wait_idle();

        assert_eq!(queue.mesh(coord).unwrap().revision, 1);
        assert_eq!(queue.stats().failed, 1);
        assert!(queue.is_idle());
    }

    #[test]
    fn test_panicking_mesher_is_isolated() {
        let mut queue = RemeshQueue::new(PanickingMesher, 1).unwrap();
        let coord = ChunkCoord::new(0, 0, 0);
        queue.submit(snapshot(coord, 1));
        queue.wait_idle();

        assert!(queue.mesh(coord).is_none());
        assert_eq!(queue.stats().failed, 1);
    }

    #[test]
    fn test_poll_eventually_applies() {
        let mut queue = RemeshQueue::new(RecordingMesher::default(), 1).unwrap();
        let coord = ChunkCoord::new(0, 2, 0);
        queue.submit(snapshot(coord, 7));

        let deadline = Instant::now() + Duration::from_secs(5);
        while !queue.is_idle() && Instant::now() < deadline {
            queue.poll();
            std::thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(queue.mesh(coord).unwrap().revision, 7);
    }

    #[test]
    fn test_immediate_mode() {
        let mesher = Arc::new(RecordingMesher::default());
        let mut queue = RemeshQueue::immediate(Arc::clone(&mesher));
        let coord = ChunkCoord::new(0, 0, 3);

        queue.submit(snapshot(coord, 1));
        assert!(!queue.is_in_flight(coord));
        assert_eq!(queue.mesh(coord).unwrap().revision, 1);

        queue.submit(snapshot(coord, 2));
        assert_eq!(*mesher.extracted.lock().unwrap(), vec![1, 2]);
        assert_eq!(queue.poll(), 0);
    }

    #[test]
    fn test_clear_forgets_meshes() {
        let mut queue = RemeshQueue::new(RecordingMesher::default(), 1).unwrap();
        queue.submit(snapshot(ChunkCoord::new(0, 0, 0), 1));
        queue.clear();
        assert!(queue.store().is_empty());
        assert!(queue.is_idle());
    }

    #[test]
    fn test_zero_workers_rejected() {
        assert!(matches!(
            RemeshQueue::new(RecordingMesher::default(), 0),
            Err(Error::InvalidConfiguration(_))
        ));
    }
}
