//! Background chunk reclamation (§4.B "Compaction").

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info};

use crate::chunk::{ChunkState, Zone};
use crate::pool::StoragePool;

/// How far behind the current write cursor a chunk must fall, in bytes,
/// before compaction will consider reclaiming it. The spec leaves the
/// exact value to the implementer; one chunk's worth of slack keeps a
/// single rollover from racing reclamation of the chunk it just left.
pub const RETENTION_WINDOW: u64 = 1 << 28;

/// Handle to a running compactor background task. Dropping it signals
/// shutdown; join the task to wait for it to observe the signal, matching
/// the task/handle idiom used by the execution pipeline's scheduler.
pub struct CompactorHandle {
    shutdown: watch::Sender<bool>,
    task: tokio::task::JoinHandle<()>,
}

impl CompactorHandle {
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}

/// Spawn a background task that periodically reclaims sealed chunks that
/// have fallen out of the retention window and are not pinned by any root
/// in the live history (§4.B invariant).
pub fn spawn(pool: Arc<StoragePool>, period: Duration) -> CompactorHandle {
    let (tx, mut rx) = watch::channel(false);
    let task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(err) = run_once(&pool) {
                        debug!(?err, "compaction pass failed");
                    }
                }
                _ = rx.changed() => {
                    if *rx.borrow() {
                        info!("compactor shutting down");
                        return;
                    }
                }
            }
        }
    });
    CompactorHandle { shutdown: tx, task }
}

/// Run one compaction pass: for each zone, free sealed chunks whose
/// contents lie entirely below `latest_root.min_offset - RETENTION_WINDOW`
/// and are not referenced by any root within `min_history_length` of the
/// current version.
pub fn run_once(pool: &StoragePool) -> Result<usize, crate::error::StorageError> {
    let metadata = pool.metadata_snapshot();
    let Some(latest) = metadata.latest_root() else {
        return Ok(0);
    };
    let version = latest.block_number;
    let mut freed = 0usize;

    for (zone, min_offset) in [
        (Zone::Fast, latest.min_offset_fast),
        (Zone::Slow, latest.min_offset_slow),
    ] {
        let floor = min_offset.saturating_sub(RETENTION_WINDOW);
        for (idx, record) in metadata.chunks.iter().enumerate() {
            if record.zone() != zone || record.state() != ChunkState::Sealed {
                continue;
            }
            let chunk = crate::offsets::ChunkOffset::new(idx as u32, 0, zone == Zone::Fast);
            if metadata.pinned_by_history(&chunk, version) {
                continue;
            }
            // A chunk is only eligible once its highest-numbered insertion
            // predates the retention floor; `insertion_count` stands in for
            // that high-water mark.
            if record.insertion_count < floor {
                pool.reclaim_chunk(zone, idx as u32)?;
                freed += 1;
            }
        }
    }
    Ok(freed)
}
