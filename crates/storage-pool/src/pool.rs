use std::fs::File;
use std::os::unix::fs::FileExt;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{instrument, trace};

use crate::chunk::{ChunkMeta, ChunkState, Zone};
use crate::error::{Result, StorageError};
use crate::freelist::FreeList;
use crate::metadata::DbMetadata;
use crate::offsets::{ChunkOffset, VirtualOffset};
use crate::write_buffer::{WriteBuffer, WRITE_SIZE};

/// One contiguous run of virtual address space mapped onto one chunk,
/// threading `translate()` (§4.B).
#[derive(Debug, Clone, Copy)]
struct Segment {
    virtual_start: u64,
    virtual_end: u64,
    chunk: u32,
    chunk_base: u32,
}

struct ZoneWriter {
    zone: Zone,
    buffer: WriteBuffer,
    active_chunk: u32,
    chunk_write_offset: u32,
    virtual_cursor: u64,
    /// Virtual offset of byte 0 of the buffer currently being filled, set
    /// when the first byte of a new buffer generation is appended.
    buffer_virtual_start: Option<u64>,
    segments: Vec<Segment>,
}

impl ZoneWriter {
    fn new(zone: Zone, chunk: u32, buffer_capacity: usize) -> Self {
        Self {
            zone,
            buffer: WriteBuffer::new(buffer_capacity),
            active_chunk: chunk,
            chunk_write_offset: 0,
            virtual_cursor: 0,
            buffer_virtual_start: None,
            segments: Vec::new(),
        }
    }

    fn translate(&self, offset: u64) -> Option<ChunkOffset> {
        let seg = self
            .segments
            .iter()
            .rev()
            .find(|s| offset >= s.virtual_start && offset < s.virtual_end)?;
        let within = (offset - seg.virtual_start) as u32 + seg.chunk_base;
        Some(ChunkOffset::new(seg.chunk, within, self.zone == Zone::Fast))
    }
}

/// Owns a set of file-backed chunks and presents the fast/slow append
/// streams described in §4.B.
pub struct StoragePool {
    file: Arc<File>,
    chunk_size: u64,
    chunk_count: u32,
    metadata: Mutex<DbMetadata>,
    fast_free: FreeList,
    slow_free: FreeList,
    fast: Mutex<ZoneWriter>,
    slow: Mutex<ZoneWriter>,
    buffer_capacity: usize,
}

impl StoragePool {
    /// Create a new pool backed by a freshly truncated file of
    /// `chunk_count * chunk_size` bytes.
    pub fn create(path: &std::path::Path, chunk_count: u32, chunk_size: u64, history_length: u32) -> Result<Self> {
        let file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(chunk_count as u64 * chunk_size)?;

        let metadata = DbMetadata::new(chunk_count, history_length);
        let fast_free = FreeList::new();
        let slow_free = FreeList::new();
        let mut chunks: Vec<ChunkMeta> = metadata
            .chunks
            .iter()
            .map(|c| ChunkMeta {
                insertion_count: c.insertion_count,
                zone: c.zone(),
                state: c.state(),
                next: c.next,
            })
            .collect();

        // Reserve the first chunk of each zone as the initial active chunk
        // rather than leaving it on the free list.
        let fast_chunk = chunks.iter().position(|c| c.zone == Zone::Fast).map(|i| i as u32);
        let slow_chunk = chunks.iter().position(|c| c.zone == Zone::Slow).map(|i| i as u32);
        let to_free: Vec<(u32, Zone)> = chunks
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i as u32) != fast_chunk && Some(*i as u32) != slow_chunk)
            .map(|(i, c)| (i as u32, c.zone))
            .collect();
        if let Some(idx) = fast_chunk {
            chunks[idx as usize].state = ChunkState::Active;
        }
        if let Some(idx) = slow_chunk {
            chunks[idx as usize].state = ChunkState::Active;
        }
        for (idx, zone) in to_free {
            match zone {
                Zone::Fast => fast_free.push(&mut chunks, idx),
                Zone::Slow => slow_free.push(&mut chunks, idx),
            }
        }
        write_back(&mut metadata.chunks, &chunks);
        for (record, chunk) in metadata.chunks.iter_mut().zip(&chunks) {
            record.state = chunk.state as u8;
        }

        let buffer_capacity = (WRITE_SIZE as u64).min(chunk_size) as usize;

        Ok(Self {
            file: Arc::new(file),
            chunk_size,
            chunk_count,
            metadata: Mutex::new(metadata),
            fast_free,
            slow_free,
            fast: Mutex::new(ZoneWriter::new(Zone::Fast, fast_chunk.unwrap_or(0), buffer_capacity)),
            slow: Mutex::new(ZoneWriter::new(Zone::Slow, slow_chunk.unwrap_or(0), buffer_capacity)),
            buffer_capacity,
        })
    }

    fn writer(&self, zone: Zone) -> &Mutex<ZoneWriter> {
        match zone {
            Zone::Fast => &self.fast,
            Zone::Slow => &self.slow,
        }
    }

    fn free_list(&self, zone: Zone) -> &FreeList {
        match zone {
            Zone::Fast => &self.fast_free,
            Zone::Slow => &self.slow_free,
        }
    }

    /// Allocate `bytes` of virtual address space in `zone` and return its
    /// starting offset. Pure bookkeeping; no I/O (§4.B).
    pub fn reserve_virtual(&self, zone: Zone, bytes: usize) -> VirtualOffset {
        let mut w = self.writer(zone).lock();
        let start = w.virtual_cursor;
        w.virtual_cursor += bytes as u64;
        VirtualOffset::new(start)
    }

    /// Append `data` at `virtual_offset` (must be the offset most recently
    /// returned by `reserve_virtual` for this zone). Rolls the write buffer
    /// and, if necessary, the active chunk.
    #[instrument(skip(self, data))]
    pub async fn write(&self, zone: Zone, virtual_offset: VirtualOffset, data: &[u8]) -> Result<()> {
        if data.len() > self.buffer_capacity {
            return Err(StorageError::WriteTooLarge {
                len: data.len(),
                write_size: self.buffer_capacity,
            });
        }

        loop {
            let needs_flush = {
                let mut w = self.writer(zone).lock();
                if w.buffer.is_empty() {
                    w.buffer_virtual_start = Some(virtual_offset.get());
                }
                if w.buffer.try_append(data).is_some() {
                    None
                } else {
                    Some(())
                }
            };
            if needs_flush.is_none() {
                return Ok(());
            }
            self.advance_write_cursor(zone).await?;
        }
    }

    /// Flush the active write buffer to disk, rolling to a fresh chunk if
    /// the current one has no room left (§4.B "Chunk rollover"), and
    /// record the virtual-to-physical mapping for the bytes just flushed.
    #[instrument(skip(self))]
    pub async fn advance_write_cursor(&self, zone: Zone) -> Result<()> {
        let (sealed, chunk, write_at, rolled_to) = {
            let mut w = self.writer(zone).lock();
            if w.buffer.is_empty() {
                return Ok(());
            }
            let used = w.buffer.cursor() as u64;
            let virtual_start = w
                .buffer_virtual_start
                .expect("buffer_virtual_start is set whenever the buffer holds data");
            let sealed = w.buffer.seal();
            w.buffer_virtual_start = None;
            let write_at = w.chunk_write_offset as u64;
            let mut chunk = w.active_chunk;
            let mut rolled_to = None;

            if write_at + sealed.len() as u64 > self.chunk_size {
                let new_chunk = self.acquire_chunk(zone, Some(w.active_chunk))?;
                chunk = new_chunk;
                rolled_to = Some(new_chunk);
                w.active_chunk = new_chunk;
                w.chunk_write_offset = 0;
            }
            let write_at = if rolled_to.is_some() { 0 } else { write_at };
            w.segments.push(Segment {
                virtual_start,
                virtual_end: virtual_start + used,
                chunk,
                chunk_base: write_at as u32,
            });
            w.chunk_write_offset += sealed.len() as u32;
            (sealed, chunk, write_at, rolled_to)
        };

        if let Some(new_chunk) = rolled_to {
            trace!(zone = ?zone, new_chunk, "chunk rollover");
        }

        let file = Arc::clone(&self.file);
        let abs_offset = chunk as u64 * self.chunk_size + write_at;
        tokio::task::spawn_blocking(move || file.write_all_at(&sealed, abs_offset))
            .await
            .expect("blocking write task panicked")?;
        Ok(())
    }

    /// Acquire a fresh chunk from `zone`'s free list. If `sealing` names the
    /// chunk being rolled away from, it's marked `Sealed` first (in the same
    /// metadata lock) so the compactor can later find and reclaim it — the
    /// only place a chunk transitions out of `Active`.
    fn acquire_chunk(&self, zone: Zone, sealing: Option<u32>) -> Result<u32> {
        let mut metadata = self.metadata.lock();
        if let Some(sealed_idx) = sealing {
            metadata.chunks[sealed_idx as usize].state = ChunkState::Sealed as u8;
        }
        let mut chunks = to_chunk_metas(&metadata.chunks);
        let popped = self.free_list(zone).pop(&mut chunks);
        let idx = popped.ok_or(StorageError::FreeListExhausted { zone })?;
        write_back(&mut metadata.chunks, &chunks);
        metadata.chunks[idx as usize].state = ChunkState::Active as u8;
        Ok(idx)
    }

    /// Return a sealed, unreferenced chunk to its zone's free list. Called
    /// by the compactor once it has determined the chunk falls outside the
    /// retention window and isn't pinned by any root in live history.
    pub fn reclaim_chunk(&self, zone: Zone, idx: u32) -> Result<()> {
        let mut metadata = self.metadata.lock();
        if metadata.chunks[idx as usize].state() != ChunkState::Sealed {
            return Ok(());
        }
        let mut chunks = to_chunk_metas(&metadata.chunks);
        chunks[idx as usize].state = ChunkState::Free;
        self.free_list(zone).push(&mut chunks, idx);
        write_back(&mut metadata.chunks, &chunks);
        metadata.chunks[idx as usize].state = 0;
        Ok(())
    }

    /// Resolve a virtual offset to its physical chunk offset (§4.B
    /// `translate`).
    pub fn translate(&self, zone: Zone, offset: VirtualOffset) -> Result<ChunkOffset> {
        self.writer(zone)
            .lock()
            .translate(offset.get())
            .ok_or(StorageError::Unmapped { offset })
    }

    /// Schedule a read of `len` bytes at `chunk_offset`, returning when
    /// they've landed in a DMA-aligned buffer. Backed by
    /// `tokio::task::spawn_blocking` standing in for an io_uring read
    /// future (§4.B, Open Question).
    #[instrument(skip(self))]
    pub async fn read(&self, chunk_offset: ChunkOffset, len: usize) -> Result<Bytes> {
        if chunk_offset.offset() as u64 + len as u64 > self.chunk_size {
            return Err(StorageError::OutOfBounds { offset: chunk_offset, len });
        }
        let file = Arc::clone(&self.file);
        let abs_offset = chunk_offset.count() as u64 * self.chunk_size + chunk_offset.offset() as u64;
        let buf = tokio::task::spawn_blocking(move || {
            let mut buf = vec![0u8; len];
            file.read_exact_at(&mut buf, abs_offset)?;
            Ok::<_, std::io::Error>(buf)
        })
        .await
        .expect("blocking read task panicked")?;
        Ok(Bytes::from(buf))
    }

    pub fn chunk_count(&self) -> u32 {
        self.chunk_count
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    pub fn metadata_snapshot(&self) -> DbMetadata {
        self.metadata.lock().clone()
    }
}

fn to_chunk_metas(records: &[crate::metadata::ChunkMetaRecord]) -> Vec<ChunkMeta> {
    records
        .iter()
        .map(|c| ChunkMeta {
            insertion_count: c.insertion_count,
            zone: c.zone(),
            state: c.state(),
            next: c.next,
        })
        .collect()
}

fn write_back(records: &mut [crate::metadata::ChunkMetaRecord], chunks: &[ChunkMeta]) {
    for (record, chunk) in records.iter_mut().zip(chunks) {
        record.next = chunk.next;
    }
}
