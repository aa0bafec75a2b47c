use std::path::Path;
use std::sync::Arc;

use crate::control::EventRingControl;
use crate::descriptor::EventDescriptor;
use crate::error::{Result, RingError};
use crate::iterator::EventIterator;
use crate::layout::{EventRingHeader, RingLayout};
use crate::recorder::EventRecorder;
use crate::segment::{validate_path, RingSegment};

/// A mapped event ring: header, control block, descriptor array, and
/// payload buffer in one contiguous file-backed mapping (§3, §6).
pub struct RingHandle {
    segment: RingSegment,
    pub(crate) layout: RingLayout,
}

// SAFETY: all shared mutable state within the mapping is either a plain
// atomic (`EventRingControl`, `EventDescriptor::seqno`) or a
// `UnsafeCell<DescriptorBody>` accessed only under that atomic's
// happens-before guarantees (§4.A).
unsafe impl Send for RingHandle {}
unsafe impl Sync for RingHandle {}

impl RingHandle {
    pub(crate) fn control_ptr(&self) -> *mut EventRingControl {
        // SAFETY: `layout.control_offset` was computed to fit within the
        // mapping's `total_size`, which matches `segment.len()`.
        unsafe { self.segment.as_ptr().add(self.layout.control_offset) as *mut EventRingControl }
    }

    pub(crate) fn descriptor_ptr(&self, idx: usize) -> *mut EventDescriptor {
        debug_assert!(idx < self.layout.descriptor_capacity);
        let offset = self.layout.descriptors_offset + idx * std::mem::size_of::<EventDescriptor>();
        // SAFETY: `idx < descriptor_capacity`, so `offset` stays within the
        // descriptor region computed in `RingLayout::compute`.
        unsafe { self.segment.as_ptr().add(offset) as *mut EventDescriptor }
    }

    pub(crate) fn payload_ptr(&self) -> *mut u8 {
        // SAFETY: `layout.payload_offset` was computed to leave exactly
        // `payload_buf_size` bytes before `total_size`.
        unsafe { self.segment.as_ptr().add(self.layout.payload_offset) }
    }

    fn header(&self) -> &EventRingHeader {
        // SAFETY: the header occupies `layout.header_offset..` and is
        // written by `create()` before any reader/writer is constructed.
        unsafe { &*(self.segment.as_ptr().add(self.layout.header_offset) as *const EventRingHeader) }
    }

    fn header_mut(&mut self) -> &mut EventRingHeader {
        unsafe { &mut *(self.segment.as_ptr().add(self.layout.header_offset) as *mut EventRingHeader) }
    }

    fn zero_descriptors(&mut self) {
        for idx in 0..self.layout.descriptor_capacity {
            // SAFETY: exclusive access -- this runs only during `create()`,
            // before the handle is shared with any writer/reader.
            unsafe {
                self.descriptor_ptr(idx).write(EventDescriptor::empty());
            }
        }
    }

    fn zero_control(&mut self) {
        unsafe {
            self.control_ptr().write(EventRingControl::new());
        }
    }
}

/// A handle to an event ring, owning the mapping and exposing writer and
/// reader construction, per §4.A.
pub struct EventRing {
    inner: Arc<RingHandle>,
}

impl EventRing {
    /// Create a fresh ring file at `path` with `2^descriptor_count_log2`
    /// descriptor slots and a `2^payload_buf_log2`-byte payload buffer.
    pub fn create(
        path: &Path,
        content_type: u64,
        schema_hash: u64,
        descriptor_count_log2: u8,
        payload_buf_log2: u8,
    ) -> Result<Self> {
        validate_path(path)?;
        let layout = RingLayout::compute(descriptor_count_log2, payload_buf_log2)?;
        let segment = RingSegment::create(path, layout.total_size)?;
        let mut handle = RingHandle { segment, layout };

        *handle.header_mut() = EventRingHeader::new(
            content_type,
            schema_hash,
            descriptor_count_log2,
            payload_buf_log2,
        );
        handle.zero_control();
        handle.zero_descriptors();

        Ok(Self {
            inner: Arc::new(handle),
        })
    }

    /// Open an existing ring file at `path`, validating the header matches
    /// the expected content type and schema.
    pub fn open(path: &Path, content_type: u64, schema_hash: u64) -> Result<Self> {
        validate_path(path)?;
        // We don't know the layout until we've read the header, so probe
        // the file size first via a minimal mapping of the header alone is
        // awkward with a fixed-size file-backed mmap; instead we read the
        // header with a two-phase open: map a conservative minimum, read
        // the log2 fields, then remap at the true size.
        let probe = RingSegment::open(path, std::fs::metadata(path).map_err(RingError::Io)?.len() as usize)?;
        let probe_header =
            unsafe { &*(probe.as_ptr() as *const EventRingHeader) };
        if probe_header.magic != crate::layout::RING_MAGIC
            || probe_header.content_type != content_type
            || probe_header.schema_hash != schema_hash
        {
            return Err(RingError::HeaderMismatch);
        }
        let layout = RingLayout::compute(probe_header.descriptor_count_log2, probe_header.payload_buf_log2)?;
        drop(probe);

        let segment = RingSegment::open(path, layout.total_size)?;
        let handle = RingHandle { segment, layout };
        if handle.header().magic != crate::layout::RING_MAGIC {
            return Err(RingError::HeaderMismatch);
        }

        Ok(Self {
            inner: Arc::new(handle),
        })
    }

    /// Construct a writer handle. Cheap, `Clone`-able, safe to share across
    /// any number of concurrent writer threads/fibers.
    pub fn recorder(&self) -> EventRecorder {
        EventRecorder {
            ring: Arc::clone(&self.inner),
        }
    }

    /// Construct a reader positioned at `start_seqno` (pass `0` to start
    /// from the beginning of the ring's remaining history).
    pub fn iterator_from(&self, start_seqno: u64) -> EventIterator {
        EventIterator::new(Arc::clone(&self.inner), start_seqno)
    }

    /// Construct a reader positioned at the latest available event, per
    /// §4.A's gap-recovery `reset()` path.
    pub fn iterator_at_latest(&self) -> EventIterator {
        let mut it = EventIterator::new(Arc::clone(&self.inner), 0);
        it.reset();
        it
    }

    pub fn descriptor_capacity(&self) -> usize {
        self.inner.layout.descriptor_capacity
    }

    pub fn payload_buf_size(&self) -> usize {
        self.inner.layout.payload_buf_size
    }
}
