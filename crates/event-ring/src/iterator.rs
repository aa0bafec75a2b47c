use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use crate::control::EventRingControl;
use crate::descriptor::{EventDescriptor, EventDescriptorSnapshot};
use crate::ring::RingHandle;

/// Bound on how many slots `reset()` will scan backward while waiting for a
/// torn writer to finish (§4.A "Gap recovery").
pub const MAX_SYNC_SPIN: u32 = 1000;

/// Result of trying to read the next (or current) event, mirroring
/// `monad_event_iter_result` in the original event ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryReadResult {
    /// Event read and the iterator advanced (for `try_next`).
    Success(EventDescriptorSnapshot),
    /// No event is available yet at this position.
    NotReady,
    /// The requested sequence number has been overwritten; the iterator
    /// did not advance. Callers should `reset()`.
    Gap,
}

/// A single reader's cursor into an event ring. Readers never mutate shared
/// state other than their own local `read_last_seqno`; any number of
/// readers may coexist.
pub struct EventIterator {
    ring: Arc<RingHandle>,
    read_last_seqno: u64,
}

impl EventIterator {
    pub(crate) fn new(ring: Arc<RingHandle>, start_seqno: u64) -> Self {
        Self {
            ring,
            read_last_seqno: start_seqno,
        }
    }

    fn control(&self) -> &EventRingControl {
        // SAFETY: the control block lives for the lifetime of the mapping,
        // kept alive by `self.ring`.
        unsafe { &*self.ring.control_ptr() }
    }

    fn descriptor(&self, idx: usize) -> &EventDescriptor {
        // SAFETY: idx is always masked to `descriptor_capacity` by callers.
        unsafe { &*self.ring.descriptor_ptr(idx) }
    }

    fn descriptor_mask(&self) -> u64 {
        self.ring.layout.descriptor_capacity as u64 - 1
    }

    /// Try to copy the descriptor at sequence number `r+1` (slot `r mod
    /// capacity`), per §4.A's reader try-copy protocol.
    fn try_copy_at(&self, r: u64) -> TryReadResult {
        let slot = (r & self.descriptor_mask()) as usize;
        let descriptor = self.descriptor(slot);
        let expected = r + 1;

        let sn = descriptor.seqno.load(Ordering::Acquire);
        if sn == expected {
            // SAFETY: `sn == expected` confirms the writer's release-store
            // has happened-before this acquire-load; the body is valid to
            // read until we re-check `seqno` below.
            let body = unsafe { descriptor.read_body() };
            let sn2 = descriptor.seqno.load(Ordering::Acquire);
            if sn2 == expected {
                return TryReadResult::Success(EventDescriptorSnapshot::from_parts(expected, body));
            }
            return TryReadResult::Gap;
        }

        let last_seqno = self.control().last_seqno.load(Ordering::Acquire);
        if sn < expected && sn < last_seqno {
            return TryReadResult::NotReady;
        }
        TryReadResult::Gap
    }

    /// Copy the descriptor at the current iteration point without
    /// advancing.
    pub fn try_copy(&self) -> TryReadResult {
        self.try_copy_at(self.read_last_seqno)
    }

    /// Copy the next event descriptor and advance the iterator if
    /// available.
    pub fn try_next(&mut self) -> TryReadResult {
        let result = self.try_copy_at(self.read_last_seqno);
        if let TryReadResult::Success(_) = result {
            self.read_last_seqno += 1;
        }
        result
    }

    /// Check that a copied descriptor's payload still lies within the
    /// current sliding window, per §4.A's "Payload integrity check".
    pub fn payload_intact(&self, descriptor: &EventDescriptorSnapshot) -> bool {
        let window_start = self.control().buffer_window_start.load(Ordering::Acquire);
        let payload_buf_size = self.ring.layout.payload_buf_size as u64;
        if descriptor.payload_buf_offset < window_start {
            return false;
        }
        let relative = descriptor.payload_buf_offset - window_start;
        relative <= payload_buf_size.saturating_sub(descriptor.payload_size as u64)
    }

    /// Read the payload bytes for a descriptor that passed
    /// [`Self::payload_intact`]. Returns `None` if the window has since
    /// moved past the payload (the narrow race noted in §9's Open
    /// Questions; we resolve it as GAP, i.e. `None`, not NOT_READY).
    pub fn read_payload(&self, descriptor: &EventDescriptorSnapshot) -> Option<Vec<u8>> {
        if !self.payload_intact(descriptor) {
            return None;
        }
        let payload_buf_size = self.ring.layout.payload_buf_size as u64;
        let mask = payload_buf_size - 1;
        let start = (descriptor.payload_buf_offset & mask) as usize;
        let size = descriptor.payload_size as usize;
        // SAFETY: the payload buffer spans the whole mapping's payload
        // region for the lifetime of `self.ring`; `start`/`size` are
        // masked/bounded above.
        let buf = unsafe {
            std::slice::from_raw_parts(self.ring.payload_ptr(), self.ring.layout.payload_buf_size)
        };
        let end = start + size;
        let mut out = Vec::with_capacity(size);
        if end <= buf.len() {
            out.extend_from_slice(&buf[start..end]);
        } else {
            let first_len = buf.len() - start;
            out.extend_from_slice(&buf[start..]);
            out.extend_from_slice(&buf[..size - first_len]);
        }
        if !self.payload_intact(descriptor) {
            return None;
        }
        Some(out)
    }

    /// Reset the iterator to the latest produced event, scanning backward
    /// from `last_seqno` to find a slot whose descriptor has finished
    /// committing (§4.A "Gap recovery"). Returns the sequence number the
    /// iterator now points just past.
    pub fn reset(&mut self) -> u64 {
        let mut target = self.control().last_seqno.load(Ordering::Acquire);
        let mut spins = 0u32;
        while target > 0 && spins < MAX_SYNC_SPIN {
            let slot = ((target - 1) & self.descriptor_mask()) as usize;
            let sn = self.descriptor(slot).seqno.load(Ordering::Acquire);
            if sn == target {
                self.read_last_seqno = target;
                return target;
            }
            // The writer that owns `target` died mid-commit (or hasn't
            // committed yet); try the previous slot.
            target -= 1;
            spins += 1;
            if spins % 16 == 0 {
                std::thread::sleep(Duration::from_micros(1));
            } else {
                std::hint::spin_loop();
            }
        }
        self.read_last_seqno = target;
        target
    }

    pub fn read_last_seqno(&self) -> u64 {
        self.read_last_seqno
    }
}
