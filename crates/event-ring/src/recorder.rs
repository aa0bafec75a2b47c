use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::control::EventRingControl;
use crate::descriptor::{DescriptorBody, EventDescriptor, USER_FIELDS};
use crate::error::{Result, RingError};
use crate::layout::align_up;
use crate::ring::RingHandle;

/// Event type reserved for the meta-event the recorder emits in place of a
/// payload it could not record (§7 "Event-ring reserve failures ... record
/// a RECORD_ERROR meta-event with the first N bytes of truncated payload
/// preserved").
pub const EVENT_TYPE_RECORD_ERROR: u16 = u16::MAX;

const RECORD_ERROR_PREFIX_LEN: usize = 64;

/// Sliding window advance granularity (§4.A). The spec leaves the exact
/// value to the implementer; we advance in increments of 1/8th of the
/// payload buffer so the window moves rarely but backlog never exceeds
/// `payload_buf_size - WINDOW_INCR` bytes.
fn window_incr(payload_buf_size: u64) -> u64 {
    (payload_buf_size / 8).max(64)
}

/// Writer handle into an event ring. Cheaply `Clone`-able; many writer
/// threads/fibers may hold one concurrently (§4.A is lock-free MPMC on the
/// write side).
#[derive(Clone)]
pub struct EventRecorder {
    pub(crate) ring: Arc<RingHandle>,
}

impl EventRecorder {
    /// Reserve and commit one event. `fill` receives up to two contiguous
    /// writable slices covering the claimed payload bytes in order (a
    /// reservation that wraps the payload buffer is split head/tail) --
    /// the gather-copy described for component A.
    ///
    /// On success, returns the committed sequence number. A payload larger
    /// than 4 GiB or larger than the ring's payload buffer is rejected and,
    /// best-effort, recorded instead as a truncated `RECORD_ERROR`
    /// meta-event (§7).
    pub fn reserve(
        &self,
        event_type: u16,
        payload_size: usize,
        user: [u64; USER_FIELDS],
        fill: impl FnOnce(&mut [u8], &mut [u8]),
    ) -> Result<u64> {
        match self.reserve_inner(event_type, payload_size, user, fill, false) {
            Ok(seqno) => Ok(seqno),
            Err(err @ (RingError::PayloadTooLarge { .. } | RingError::PayloadExceedsBuffer { .. })) => {
                self.record_error_event(event_type, payload_size);
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    fn record_error_event(&self, original_type: u16, original_size: usize) {
        let prefix_len = RECORD_ERROR_PREFIX_LEN.min(original_size);
        let user = [original_type as u64, original_size as u64, 0, 0];
        // The oversized payload itself was never produced, so there is no
        // real prefix to copy; we record zero-filled bytes of the right
        // length so readers can at least see the size that was dropped.
        let _ = self.reserve_inner(
            EVENT_TYPE_RECORD_ERROR,
            prefix_len,
            user,
            |head, tail| {
                head.fill(0);
                tail.fill(0);
            },
            true,
        );
    }

    fn reserve_inner(
        &self,
        event_type: u16,
        payload_size: usize,
        user: [u64; USER_FIELDS],
        fill: impl FnOnce(&mut [u8], &mut [u8]),
        is_meta: bool,
    ) -> Result<u64> {
        if payload_size > u32::MAX as usize {
            return Err(RingError::PayloadTooLarge { size: payload_size });
        }
        let payload_buf_size = self.ring.layout.payload_buf_size as u64;
        if !is_meta && payload_size as u64 > payload_buf_size {
            return Err(RingError::PayloadExceedsBuffer {
                size: payload_size,
                capacity: self.ring.layout.payload_buf_size,
            });
        }

        let control = self.control();
        let descriptor_mask = self.ring.layout.descriptor_capacity as u64 - 1;
        let payload_mask = payload_buf_size - 1;

        // Step 1: claim a sequence number / descriptor slot.
        let s = control.last_seqno.fetch_add(1, Ordering::AcqRel);
        let seqno = s + 1;
        let slot_idx = (s & descriptor_mask) as usize;

        // Step 2: claim payload bytes.
        let aligned_size = align_up(payload_size, 8) as u64;
        let p = control.next_payload_byte.fetch_add(aligned_size, Ordering::AcqRel);

        self.advance_window_if_needed(control, p + aligned_size, payload_buf_size);

        let descriptor = self.descriptor(slot_idx);

        // Step 3: invalidate the slot for readers, then populate, then
        // publish with a release-store, per the writer protocol.
        descriptor.seqno.store(0, Ordering::Release);

        self.write_payload(p, payload_mask, payload_buf_size, payload_size, fill);

        let body = DescriptorBody {
            event_type,
            payload_size: payload_size as u32,
            payload_buf_offset: p,
            record_epoch_nanos: epoch_nanos(),
            user,
        };
        // SAFETY: we are the exclusive writer of `slot_idx` for this
        // reservation (the slot index came from a unique fetch_add of
        // `last_seqno`), and we have already invalidated `seqno` above.
        unsafe { descriptor.write_body(body) };

        descriptor.seqno.store(seqno, Ordering::Release);
        Ok(seqno)
    }

    fn advance_window_if_needed(&self, control: &EventRingControl, end: u64, payload_buf_size: u64) {
        let incr = window_incr(payload_buf_size);
        loop {
            let current = control.buffer_window_start.load(Ordering::Acquire);
            if end <= current + payload_buf_size - incr {
                return;
            }
            let new_start = align_up(end as usize, incr as usize) as u64 - (payload_buf_size - incr);
            if control
                .buffer_window_start
                .compare_exchange(current, new_start, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return;
            }
        }
    }

    fn write_payload(
        &self,
        p: u64,
        payload_mask: u64,
        payload_buf_size: u64,
        size: usize,
        fill: impl FnOnce(&mut [u8], &mut [u8]),
    ) {
        let buf = self.payload_slice();
        if size == 0 {
            fill(&mut [], &mut []);
            return;
        }
        let start = (p & payload_mask) as usize;
        let end = start as u64 + size as u64;
        if end <= payload_buf_size {
            fill(&mut buf[start..start + size], &mut []);
        } else {
            let first_len = (payload_buf_size as usize) - start;
            let (before_start, first_piece) = buf.split_at_mut(start);
            let second_piece = &mut before_start[..size - first_len];
            fill(first_piece, second_piece);
        }
    }

    fn control(&self) -> &EventRingControl {
        // SAFETY: the control block lives for the lifetime of `self.ring`'s
        // mapping, kept alive by this `Arc`.
        unsafe { &*self.ring.control_ptr() }
    }

    fn descriptor(&self, idx: usize) -> &EventDescriptor {
        // SAFETY: idx < descriptor_capacity (masked above); the descriptor
        // array lives for the lifetime of the mapping.
        unsafe { &*self.ring.descriptor_ptr(idx) }
    }

    fn payload_slice(&self) -> &mut [u8] {
        // SAFETY: each reservation's byte range, computed from a unique
        // fetch_add of `next_payload_byte`, never overlaps a concurrent
        // reservation's range.
        unsafe { std::slice::from_raw_parts_mut(self.ring.payload_ptr(), self.ring.layout.payload_buf_size) }
    }
}

fn epoch_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}
