use std::cell::UnsafeCell;
use std::sync::atomic::AtomicU64;

/// Number of free-form `u64` fields carried by every descriptor; used by
/// the execution pipeline for flow-id/txn-index tagging (§4.D.6).
pub const USER_FIELDS: usize = 4;

/// The non-atomic portion of a descriptor. Written by the reserving writer
/// strictly between the two `seqno` release-stores in §4.A's writer
/// protocol, and only ever read by a reader after confirming (via an
/// acquire-load of `seqno`) that the write has completed — so the plain
/// field accesses below never race in practice, even though the type
/// system can't prove it. That's exactly what `UnsafeCell` is for.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct DescriptorBody {
    pub event_type: u16,
    pub payload_size: u32,
    pub payload_buf_offset: u64,
    pub record_epoch_nanos: u64,
    pub user: [u64; USER_FIELDS],
}

impl DescriptorBody {
    pub const EMPTY: Self = Self {
        event_type: 0,
        payload_size: 0,
        payload_buf_offset: 0,
        record_epoch_nanos: 0,
        user: [0; USER_FIELDS],
    };
}

/// One fixed-size slot in the descriptor array, per §3 "Event descriptor".
#[repr(C, align(64))]
pub struct EventDescriptor {
    pub seqno: AtomicU64,
    body: UnsafeCell<DescriptorBody>,
}

// SAFETY: every access to `body` is bracketed by an atomic operation on
// `seqno` that establishes happens-before (writer: release-store after
// populating; reader: acquire-load before reading, re-checked after).
unsafe impl Sync for EventDescriptor {}

impl EventDescriptor {
    pub const fn empty() -> Self {
        Self {
            seqno: AtomicU64::new(0),
            body: UnsafeCell::new(DescriptorBody::EMPTY),
        }
    }

    /// Overwrite the body. Caller must only invoke this after having
    /// stored `0` into `seqno` (invalidating the slot for readers) and
    /// before the final release-store of the real sequence number.
    ///
    /// # Safety
    /// The caller must hold exclusive ownership of this slot for the
    /// duration of the call (guaranteed by `last_seqno`'s atomic
    /// fetch-and-add handing out each slot index to exactly one writer at
    /// a time).
    pub unsafe fn write_body(&self, body: DescriptorBody) {
        *self.body.get() = body;
    }

    /// Copy the body out. Caller must only trust the result after
    /// re-checking `seqno` per the reader protocol in §4.A.
    ///
    /// # Safety
    /// The caller must not treat the returned value as valid until the
    /// bracketing `seqno` check has been performed.
    pub unsafe fn read_body(&self) -> DescriptorBody {
        *self.body.get()
    }
}

/// A plain-data snapshot of a descriptor, safe to hand to callers outside
/// the mapped region (readers copy into this, never a raw reference).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventDescriptorSnapshot {
    pub seqno: u64,
    pub event_type: u16,
    pub payload_size: u32,
    pub payload_buf_offset: u64,
    pub record_epoch_nanos: u64,
    pub user: [u64; USER_FIELDS],
}

impl EventDescriptorSnapshot {
    pub(crate) fn from_parts(seqno: u64, body: DescriptorBody) -> Self {
        Self {
            seqno,
            event_type: body.event_type,
            payload_size: body.payload_size,
            payload_buf_offset: body.payload_buf_offset,
            record_epoch_nanos: body.record_epoch_nanos,
            user: body.user,
        }
    }
}
