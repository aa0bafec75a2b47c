use std::sync::atomic::AtomicU64;

/// Ring-wide atomically-updated counters, per §3 "Event ring control".
///
/// `last_seqno` is the highest sequence number any writer has reserved.
/// `next_payload_byte` is the next free offset into the payload buffer
/// (monotonic, modulo `payload_buf_size` when used as an index).
/// `buffer_window_start` is the oldest payload byte offset a reader is
/// still guaranteed to find intact.
#[repr(C, align(64))]
pub struct EventRingControl {
    pub last_seqno: AtomicU64,
    pub next_payload_byte: AtomicU64,
    pub buffer_window_start: AtomicU64,
}

impl EventRingControl {
    pub const fn new() -> Self {
        Self {
            last_seqno: AtomicU64::new(0),
            next_payload_byte: AtomicU64::new(0),
            buffer_window_start: AtomicU64::new(0),
        }
    }
}

impl Default for EventRingControl {
    fn default() -> Self {
        Self::new()
    }
}
