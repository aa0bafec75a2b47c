//! Lock-free, shared-memory, multi-producer single-segment event ring
//! (component A). Writers append fixed-size descriptors plus variable-size
//! payloads without ever blocking; any number of readers iterate the ring
//! concurrently, detecting and recovering from being lapped by writers.

mod control;
mod descriptor;
mod error;
mod iterator;
mod layout;
mod recorder;
mod ring;
mod segment;

pub use control::EventRingControl;
pub use descriptor::{DescriptorBody, EventDescriptor, EventDescriptorSnapshot, USER_FIELDS};
pub use error::{Result, RingError};
pub use iterator::{EventIterator, TryReadResult, MAX_SYNC_SPIN};
pub use layout::{EventRingHeader, RingLayout, RING_MAGIC};
pub use recorder::{EventRecorder, EVENT_TYPE_RECORD_ERROR};
pub use ring::EventRing;

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn ring(dir: &std::path::Path) -> EventRing {
        EventRing::create(&dir.join("ring.bin"), 1, 2, 12, 12).unwrap()
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempdir().unwrap();
        let ring = ring(dir.path());
        let recorder = ring.recorder();
        let seqno = recorder
            .reserve(7, 5, [1, 2, 3, 4], |head, tail| {
                head.copy_from_slice(b"hello");
                assert!(tail.is_empty());
            })
            .unwrap();
        assert_eq!(seqno, 1);

        let mut it = ring.iterator_from(0);
        match it.try_next() {
            TryReadResult::Success(snap) => {
                assert_eq!(snap.seqno, 1);
                assert_eq!(snap.event_type, 7);
                assert_eq!(snap.payload_size, 5);
                let payload = it.read_payload(&snap).unwrap();
                assert_eq!(&payload, b"hello");
            }
            other => panic!("expected Success, got {other:?}"),
        }
    }

    #[test]
    fn try_next_is_not_ready_with_no_events() {
        let dir = tempdir().unwrap();
        let ring = ring(dir.path());
        let mut it = ring.iterator_from(0);
        assert_eq!(it.try_next(), TryReadResult::NotReady);
    }

    #[test]
    fn lapped_reader_reports_gap() {
        let dir = tempdir().unwrap();
        // Small descriptor ring so a handful of writes laps a stale reader.
        let ring = EventRing::create(&dir.path().join("ring.bin"), 1, 2, 12, 12).unwrap();
        let recorder = ring.recorder();
        let mut it = ring.iterator_from(0);

        for i in 0..ring.descriptor_capacity() as u64 + 1 {
            recorder
                .reserve(1, 8, [i, 0, 0, 0], |head, _| head.copy_from_slice(&i.to_le_bytes()))
                .unwrap();
        }

        // The reader's cursor (seqno 1) has long since been overwritten.
        assert_eq!(it.try_next(), TryReadResult::Gap);
    }

    #[test]
    fn reset_lands_on_latest_committed_event() {
        let dir = tempdir().unwrap();
        let ring = ring(dir.path());
        let recorder = ring.recorder();
        for i in 0..5u64 {
            recorder.reserve(1, 8, [i, 0, 0, 0], |head, _| head.copy_from_slice(&i.to_le_bytes())).unwrap();
        }
        let mut it = ring.iterator_at_latest();
        assert_eq!(it.read_last_seqno(), 5);
    }

    #[test]
    fn oversized_payload_falls_back_to_record_error() {
        let dir = tempdir().unwrap();
        let ring = ring(dir.path());
        let recorder = ring.recorder();
        let too_big = ring.payload_buf_size() + 1;
        let err = recorder
            .reserve(3, too_big, [0; 4], |_, _| {})
            .unwrap_err();
        assert!(matches!(err, RingError::PayloadExceedsBuffer { .. }));

        let mut it = ring.iterator_from(0);
        match it.try_next() {
            TryReadResult::Success(snap) => assert_eq!(snap.event_type, EVENT_TYPE_RECORD_ERROR),
            other => panic!("expected Success, got {other:?}"),
        }
    }

    #[test]
    fn reopen_validates_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ring.bin");
        let ring = EventRing::create(&path, 1, 2, 12, 12).unwrap();
        ring.recorder().reserve(1, 4, [0; 4], |h, _| h.copy_from_slice(b"abcd")).unwrap();
        drop(ring);

        let reopened = EventRing::open(&path, 1, 2).unwrap();
        let mut it = reopened.iterator_from(0);
        assert!(matches!(it.try_next(), TryReadResult::Success(_)));

        assert!(matches!(EventRing::open(&path, 1, 99), Err(RingError::HeaderMismatch)));
    }
}
