use std::ffi::CString;
use std::fs::OpenOptions;
use std::io;
use std::os::unix::io::AsRawFd;
use std::path::Path;
use std::ptr;

use crate::{Result, RingError};

/// A file-backed memory mapping holding the whole event ring (header,
/// control block, descriptor array, and payload buffer). Unmapped on drop.
///
/// Mirrors the POSIX shm segment wrapper used for shared-memory transports
/// elsewhere in the ecosystem, but backs onto a regular file path rather
/// than a `shm_open` name, matching §6's "Event ring file format".
pub struct RingSegment {
    ptr: *mut u8,
    len: usize,
}

// SAFETY: the mapped region is shared across processes/threads by design;
// every field inside it that multiple writers/readers touch concurrently is
// an atomic, per the protocol in §4.A.
unsafe impl Send for RingSegment {}
unsafe impl Sync for RingSegment {}

impl RingSegment {
    /// Create a new ring file of exactly `len` bytes and map it read-write.
    pub fn create(path: &Path, len: usize) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(RingError::Io)?;
        file.set_len(len as u64).map_err(RingError::Io)?;
        Self::map(file.as_raw_fd(), len)
    }

    /// Map an existing ring file read-write; `len` must match the size the
    /// writer created it with.
    pub fn open(path: &Path, len: usize) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(RingError::Io)?;
        let actual = file.metadata().map_err(RingError::Io)?.len();
        if actual != len as u64 {
            return Err(RingError::SizeMismatch {
                expected: len,
                actual: actual as usize,
            });
        }
        Self::map(file.as_raw_fd(), len)
    }

    fn map(fd: i32, len: usize) -> Result<Self> {
        // SAFETY: fd is a valid, open file descriptor sized to at least
        // `len` bytes (ftruncate'd by create(), checked by open()). The
        // mapping is dropped by munmap in our Drop impl, and MAP_SHARED
        // makes writes visible to every other mapper of the same file.
        let ptr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(RingError::Io(io::Error::last_os_error()));
        }
        Ok(Self {
            ptr: ptr as *mut u8,
            len,
        })
    }

    #[inline]
    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Drop for RingSegment {
    fn drop(&mut self) {
        // SAFETY: `self.ptr`/`self.len` are exactly the mapping returned by
        // the successful mmap() call in `map`, and this is the only Drop
        // that will ever run for this mapping.
        unsafe {
            libc::munmap(self.ptr as *mut libc::c_void, self.len);
        }
    }
}

/// Validates a ring file path has no embedded NUL, matching the convention
/// POSIX shared-memory names elsewhere in this codebase enforce.
pub(crate) fn validate_path(path: &Path) -> Result<()> {
    CString::new(path.to_string_lossy().as_bytes())
        .map(|_| ())
        .map_err(|_| RingError::InvalidPath)
}
