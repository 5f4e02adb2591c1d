//! Reference-counted byte regions.
//!
//! A [`Buffer`] is a window `(offset, len)` into a shared [`Storage`]. Cloning a
//! buffer or taking a [`Buffer::view`] never copies bytes; the storage lives as
//! long as any window onto it. Writes are only possible through an exclusively
//! owned, heap-allocated storage; every other mutation request goes through
//! copy-on-write ([`Buffer::make_mut`], [`Buffer::resize`]).

use crate::error::FrameError;
use crate::stype::Pod;
use anyhow::{Context, Result};
use log::trace;
use memmap2::Mmap;
use std::fmt;
use std::fs::File;
use std::mem::{align_of, size_of};
use std::path::Path;
use std::sync::{Arc, Mutex};

type ReleaseFn = Box<dyn FnOnce() + Send>;

enum Storage {
    /// Heap memory, kept as `u64` words so typed views of up to 8-byte
    /// elements are always aligned.
    Owned { words: Vec<u64>, len: usize },
    /// Read-only file mapping.
    Mmap(Mmap),
    /// Memory owned by someone else; `release` runs when the last reference drops.
    External {
        ptr: *const u8,
        len: usize,
        release: Mutex<Option<ReleaseFn>>,
    },
}

// SAFETY: external memory is never written through this crate, and the release
// callback is only invoked once, from `Drop`, behind a mutex.
unsafe impl Send for Storage {}
unsafe impl Sync for Storage {}

impl Storage {
    fn bytes(&self) -> &[u8] {
        match self {
            Storage::Owned { words, len } => {
                // SAFETY: `words` holds at least `len` initialised bytes.
                unsafe { std::slice::from_raw_parts(words.as_ptr().cast::<u8>(), *len) }
            }
            Storage::Mmap(m) => &m[..],
            Storage::External { ptr, len, .. } => {
                if *len == 0 {
                    &[]
                } else {
                    // SAFETY: the producer of external memory guarantees `len`
                    // readable bytes at `ptr` until `release` runs.
                    unsafe { std::slice::from_raw_parts(*ptr, *len) }
                }
            }
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Storage::Owned { .. } => "mem",
            Storage::Mmap(_) => "mmap",
            Storage::External { .. } => "external",
        }
    }
}

impl Drop for Storage {
    fn drop(&mut self) {
        if let Storage::External { release, .. } = self {
            let release = match release.get_mut() {
                Ok(r) => r.take(),
                Err(poisoned) => poisoned.into_inner().take(),
            };
            if let Some(f) = release {
                f();
            }
        }
    }
}

#[derive(Clone)]
pub struct Buffer {
    storage: Arc<Storage>,
    offset: usize,
    len: usize,
}

impl Buffer {
    /// Allocate `size` zeroed bytes.
    #[must_use]
    pub fn mem(size: usize) -> Self {
        Self {
            storage: Arc::new(Storage::Owned {
                words: vec![0u64; size.div_ceil(8)],
                len: size,
            }),
            offset: 0,
            len: size,
        }
    }

    /// Copy `bytes` into a fresh heap buffer.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut buf = Self::mem(bytes.len());
        buf.make_mut().copy_from_slice(bytes);
        buf
    }

    /// Copy a typed vector into a fresh heap buffer.
    #[must_use]
    pub fn from_vec<T: Pod>(values: Vec<T>) -> Self {
        Self::from_bytes(pod_bytes(&values))
    }

    /// Map a file read-only.
    ///
    /// # Errors
    /// I/O error if the file is missing or cannot be mapped.
    pub fn mmap(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(FrameError::from)
            .with_context(|| format!("open {}", path.display()))?;
        let size = file
            .metadata()
            .map_err(FrameError::from)
            .with_context(|| format!("stat {}", path.display()))?
            .len();
        if size == 0 {
            // Zero-length mappings are rejected by some platforms.
            return Ok(Self::mem(0));
        }
        // SAFETY: the mapping is read-only; concurrent external modification of
        // the file is outside of what this crate can guard against.
        let map = unsafe { Mmap::map(&file) }
            .map_err(FrameError::from)
            .with_context(|| format!("mmap {}", path.display()))?;
        let len = map.len();
        Ok(Self {
            storage: Arc::new(Storage::Mmap(map)),
            offset: 0,
            len,
        })
    }

    /// Map a file whose size has been declared by some other metadata.
    ///
    /// # Errors
    /// I/O error if the file cannot be mapped or its size differs from `expected`.
    pub fn mmap_with_size(path: impl AsRef<Path>, expected: usize) -> Result<Self> {
        let path = path.as_ref();
        let buf = Self::mmap(path)?;
        if buf.size() != expected {
            return Err(FrameError::io(format!(
                "file {} has size {} bytes, but {expected} bytes were declared",
                path.display(),
                buf.size()
            ))
            .into());
        }
        Ok(buf)
    }

    /// Wrap foreign memory.
    ///
    /// # Safety
    /// `ptr` must point to `len` readable bytes that stay valid and unmodified
    /// until `release` is called. `release` runs exactly once, when the last
    /// buffer referencing this memory is dropped.
    pub unsafe fn external(
        ptr: *const u8,
        len: usize,
        release: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            storage: Arc::new(Storage::External {
                ptr,
                len,
                release: Mutex::new(Some(Box::new(release))),
            }),
            offset: 0,
            len,
        }
    }

    /// Zero-copy sub-view of `size` bytes starting at `offset` within `parent`.
    ///
    /// # Errors
    /// Value error if the range is outside of the parent.
    pub fn view(parent: &Buffer, size: usize, offset: usize) -> Result<Self> {
        let end = offset.checked_add(size);
        if end.is_none_or(|e| e > parent.len) {
            return Err(FrameError::value(format!(
                "view [{offset}, {offset}+{size}) is outside of a buffer of {} bytes",
                parent.len
            ))
            .into());
        }
        Ok(Self {
            storage: Arc::clone(&parent.storage),
            offset: parent.offset + offset,
            len: size,
        })
    }

    #[inline]
    #[must_use]
    pub fn size(&self) -> usize {
        self.len
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.storage.bytes()[self.offset..self.offset + self.len]
    }

    /// Whether the bytes can be viewed as a slice of `T`.
    #[must_use]
    pub fn is_aligned_for<T: Pod>(&self) -> bool {
        let bytes = self.as_bytes();
        bytes.as_ptr().align_offset(align_of::<T>()) == 0 || bytes.is_empty()
    }

    /// View the bytes as a slice of `T`. Trailing bytes that do not form a
    /// whole element are ignored.
    ///
    /// Columns validate alignment once at construction (see
    /// [`Buffer::is_aligned_for`]).
    #[inline]
    #[must_use]
    pub fn as_slice<T: Pod>(&self) -> &[T] {
        let bytes = self.as_bytes();
        let n = bytes.len() / size_of::<T>();
        if n == 0 {
            return &[];
        }
        assert!(
            bytes.as_ptr().align_offset(align_of::<T>()) == 0,
            "misaligned {} buffer",
            std::any::type_name::<T>()
        );
        // SAFETY: alignment checked above, `T: Pod` accepts any bit pattern,
        // and `n * size_of::<T>() <= bytes.len()`.
        unsafe { std::slice::from_raw_parts(bytes.as_ptr().cast::<T>(), n) }
    }

    #[must_use]
    pub fn to_vec<T: Pod>(&self) -> Vec<T> {
        self.as_slice::<T>().to_vec()
    }

    #[must_use]
    pub fn is_mmap(&self) -> bool {
        matches!(*self.storage, Storage::Mmap(_))
    }

    #[must_use]
    pub fn is_external(&self) -> bool {
        matches!(*self.storage, Storage::External { .. })
    }

    /// True when no other buffer shares this storage.
    #[must_use]
    pub fn is_exclusive(&self) -> bool {
        Arc::strong_count(&self.storage) == 1
    }

    /// True when [`Buffer::get_mut`] would succeed.
    #[must_use]
    pub fn is_mutable(&self) -> bool {
        self.is_exclusive() && matches!(*self.storage, Storage::Owned { .. })
    }

    /// Mutable access without copying; `None` if the storage is shared,
    /// mapped, or external.
    pub fn get_mut(&mut self) -> Option<&mut [u8]> {
        let (offset, len) = (self.offset, self.len);
        match Arc::get_mut(&mut self.storage)? {
            Storage::Owned { words, .. } => {
                // SAFETY: `words` covers the whole window; `u64 -> u8` is
                // always a valid reinterpretation.
                let all = unsafe {
                    std::slice::from_raw_parts_mut(words.as_mut_ptr().cast::<u8>(), words.len() * 8)
                };
                Some(&mut all[offset..offset + len])
            }
            Storage::Mmap(_) | Storage::External { .. } => None,
        }
    }

    /// Mutable access, copying the window into fresh memory first when the
    /// storage is not exclusively owned.
    pub fn make_mut(&mut self) -> &mut [u8] {
        if !self.is_mutable() {
            trace!(
                "copy-on-write of a {} byte {} buffer",
                self.len,
                self.storage.kind()
            );
            let mut fresh = Self::mem(self.len);
            if let Some(dst) = fresh.get_mut() {
                dst.copy_from_slice(self.as_bytes());
            }
            *self = fresh;
        }
        match self.get_mut() {
            Some(bytes) => bytes,
            None => unreachable!("freshly allocated buffer must be mutable"),
        }
    }

    /// Typed variant of [`Buffer::make_mut`].
    pub fn make_mut_slice<T: Pod>(&mut self) -> &mut [T] {
        let bytes = self.make_mut();
        let n = bytes.len() / size_of::<T>();
        if n == 0 {
            return &mut [];
        }
        assert!(bytes.as_ptr().align_offset(align_of::<T>()) == 0);
        // SAFETY: see `as_slice`; the buffer is exclusively borrowed.
        unsafe { std::slice::from_raw_parts_mut(bytes.as_mut_ptr().cast::<T>(), n) }
    }

    /// Change the size of the buffer.
    ///
    /// Bytes up to `min(old, new)` are preserved. An exclusively owned heap
    /// buffer is resized in place; shared, mapped or external buffers are
    /// copied first.
    pub fn resize(&mut self, newsize: usize) {
        let full_window = self.offset == 0
            && matches!(&*self.storage, Storage::Owned { len, .. } if *len == self.len);
        if self.is_mutable() && full_window {
            if let Some(Storage::Owned { words, len }) = Arc::get_mut(&mut self.storage) {
                // Bytes past the old length may hold data from before a shrink.
                let old = *len;
                if newsize > old {
                    let tail = old % 8;
                    if tail != 0
                        && let Some(w) = words.get_mut(old / 8)
                    {
                        let mut bytes = w.to_ne_bytes();
                        bytes[tail..].fill(0);
                        *w = u64::from_ne_bytes(bytes);
                    }
                }
                words.resize(newsize.div_ceil(8), 0);
                *len = newsize;
                self.len = newsize;
                return;
            }
        }
        trace!(
            "copy-on-write resize of a {} byte {} buffer to {newsize}",
            self.len,
            self.storage.kind()
        );
        let mut fresh = Self::mem(newsize);
        let keep = newsize.min(self.len);
        if let Some(dst) = fresh.get_mut() {
            dst[..keep].copy_from_slice(&self.as_bytes()[..keep]);
        }
        *self = fresh;
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("kind", &self.storage.kind())
            .field("offset", &self.offset)
            .field("len", &self.len)
            .field("refs", &Arc::strong_count(&self.storage))
            .finish()
    }
}

impl Default for Buffer {
    fn default() -> Self {
        Self::mem(0)
    }
}

/// Reinterpret a typed slice as bytes.
#[inline]
#[must_use]
pub fn pod_bytes<T: Pod>(values: &[T]) -> &[u8] {
    // SAFETY: `T: Pod` has no padding, so every byte is initialised.
    unsafe { std::slice::from_raw_parts(values.as_ptr().cast::<u8>(), std::mem::size_of_val(values)) }
}
