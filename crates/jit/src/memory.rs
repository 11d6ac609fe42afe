//! Executable memory and the native-target capability seam.
//!
//! Code is copied into a fresh read-write mapping, which is then flipped
//! to read-execute before anything runs (W^X). The mapping is released
//! when its owner drops.

use crate::error::JitError;
use std::ptr::{self, NonNull};

// =============================================================================
// Platform-specific allocation
// =============================================================================

#[cfg(unix)]
mod platform {
    use std::ptr;

    /// Allocate memory with read-write permissions. Null on failure.
    pub unsafe fn alloc_rw(size: usize) -> *mut u8 {
        let ptr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            ptr::null_mut()
        } else {
            ptr as *mut u8
        }
    }

    /// Make memory executable (and read-only).
    pub unsafe fn make_executable(ptr: *mut u8, size: usize) -> bool {
        unsafe { libc::mprotect(ptr as *mut _, size, libc::PROT_READ | libc::PROT_EXEC) == 0 }
    }

    pub unsafe fn free(ptr: *mut u8, size: usize) {
        unsafe {
            libc::munmap(ptr as *mut _, size);
        }
    }

    pub fn page_size() -> usize {
        let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        if size > 0 {
            size as usize
        } else {
            4096
        }
    }
}

#[cfg(not(unix))]
mod platform {
    pub unsafe fn alloc_rw(_size: usize) -> *mut u8 {
        std::ptr::null_mut()
    }

    pub unsafe fn make_executable(_ptr: *mut u8, _size: usize) -> bool {
        false
    }

    pub unsafe fn free(_ptr: *mut u8, _size: usize) {}

    pub fn page_size() -> usize {
        4096
    }
}

// =============================================================================
// Executable memory
// =============================================================================

/// A read-execute mapping holding a copy of some machine code.
#[derive(Debug)]
pub struct ExecutableMemory {
    ptr: NonNull<u8>,
    /// Mapped size, a whole number of pages.
    size: usize,
    len: usize,
}

impl ExecutableMemory {
    /// Map `code` as executable.
    pub fn new(code: &[u8]) -> Result<Self, JitError> {
        let page = platform::page_size();
        let size = code.len().max(1).div_ceil(page) * page;

        let raw = unsafe { platform::alloc_rw(size) };
        let ptr = NonNull::new(raw).ok_or(JitError::MapFailed { size })?;

        unsafe {
            ptr::copy_nonoverlapping(code.as_ptr(), ptr.as_ptr(), code.len());
            if !platform::make_executable(ptr.as_ptr(), size) {
                platform::free(ptr.as_ptr(), size);
                return Err(JitError::MapFailed { size });
            }
        }

        Ok(Self {
            ptr,
            size,
            len: code.len(),
        })
    }

    #[inline]
    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    /// Bytes of code, not counting page padding.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Mapped size in bytes.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.size
    }
}

impl Drop for ExecutableMemory {
    fn drop(&mut self) {
        unsafe { platform::free(self.ptr.as_ptr(), self.size) };
    }
}

// =============================================================================
// Targets
// =============================================================================

/// Somewhere machine code can be loaded and run.
pub trait NativeTarget {
    /// Whether [`load`](NativeTarget::load) can succeed on this host.
    fn is_available(&self) -> bool;

    fn load(&self, code: &[u8]) -> Result<ExecutableMemory, JitError>;
}

/// x86-64 code in an anonymous mapping.
#[derive(Debug, Clone, Copy, Default)]
pub struct MmapTarget;

impl NativeTarget for MmapTarget {
    fn is_available(&self) -> bool {
        cfg!(all(target_arch = "x86_64", unix))
    }

    fn load(&self, code: &[u8]) -> Result<ExecutableMemory, JitError> {
        if !self.is_available() {
            return Err(JitError::Unavailable);
        }
        ExecutableMemory::new(code)
    }
}

/// A target that never runs anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unavailable;

impl NativeTarget for Unavailable {
    fn is_available(&self) -> bool {
        false
    }

    fn load(&self, _code: &[u8]) -> Result<ExecutableMemory, JitError> {
        Err(JitError::Unavailable)
    }
}

/// The target for this host: [`MmapTarget`] where it can run, else
/// [`Unavailable`].
pub fn default_target() -> Box<dyn NativeTarget> {
    if MmapTarget.is_available() {
        Box::new(MmapTarget)
    } else {
        Box::new(Unavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_target_refuses() {
        assert!(!Unavailable.is_available());
        assert_eq!(Unavailable.load(&[0xC3]).unwrap_err(), JitError::Unavailable);
    }

    #[test]
    fn mapping_is_page_sized() {
        if !MmapTarget.is_available() {
            return;
        }
        let memory = MmapTarget.load(&[0xC3; 10]).unwrap();
        assert_eq!(memory.len(), 10);
        assert!(memory.capacity() >= 10);
        assert_eq!(memory.capacity() % platform::page_size(), 0);
        let first = unsafe { *memory.as_ptr() };
        assert_eq!(first, 0xC3);
    }
}
