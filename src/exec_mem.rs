//! Executable memory allocator: the concrete realization of the abstract
//! "allocate RW, fill, flip to RX" allocator described in the design.
//!
//! Mirrors this codebase's existing `libc`-backed low-level wrappers (raw
//! syscalls guarded by a narrow `unsafe` block, errors surfaced via
//! `std::io::Error::last_os_error()`) rather than reaching for a crate.

use crate::error::BfError;

/// A page-aligned region of memory that starts out writable, can be filled
/// with machine code, and is then sealed read/execute-only.
///
/// `Drop` unmaps the region; callers must keep the `ExecutableMemory` alive
/// for as long as the function pointer it hands out may be called.
pub struct ExecutableMemory {
    ptr: *mut u8,
    len: usize,
    sealed: bool,
}

impl ExecutableMemory {
    /// Allocate `len` bytes of page-aligned, read/write, anonymous memory.
    pub fn alloc(len: usize) -> Result<Self, BfError> {
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(BfError::ExecAllocFailed { size: len, source: std::io::Error::last_os_error() });
        }
        Ok(Self { ptr: ptr as *mut u8, len, sealed: false })
    }

    /// Copy `code` into the start of the region. Must be called before
    /// [`seal`](Self::seal).
    pub fn write(&mut self, code: &[u8]) {
        debug_assert!(!self.sealed, "cannot write to a sealed executable region");
        debug_assert!(code.len() <= self.len, "compiled code exceeds the allocated region");
        unsafe {
            std::ptr::copy_nonoverlapping(code.as_ptr(), self.ptr, code.len());
        }
    }

    /// Flip the region's protection from read/write to read/execute.
    pub fn seal(&mut self) -> Result<(), BfError> {
        let rc = unsafe {
            libc::mprotect(self.ptr as *mut libc::c_void, self.len, libc::PROT_READ | libc::PROT_EXEC)
        };
        if rc != 0 {
            return Err(BfError::ProtectFailed { source: std::io::Error::last_os_error() });
        }
        self.sealed = true;
        Ok(())
    }

    /// View the sealed region as the callable `(tape, input, output) -> ()`
    /// entry point the code generator produces.
    ///
    /// # Safety
    /// The caller must ensure [`seal`](Self::seal) has already succeeded and
    /// that the bytes written via [`write`](Self::write) are a well-formed
    /// compilation of a balanced program.
    pub unsafe fn as_entry_point(&self) -> unsafe extern "C" fn(*mut u8, *const u8, *mut u8) {
        debug_assert!(self.sealed, "entry point requested before the region was sealed");
        std::mem::transmute::<*mut u8, unsafe extern "C" fn(*mut u8, *const u8, *mut u8)>(self.ptr)
    }
}

impl Drop for ExecutableMemory {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.ptr as *mut libc::c_void, self.len);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_write_seal_and_run_ret_only_function() {
        let mut mem = ExecutableMemory::alloc(4096).unwrap();
        mem.write(&[0xc3]); // ret
        mem.seal().unwrap();
        let f = unsafe { mem.as_entry_point() };
        let mut tape = [0u8; 8];
        let input = [0u8; 1];
        let mut output = [0u8; 8];
        unsafe { f(tape.as_mut_ptr(), input.as_ptr(), output.as_mut_ptr()) };
    }
}
