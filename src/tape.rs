//! The working tape: a single zeroed byte buffer with generous headroom on
//! both sides of the entry pointer.

/// One megabyte of left headroom, two of right.
const LEFT_HEADROOM: usize = 1024 * 1024;
const RIGHT_HEADROOM: usize = 2 * 1024 * 1024;

/// Owns the three-megabyte tape buffer and hands out the entry pointer the
/// emitted code is invoked with.
pub struct Tape {
    buf: Vec<u8>,
}

impl Tape {
    pub fn new() -> Self {
        Self { buf: vec![0u8; LEFT_HEADROOM + RIGHT_HEADROOM] }
    }

    /// Pointer to the cell one megabyte into the buffer, i.e. the `rdi`
    /// value the emitted function is called with.
    pub fn entry_ptr(&mut self) -> *mut u8 {
        unsafe { self.buf.as_mut_ptr().add(LEFT_HEADROOM) }
    }
}

impl Default for Tape {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_pointer_has_headroom_on_both_sides() {
        let mut tape = Tape::new();
        let base = tape.buf.as_ptr() as usize;
        let entry = tape.entry_ptr() as usize;
        assert_eq!(entry - base, LEFT_HEADROOM);
        assert_eq!(tape.buf.len() - (entry - base), RIGHT_HEADROOM);
    }
}
