//! x86-64 code generator: walks the IR and emits machine code bytes for the
//! System V calling convention `(tape: *mut u8, input: *const u8, output: *mut u8)`.
//!
//! Branch displacements are resolved by recording the emitter's own byte
//! cursor at `[` and subtracting at the matching `]`, rather than re-walking
//! the IR to re-sum a size table. `emitted_size` below is a standalone
//! per-op byte count kept only so tests can cross-check the emitter
//! byte-for-byte.

#[cfg(not(target_arch = "x86_64"))]
compile_error!("codegen emits raw x86-64 machine code and cannot target this architecture");

use crate::error::BfError;
use crate::ir::Op;

/// Bytes emitted by a single op, independent of the actual emitter. Used
/// only as a test cross-check that a loop's branch displacement equals the
/// summed size of its body.
pub fn emitted_size(op: &Op) -> usize {
    match op {
        Op::AddMap { shift, pairs } => {
            let mut n = 0;
            for &(offset, _) in pairs {
                if offset == 0 {
                    n += 3;
                }
            }
            for &(offset, _) in pairs {
                if offset != 0 && offset != *shift {
                    n += 4;
                }
            }
            if *shift != 0 {
                n += 4;
                for &(offset, _) in pairs {
                    if offset == *shift {
                        n += 3;
                    }
                }
            }
            n
        }
        Op::MulMap { pairs } => {
            let mut n = 0;
            if pairs.iter().any(|&(_, f)| f == 1) {
                n += 3; // mov (%rdi),%rax, emitted once
            }
            for &(_, factor) in pairs {
                n += if factor == 1 { 3 } else { 7 };
            }
            n + 3 // terminating zero store
        }
        Op::Set { offset, .. } => if *offset == 0 { 3 } else { 4 },
        Op::Out | Op::In => 9,
        Op::Wind | Op::Rewd | Op::Wind2 | Op::Rewd2 => 14,
        Op::LoopBegin | Op::LoopEnd => 9,
    }
}

pub struct CodeGen {
    code: Vec<u8>,
    /// `(patch_index, body_start)` for each open `[`, innermost last.
    loop_stack: Vec<(usize, usize)>,
}

impl CodeGen {
    fn new() -> Self {
        Self { code: Vec::new(), loop_stack: Vec::new() }
    }

    /// Compile an IR op list into a flat, position-independent byte buffer
    /// ending with a single `ret`.
    pub fn compile(ops: &[Op]) -> Result<Vec<u8>, BfError> {
        let mut gen = Self::new();
        for op in ops {
            gen.emit(op);
        }
        debug_assert!(gen.loop_stack.is_empty(), "IR builder guarantees balanced brackets");
        gen.code.push(0xc3); // ret
        Ok(gen.code)
    }

    fn emit(&mut self, op: &Op) {
        match op {
            Op::AddMap { shift, pairs } => self.emit_addmap(*shift, pairs),
            Op::MulMap { pairs } => self.emit_mulmap(pairs),
            Op::Set { value, offset } => self.emit_set(*value, *offset),
            Op::Out => self.emit_out(),
            Op::In => self.emit_in(),
            Op::Wind => self.emit_scan(1, true),
            Op::Rewd => self.emit_scan(1, false),
            Op::Wind2 => self.emit_scan(2, true),
            Op::Rewd2 => self.emit_scan(2, false),
            Op::LoopBegin => self.emit_loop_begin(),
            Op::LoopEnd => self.emit_loop_end(),
        }
    }

    fn push(&mut self, bytes: &[u8]) {
        self.code.extend_from_slice(bytes);
    }

    // addb imm8, (%rdi)
    fn add_to_ptee(&mut self, delta: i8) {
        self.push(&[0x80, 0x07, delta as u8]);
    }

    // addb imm8, disp8(%rdi)
    fn add_to_ptee_disp(&mut self, offset: i32, delta: i8) {
        self.push(&[0x80, 0x47, offset as i8 as u8, delta as u8]);
    }

    // add imm8, %rdi (sign-extended, REX.W)
    fn add_to_ptr(&mut self, shift: i32) {
        self.push(&[0x48, 0x83, 0xc7, shift as i8 as u8]);
    }

    fn emit_addmap(&mut self, shift: i32, pairs: &[(i32, i8)]) {
        for &(offset, delta) in pairs {
            if offset == 0 {
                self.add_to_ptee(delta);
            }
        }
        for &(offset, delta) in pairs {
            if offset != 0 && offset != shift {
                self.add_to_ptee_disp(offset, delta);
            }
        }
        if shift != 0 {
            self.add_to_ptr(shift);
            for &(offset, delta) in pairs {
                if offset == shift {
                    self.add_to_ptee(delta);
                }
            }
        }
    }

    fn emit_mulmap(&mut self, pairs: &[(i32, i8)]) {
        let mut loaded = false;
        for &(offset, factor) in pairs {
            if factor == 1 {
                if !loaded {
                    self.push(&[0x48, 0x8b, 0x07]); // mov (%rdi),%rax
                    loaded = true;
                }
                self.push(&[0x00, 0x47, offset as i8 as u8]); // add %al, disp8(%rdi)
            }
        }
        for &(offset, factor) in pairs {
            if factor != 1 {
                self.push(&[0x48, 0x6b, 0x07, factor as u8]); // imul imm8,(%rdi),%rax
                self.push(&[0x00, 0x47, offset as i8 as u8]); // add %al, disp8(%rdi)
            }
        }
        self.push(&[0xc6, 0x07, 0x00]); // movb $0,(%rdi)
    }

    fn emit_set(&mut self, value: u8, offset: i32) {
        if offset == 0 {
            self.push(&[0xc6, 0x07, value]);
        } else {
            self.push(&[0xc6, 0x47, offset as i8 as u8, value]);
        }
    }

    fn emit_out(&mut self) {
        self.push(&[0x0f, 0xb6, 0x07]); // movzbl (%rdi),%eax
        self.push(&[0x88, 0x02]); // mov %al,(%rdx)
        self.push(&[0x48, 0x83, 0xc2, 0x01]); // add $1,%rdx
    }

    fn emit_in(&mut self) {
        self.push(&[0x0f, 0xb6, 0x06]); // movzbl (%rsi),%eax
        self.push(&[0x48, 0x83, 0xc6, 0x01]); // add $1,%rsi
        self.push(&[0x88, 0x07]); // mov %al,(%rdi)
    }

    fn emit_scan(&mut self, step: u8, forward: bool) {
        self.push(&[0x80, 0x3f, 0x00]); // cmpb $0,(%rdi)
        self.push(&[0x74, 0x09]); // je +9
        if forward {
            self.push(&[0x48, 0x83, 0xc7, step]); // add $step,%rdi
        } else {
            self.push(&[0x48, 0x83, 0xef, step]); // sub $step,%rdi
        }
        self.push(&[0x80, 0x3f, 0x00]); // cmpb $0,(%rdi)
        self.push(&[0x75, 0xf7]); // jne -9
    }

    fn emit_loop_begin(&mut self) {
        self.push(&[0x80, 0x3f, 0x00]); // cmpb $0,(%rdi)
        self.push(&[0x0f, 0x84, 0, 0, 0, 0]); // je rel32 (patched)
        let patch_index = self.code.len() - 4;
        self.loop_stack.push((patch_index, self.code.len()));
    }

    fn emit_loop_end(&mut self) {
        let (je_patch_index, body_start) =
            self.loop_stack.pop().expect("IR builder guarantees balanced brackets");
        self.push(&[0x80, 0x3f, 0x00]); // cmpb $0,(%rdi)
        self.push(&[0x0f, 0x85, 0, 0, 0, 0]); // jne rel32 (patched)
        let jne_patch_index = self.code.len() - 4;
        let jump_size = (self.code.len() - body_start) as i32;
        self.code[je_patch_index..je_patch_index + 4].copy_from_slice(&jump_size.to_le_bytes());
        self.code[jne_patch_index..jne_patch_index + 4]
            .copy_from_slice(&(-jump_size).to_le_bytes());
    }
}
