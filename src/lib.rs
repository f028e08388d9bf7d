pub mod canon;
pub mod codegen;
pub mod error;
pub mod exec_mem;
pub mod ir;
pub mod tape;

use error::BfError;
use exec_mem::ExecutableMemory;

/// Region size for the compiled code: `ceil(10*(len+1), 1024)` bytes, a
/// generous overestimate of the emitted code size.
fn region_size(code_len: usize) -> usize {
    let estimate = 10 * (code_len + 1);
    estimate + (1024 - estimate % 1024) % 1024
}

/// Run the three compiler stages (canonicalize, build IR, emit x86-64) and
/// seal the result into an executable region.
///
/// Source in, callable machine code out. Acquiring the source and driving
/// the emitted function against a tape are the caller's job (see
/// `main.rs`).
pub fn compile(source: &[u8]) -> Result<ExecutableMemory, BfError> {
    let canonical = canon::canonicalize(source);
    log::trace!("[jit] canonicalized {} source bytes to {}", source.len(), canonical.len());

    let ops = ir::build(&canonical)?;
    log::trace!("[jit] built {} IR ops", ops.len());

    let code = codegen::CodeGen::compile(&ops)?;
    log::debug!("[jit] emitted {} bytes of x86-64", code.len());

    let mut mem = ExecutableMemory::alloc(region_size(code.len()))?;
    mem.write(&code);
    mem.seal()?;
    Ok(mem)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(source: &[u8], input: &[u8]) -> Vec<u8> {
        let mem = compile(source).unwrap();
        let mut t = tape::Tape::new();
        let entry = t.entry_ptr();

        let mut input_buf = input.to_vec();
        input_buf.push(0);

        let mut output = vec![0u8; 100_000];

        unsafe {
            let f = mem.as_entry_point();
            f(entry, input_buf.as_ptr(), output.as_mut_ptr());
        }

        let end = output.iter().position(|&b| b == 0).unwrap_or(output.len());
        output.truncate(end);
        output
    }

    #[test]
    fn hello_world_via_mulmap() {
        let out = run(b"++++++++[>++++++++<-]>+.", &[]);
        assert_eq!(out, b"A");
    }

    #[test]
    fn cat_echoes_a_single_byte() {
        let out = run(b",.", b"X");
        assert_eq!(out, b"X");
    }

    #[test]
    fn cat_until_zero_byte_stops_at_the_nul() {
        let out = run(b",[.,]", b"abc\0def");
        assert_eq!(out, b"abc");
    }

    #[test]
    fn multiplication_via_mulmap() {
        let out = run(b"++++[->+++++<]>.", &[]);
        assert_eq!(out, [20]);
    }

    #[test]
    fn scan_loop_finds_the_zero_cell() {
        let out = run(b"++>+>+>+>[>]<.", &[]);
        assert_eq!(out, [1]);
    }

    #[test]
    fn double_step_scan_loop() {
        let out = run(b"+>>+>>+>>[>>]<<.", &[]);
        assert_eq!(out, [1]);
    }

    #[test]
    fn post_loop_seed_reruns_after_zero_clear() {
        let out = run(b"+[-]+++++.", &[]);
        assert_eq!(out, [5]);
    }

    #[test]
    fn rejects_unbalanced_brackets() {
        assert!(compile(b"[[+]").is_err());
        assert!(compile(b"[+]]").is_err());
    }

    #[test]
    fn region_size_rounds_up_to_1024() {
        assert_eq!(region_size(0), 1024);
        assert_eq!(region_size(100), 1024);
        assert_eq!(region_size(1023), 10240);
    }
}
