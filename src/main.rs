use clap::Parser;
use bf_jit::tape::Tape;
use std::io::{BufRead, Read, Write};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a source file. If omitted, the program is read from stdin
    /// until EOF or a `!` sentinel byte.
    source: Option<PathBuf>,
}

/// Output buffer size handed to the emitted code.
const OUTPUT_BUFFER_SIZE: usize = 100_000;

fn read_source(path: Option<&PathBuf>) -> Result<Vec<u8>, bf_jit::error::BfError> {
    match path {
        Some(path) => {
            let file = std::fs::File::open(path).map_err(|source| {
                bf_jit::error::BfError::SourceUnavailable { path: path.display().to_string(), source }
            })?;
            // Lines are concatenated with physical breaks discarded: '\n' is
            // not a token in this language anyway.
            let mut code = Vec::new();
            for line in std::io::BufReader::new(file).lines() {
                let line = line.map_err(|source| bf_jit::error::BfError::SourceUnavailable {
                    path: path.display().to_string(),
                    source,
                })?;
                code.extend_from_slice(line.as_bytes());
            }
            Ok(code)
        }
        None => {
            let mut code = Vec::new();
            for byte in std::io::stdin().lock().bytes() {
                match byte {
                    Ok(b'!') | Err(_) => break,
                    Ok(b) => code.push(b),
                }
            }
            Ok(code)
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let source = read_source(args.source.as_ref())?;
    log::debug!("[main] read {} bytes of source", source.len());

    let mem = bf_jit::compile(&source)?;

    let mut stdin_bytes = Vec::new();
    std::io::stdin().lock().read_to_end(&mut stdin_bytes)?;
    stdin_bytes.push(0);

    let mut output = vec![0u8; OUTPUT_BUFFER_SIZE];

    let mut tape = Tape::new();
    let entry = tape.entry_ptr();
    unsafe {
        let f = mem.as_entry_point();
        f(entry, stdin_bytes.as_ptr(), output.as_mut_ptr());
    }

    let end = output.iter().position(|&b| b == 0).unwrap_or(output.len());
    std::io::stdout().write_all(&output[..end])?;

    Ok(())
}
