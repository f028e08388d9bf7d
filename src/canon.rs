//! Source canonicalizer: filters to the eight valid operators, cancels
//! adjacent inverse pairs, and rewrites a handful of loop idioms into
//! single-byte pseudo-tokens so the IR builder never has to re-discover them.

/// `[-]` / `[+]`, collapsed to a single pseudo-op: "zero the current cell".
pub const ZERO: u8 = 0x01;
/// `[>]`: scan right until the current cell is zero.
pub const WIND: u8 = 0x02;
/// `[<]`: scan left until the current cell is zero.
pub const REWD: u8 = 0x03;
/// `[>>]`: scan right two cells at a time until zero.
pub const WIND2: u8 = 0x04;
/// `[<<]`: scan left two cells at a time until zero.
pub const REWD2: u8 = 0x05;

const PLUS: u8 = b'+';
const MINUS: u8 = b'-';
const LT: u8 = b'<';
const GT: u8 = b'>';
const DOT: u8 = b'.';
const COMMA: u8 = b',';
const LBRACKET: u8 = b'[';
const RBRACKET: u8 = b']';

fn is_source_op(b: u8) -> bool {
    matches!(b, PLUS | MINUS | LT | GT | DOT | COMMA | LBRACKET | RBRACKET)
}

fn cancels(a: u8, b: u8) -> bool {
    matches!(
        (a, b),
        (PLUS, MINUS) | (MINUS, PLUS) | (LT, GT) | (GT, LT)
    )
}

/// Erase every adjacent `+-`, `-+`, `<>`, `><` pair, to fixpoint.
///
/// A single left-to-right stack pass is equivalent to repeatedly scanning
/// for and erasing the leftmost match: `+`/`-` and `<`/`>` are each a pair
/// of mutually-annihilating generators with no interaction between the two
/// pairs, so the reduction is confluent and order does not matter.
fn cancel_inverses(bytes: &[u8]) -> Vec<u8> {
    let mut stack: Vec<u8> = Vec::with_capacity(bytes.len());
    for &b in bytes {
        if let Some(&top) = stack.last() {
            if cancels(top, b) {
                stack.pop();
                continue;
            }
        }
        stack.push(b);
    }
    stack
}

fn replace_all(buf: &mut Vec<u8>, pattern: &[u8], replacement: &[u8]) {
    if pattern.is_empty() {
        return;
    }
    loop {
        let Some(pos) = find(buf, pattern) else {
            return;
        };
        buf.splice(pos..pos + pattern.len(), replacement.iter().copied());
    }
}

fn find(buf: &[u8], pattern: &[u8]) -> Option<usize> {
    buf.windows(pattern.len()).position(|w| w == pattern)
}

/// Canonicalize raw source bytes per the fixed rule order: filter, cancel
/// inverses, fold loop idioms into pseudo-tokens.
pub fn canonicalize(source: &[u8]) -> Vec<u8> {
    let mut buf: Vec<u8> = source.iter().copied().filter(|&b| is_source_op(b)).collect();
    buf = cancel_inverses(&buf);

    // "][-]" / "][+]" -> "]": the zero-clear right after a loop exit is
    // redundant, the loop only exits when the cell is already zero.
    replace_all(&mut buf, &[RBRACKET, LBRACKET, MINUS, RBRACKET], &[RBRACKET]);
    replace_all(&mut buf, &[RBRACKET, LBRACKET, PLUS, RBRACKET], &[RBRACKET]);

    replace_all(&mut buf, &[LBRACKET, MINUS, RBRACKET], &[ZERO]);
    replace_all(&mut buf, &[LBRACKET, PLUS, RBRACKET], &[ZERO]);

    replace_all(&mut buf, &[MINUS, ZERO], &[ZERO]);
    replace_all(&mut buf, &[PLUS, ZERO], &[ZERO]);

    replace_all(&mut buf, &[ZERO, COMMA], &[COMMA]);
    replace_all(&mut buf, &[PLUS, COMMA], &[COMMA]);
    replace_all(&mut buf, &[MINUS, COMMA], &[COMMA]);

    replace_all(&mut buf, &[LBRACKET, LT, RBRACKET], &[REWD]);
    replace_all(&mut buf, &[LBRACKET, GT, RBRACKET], &[WIND]);
    replace_all(&mut buf, &[LBRACKET, LT, LT, RBRACKET], &[REWD2]);
    replace_all(&mut buf, &[LBRACKET, GT, GT, RBRACKET], &[WIND2]);

    buf
}
