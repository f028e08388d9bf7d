//! IR builder: turns the canonicalized byte stream into a linear sequence of
//! [`Op`]s, fusing adjacent arithmetic/shift runs into `AddMap`s, recognizing
//! the `[-<runs>]` balanced-loop idiom as `MulMap`, and merging a trailing
//! `Set` past a preceding `AddMap`'s shift.

use std::collections::HashMap;

use crate::canon::{REWD, REWD2, WIND, WIND2, ZERO};
use crate::error::BfError;

const PLUS: u8 = b'+';
const MINUS: u8 = b'-';
const LT: u8 = b'<';
const GT: u8 = b'>';
const DOT: u8 = b'.';
const COMMA: u8 = b',';
const LBRACKET: u8 = b'[';
const RBRACKET: u8 = b']';

/// One IR operation emitted by the optimizing builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    /// A fused run of `+ - < >`: a net pointer `shift` plus a set of
    /// `(offset, delta)` pairs, each with a nonzero delta.
    AddMap { shift: i32, pairs: Vec<(i32, i8)> },
    /// `[-<deltas>]`: multiply the current cell into each `(offset, factor)`
    /// pair, then zero the current cell. Never contains an offset-0 pair.
    MulMap { pairs: Vec<(i32, i8)> },
    /// Store `value` at `offset` (0 is the current cell).
    Set { value: u8, offset: i32 },
    Out,
    In,
    Wind,
    Rewd,
    Wind2,
    Rewd2,
    LoopBegin,
    LoopEnd,
}

/// Insertion-order-preserving accumulator for a run's per-offset delta.
struct OffsetMap {
    order: Vec<i32>,
    deltas: HashMap<i32, i32>,
}

impl OffsetMap {
    fn new() -> Self {
        Self { order: Vec::new(), deltas: HashMap::new() }
    }

    fn add(&mut self, offset: i32, amount: i32) {
        let entry = self.deltas.entry(offset).or_insert_with(|| {
            self.order.push(offset);
            0
        });
        *entry += amount;
    }

    fn get(&self, offset: i32) -> Option<i32> {
        self.deltas.get(&offset).copied()
    }

    /// `(offset, delta)` pairs in insertion order, skipping zero deltas and
    /// (when `exclude_zero_offset` is set) the offset-0 entry.
    fn pairs(&self, shift_by: i32, exclude_zero_offset: bool) -> Vec<(i32, i8)> {
        self.order
            .iter()
            .filter_map(|&offset| {
                if exclude_zero_offset && offset == 0 {
                    return None;
                }
                let delta = self.deltas[&offset];
                if delta == 0 {
                    return None;
                }
                Some((offset + shift_by, delta as i8))
            })
            .collect()
    }
}

fn is_arith(b: u8) -> bool {
    matches!(b, PLUS | MINUS | LT | GT)
}

/// Build the IR for a canonicalized byte stream.
///
/// Returns [`BfError::UnbalancedBrackets`] if a `]` appears with no matching
/// open `[`, or if any `[` is left unmatched at end of stream.
pub fn build(canon: &[u8]) -> Result<Vec<Op>, BfError> {
    let mut ops: Vec<Op> = Vec::new();
    let mut loop_stack: Vec<usize> = Vec::new();
    let n = canon.len();
    let mut i = 0usize;

    while i < n {
        if is_arith(canon[i]) {
            let run_start = i;
            let mut shift: i32 = 0;
            let mut map = OffsetMap::new();
            while i < n && is_arith(canon[i]) {
                match canon[i] {
                    PLUS => map.add(shift, 1),
                    MINUS => map.add(shift, -1),
                    GT => shift += 1,
                    LT => shift -= 1,
                    _ => unreachable!(),
                }
                i += 1;
            }

            let is_mulmap = shift == 0
                && map.get(0) == Some(-1)
                && run_start > 0
                && canon[run_start - 1] == LBRACKET
                && i < n
                && canon[i] == RBRACKET
                && matches!(ops.last(), Some(Op::LoopBegin));

            if is_mulmap {
                ops.pop();
                loop_stack.pop();
                ops.push(Op::MulMap { pairs: map.pairs(0, true) });
                i += 1;
                continue;
            }

            let mut local_shift = 0i32;
            let len = ops.len();
            if len >= 2 {
                let (left, right) = ops.split_at_mut(len - 1);
                if let (Op::AddMap { shift: ashift, .. }, Op::Set { offset, .. }) =
                    (&mut left[len - 2], &mut right[0])
                {
                    local_shift = *ashift;
                    *ashift = 0;
                    *offset += local_shift;
                }
            }
            ops.push(Op::AddMap {
                shift: shift + local_shift,
                pairs: map.pairs(local_shift, false),
            });

            if i >= n {
                break;
            }
        }

        match canon[i] {
            b if b == ZERO => {
                i += 1;
                let mut value: u8 = 0;
                while i < n && canon[i] == PLUS {
                    value = value.wrapping_add(1);
                    i += 1;
                }
                ops.push(Op::Set { value, offset: 0 });
            }
            RBRACKET => {
                if loop_stack.pop().is_none() {
                    return Err(BfError::UnbalancedBrackets { bracket: ']', index: i });
                }
                ops.push(Op::LoopEnd);
                i += 1;
                if i < n && canon[i] == PLUS {
                    let mut value: u8 = 0;
                    while i < n && canon[i] == PLUS {
                        value = value.wrapping_add(1);
                        i += 1;
                    }
                    ops.push(Op::Set { value, offset: 0 });
                }
            }
            COMMA => {
                ops.push(Op::In);
                i += 1;
            }
            DOT => {
                ops.push(Op::Out);
                i += 1;
            }
            LBRACKET => {
                loop_stack.push(i);
                ops.push(Op::LoopBegin);
                i += 1;
            }
            b if b == WIND => {
                ops.push(Op::Wind);
                i += 1;
            }
            b if b == REWD => {
                ops.push(Op::Rewd);
                i += 1;
            }
            b if b == WIND2 => {
                ops.push(Op::Wind2);
                i += 1;
            }
            b if b == REWD2 => {
                ops.push(Op::Rewd2);
                i += 1;
            }
            _ => unreachable!("canonicalized stream contains only the documented alphabet"),
        }
    }

    if let Some(&index) = loop_stack.first() {
        return Err(BfError::UnbalancedBrackets { bracket: '[', index });
    }

    Ok(ops)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canon::canonicalize;

    fn build_str(s: &str) -> Vec<Op> {
        build(&canonicalize(s.as_bytes())).unwrap()
    }

    #[test]
    fn zero_followed_by_plus_run_becomes_set() {
        assert_eq!(build_str("[-]+++"), vec![Op::Set { value: 3, offset: 0 }]);
    }

    #[test]
    fn mulmap_recognized_from_balanced_loop() {
        let ops = build_str("[->+<]");
        assert_eq!(ops, vec![Op::MulMap { pairs: vec![(1, 1)] }]);
    }

    #[test]
    fn mulmap_excludes_offset_zero_and_zero_deltas() {
        let ops = build_str("[->+>++<<]");
        match &ops[0] {
            Op::MulMap { pairs } => {
                assert!(pairs.iter().all(|&(o, _)| o != 0));
                assert_eq!(pairs, &[(1, 1), (2, 2)]);
            }
            other => panic!("expected MulMap, got {other:?}"),
        }
    }

    #[test]
    fn addmap_fuses_run_and_tracks_net_shift() {
        let ops = build_str("+++>>--");
        assert_eq!(
            ops,
            vec![Op::AddMap { shift: 2, pairs: vec![(0, 3), (2, -2)] }]
        );
    }

    #[test]
    fn addmap_never_emits_zero_delta_pairs() {
        // offset 0 is touched twice (+1 then -1, non-adjacently) and nets to
        // zero; it must not appear in the fused AddMap's pairs.
        let ops = build_str("+>-<-");
        match &ops[0] {
            Op::AddMap { pairs, .. } => {
                assert!(pairs.iter().all(|&(_, d)| d != 0));
                assert_eq!(pairs, &[(1, -1)]);
            }
            other => panic!("expected AddMap, got {other:?}"),
        }
    }

    #[test]
    fn late_set_merge_relocates_pending_shift() {
        // "+<[-]<-<-": a shift-carrying add-map, then a SET (from [-]),
        // then more arithmetic relocates the earlier shift onto the SET.
        let ops = build_str("+<[-]<-<-");
        let set_offset = ops.iter().find_map(|op| match op {
            Op::Set { offset, .. } => Some(*offset),
            _ => None,
        });
        assert_eq!(set_offset, Some(-1));
    }

    #[test]
    fn scan_idioms_map_to_dedicated_ops() {
        assert_eq!(build_str("[>]"), vec![Op::Wind]);
        assert_eq!(build_str("[<]"), vec![Op::Rewd]);
        assert_eq!(build_str("[>>]"), vec![Op::Wind2]);
        assert_eq!(build_str("[<<]"), vec![Op::Rewd2]);
    }

    #[test]
    fn loops_nest_strictly() {
        let ops = build_str("+[>+[>+<-]<-]");
        let mut depth = 0i32;
        for op in &ops {
            match op {
                Op::LoopBegin => depth += 1,
                Op::LoopEnd => depth -= 1,
                _ => {}
            }
            assert!(depth >= 0);
        }
        assert_eq!(depth, 0);
    }

    #[test]
    fn unmatched_close_bracket_errors() {
        assert!(build(&canonicalize(b"]")).is_err());
    }

    #[test]
    fn unclosed_open_bracket_errors() {
        assert!(build(&canonicalize(b"[+")).is_err());
    }
}
