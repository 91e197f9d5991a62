//! Candidate expansion strategies.
//!
//! After a candidate has been tested as given, the session asks its
//! [`Permutation`] for further variants of the same word and tests each one.
//! Strategies rewrite the candidate buffer in place.

use serde::{Deserialize, Serialize};

/// Upper-case a byte, treating 0xE0..=0xF6 as ISO-8859-1 lower-case letters.
#[inline]
pub fn latin1_to_upper(b: u8) -> u8 {
    if (0xE0..=0xF6).contains(&b) {
        b - 0x20
    } else {
        b.to_ascii_uppercase()
    }
}

/// Swap the case of a byte (ASCII plus the ISO-8859-1 range 0xC0..=0xD6 /
/// 0xE0..=0xF6).
#[inline]
pub fn latin1_toggle_case(b: u8) -> u8 {
    match b {
        b'a'..=b'z' | 0xE0..=0xF6 => b - 0x20,
        b'A'..=b'Z' | 0xC0..=0xD6 => b + 0x20,
        _ => b,
    }
}

/// A candidate-expansion strategy.
pub trait Permutation: Send + Sync {
    /// Start expanding a new base candidate.
    fn reset(&mut self, candidate: &[u8]);

    /// Rewrite `candidate` into the next untried variant.
    ///
    /// Returns `false` once every variant has been produced; the buffer
    /// content is unspecified after that.
    fn next(&mut self, candidate: &mut [u8]) -> bool;

    /// Which strategy this is, for checkpoints.
    fn kind(&self) -> PermutationKind;

    /// Clone into a fresh box.
    fn boxed_clone(&self) -> Box<dyn Permutation>;
}

impl Clone for Box<dyn Permutation> {
    fn clone(&self) -> Self {
        self.boxed_clone()
    }
}

impl std::fmt::Debug for dyn Permutation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Permutation({:?})", self.kind())
    }
}

/// Strategy selector, stored in configuration and checkpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PermutationKind {
    /// Test every candidate exactly as given
    #[default]
    None,
    /// Also try the candidate with its first byte upper-cased
    FirstChar,
    /// Try every case combination of the first `max_positions` letters
    AllCase {
        /// Number of letter positions to vary (capped at 16)
        max_positions: u8,
    },
}

impl PermutationKind {
    /// Instantiate the strategy.
    pub fn build(self) -> Box<dyn Permutation> {
        match self {
            PermutationKind::None => Box::new(NoPermutation),
            PermutationKind::FirstChar => Box::new(FirstCharCase::default()),
            PermutationKind::AllCase { max_positions } => {
                Box::new(AllCaseVariants::new(max_positions))
            },
        }
    }

    /// Whether this strategy ever produces variants.
    pub fn is_enabled(self) -> bool {
        self != PermutationKind::None
    }
}

/// Produces no variants.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPermutation;

impl Permutation for NoPermutation {
    fn reset(&mut self, _candidate: &[u8]) {}

    #[inline]
    fn next(&mut self, _candidate: &mut [u8]) -> bool {
        false
    }

    fn kind(&self) -> PermutationKind {
        PermutationKind::None
    }

    fn boxed_clone(&self) -> Box<dyn Permutation> {
        Box::new(*self)
    }
}

/// Upper-cases the first byte, once.
///
/// A candidate whose first byte has no upper-case form (digits,
/// punctuation, already upper-case letters) yields no variant.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstCharCase {
    tried: bool,
}

impl Permutation for FirstCharCase {
    fn reset(&mut self, _candidate: &[u8]) {
        self.tried = false;
    }

    #[inline]
    fn next(&mut self, candidate: &mut [u8]) -> bool {
        if self.tried {
            return false;
        }
        self.tried = true;
        match candidate.first_mut() {
            Some(first) => {
                let upper = latin1_to_upper(*first);
                if upper != *first {
                    *first = upper;
                    true
                } else {
                    false
                }
            },
            None => false,
        }
    }

    fn kind(&self) -> PermutationKind {
        PermutationKind::FirstChar
    }

    fn boxed_clone(&self) -> Box<dyn Permutation> {
        Box::new(*self)
    }
}

/// Enumerates every case combination of the leading letters.
///
/// For `n` case-bearing positions this yields `2^n - 1` variants in
/// binary-counter order, the original spelling excluded.
#[derive(Debug, Clone)]
pub struct AllCaseVariants {
    max_positions: u8,
    positions: Vec<usize>,
    original: Vec<u8>,
    mask: u32,
}

impl AllCaseVariants {
    /// Upper bound on `max_positions`; 2^16 variants per word is already a
    /// search space of its own.
    pub const MAX_POSITIONS: u8 = 16;

    /// Vary at most `max_positions` letters (capped at [`Self::MAX_POSITIONS`]).
    pub fn new(max_positions: u8) -> Self {
        Self {
            max_positions: max_positions.min(Self::MAX_POSITIONS),
            positions: Vec::new(),
            original: Vec::new(),
            mask: 0,
        }
    }

    fn end_mask(&self) -> u32 {
        1u32 << self.positions.len()
    }
}

impl Permutation for AllCaseVariants {
    fn reset(&mut self, candidate: &[u8]) {
        self.original.clear();
        self.original.extend_from_slice(candidate);
        self.positions.clear();
        self.positions.extend(
            candidate
                .iter()
                .enumerate()
                .filter(|&(_, &b)| latin1_toggle_case(b) != b)
                .map(|(i, _)| i)
                .take(self.max_positions as usize),
        );
        self.mask = 1;
    }

    fn next(&mut self, candidate: &mut [u8]) -> bool {
        if self.mask >= self.end_mask() || candidate.len() != self.original.len() {
            return false;
        }
        candidate.copy_from_slice(&self.original);
        for (bit, &pos) in self.positions.iter().enumerate() {
            if self.mask & (1 << bit) != 0 {
                candidate[pos] = latin1_toggle_case(candidate[pos]);
            }
        }
        self.mask += 1;
        true
    }

    fn kind(&self) -> PermutationKind {
        PermutationKind::AllCase {
            max_positions: self.max_positions,
        }
    }

    fn boxed_clone(&self) -> Box<dyn Permutation> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variants(kind: PermutationKind, word: &[u8]) -> Vec<Vec<u8>> {
        let mut strategy = kind.build();
        let mut buf = word.to_vec();
        strategy.reset(&buf);
        let mut out = Vec::new();
        while strategy.next(&mut buf) {
            out.push(buf.clone());
        }
        out
    }

    #[test]
    fn test_latin1_to_upper() {
        assert_eq!(latin1_to_upper(b'a'), b'A');
        assert_eq!(latin1_to_upper(b'Z'), b'Z');
        assert_eq!(latin1_to_upper(b'1'), b'1');
        assert_eq!(latin1_to_upper(0xE9), 0xC9); // é -> É
        assert_eq!(latin1_to_upper(0xF6), 0xD6); // ö -> Ö
        assert_eq!(latin1_to_upper(0xF7), 0xF7); // division sign
        assert_eq!(latin1_to_upper(0xF8), 0xF8);
    }

    #[test]
    fn test_no_permutation() {
        assert!(variants(PermutationKind::None, b"secret").is_empty());
    }

    #[test]
    fn test_first_char_upper() {
        assert_eq!(variants(PermutationKind::FirstChar, b"secret"), vec![b"Secret".to_vec()]);
    }

    #[test]
    fn test_first_char_latin1() {
        assert_eq!(
            variants(PermutationKind::FirstChar, &[0xE9, b't', b'e']),
            vec![vec![0xC9, b't', b'e']]
        );
    }

    #[test]
    fn test_first_char_non_alphabetic_yields_nothing() {
        assert!(variants(PermutationKind::FirstChar, b"1secret").is_empty());
        assert!(variants(PermutationKind::FirstChar, b"Secret").is_empty());
        assert!(variants(PermutationKind::FirstChar, b"").is_empty());
    }

    #[test]
    fn test_first_char_reset_between_candidates() {
        let mut strategy = FirstCharCase::default();
        let mut a = b"abc".to_vec();
        strategy.reset(&a);
        assert!(strategy.next(&mut a));
        assert!(!strategy.next(&mut a));

        let mut b = b"xyz".to_vec();
        strategy.reset(&b);
        assert!(strategy.next(&mut b));
        assert_eq!(b, b"Xyz");
    }

    #[test]
    fn test_all_case_variants() {
        let mut out = variants(PermutationKind::AllCase { max_positions: 8 }, b"a1b");
        out.sort();
        assert_eq!(out, vec![b"A1B".to_vec(), b"A1b".to_vec(), b"a1B".to_vec()]);
    }

    #[test]
    fn test_all_case_respects_position_limit() {
        let out = variants(PermutationKind::AllCase { max_positions: 2 }, b"abcd");
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|v| &v[2..] == b"cd"));
    }

    #[test]
    fn test_all_case_no_letters() {
        assert!(variants(PermutationKind::AllCase { max_positions: 4 }, b"1234").is_empty());
    }

    #[test]
    fn test_all_case_cap() {
        assert_eq!(
            AllCaseVariants::new(40).kind(),
            PermutationKind::AllCase { max_positions: 16 }
        );
    }
}
