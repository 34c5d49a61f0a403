//! Fixed-length sparse binary codes and the validated input corpus.
//!
//! Codes are stored bit-packed in `u64` words so a Jaccard comparison is a
//! pair of popcounts per word. The [`CodeSet`] keeps every code of a run in
//! one contiguous word buffer, which is also the layout uploaded to the
//! compute device.

use crate::consts::WORD_BITS;
use crate::error::{GfResult, GridForgeError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct SparseCode {
    bit_len: usize,
    words: Vec<u64>,
}

#[inline(always)]
fn words_for(bit_len: usize) -> usize {
    bit_len.div_ceil(WORD_BITS)
}

impl SparseCode {
    pub fn from_bits(bits: &[bool]) -> Self {
        let mut words = vec![0u64; words_for(bits.len())];
        for (i, &on) in bits.iter().enumerate() {
            if on {
                words[i / WORD_BITS] |= 1u64 << (i % WORD_BITS);
            }
        }
        Self {
            bit_len: bits.len(),
            words,
        }
    }

    /// Builds a code of `bit_len` bits with the given indices set.
    pub fn from_active(bit_len: usize, active: &[usize]) -> GfResult<Self> {
        let mut words = vec![0u64; words_for(bit_len)];
        for &i in active {
            if i >= bit_len {
                return Err(GridForgeError::Validation(format!(
                    "Active bit {} out of range for a {}-bit code",
                    i, bit_len
                )));
            }
            words[i / WORD_BITS] |= 1u64 << (i % WORD_BITS);
        }
        Ok(Self { bit_len, words })
    }

    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    pub fn words(&self) -> &[u64] {
        &self.words
    }

    pub fn active_count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    #[inline]
    pub fn is_active(&self, bit: usize) -> bool {
        bit < self.bit_len && (self.words[bit / WORD_BITS] >> (bit % WORD_BITS)) & 1 == 1
    }

    pub fn active_indices(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.bit_len).filter(move |&i| self.is_active(i))
    }

    pub fn to_bit_string(&self) -> String {
        (0..self.bit_len)
            .map(|i| if self.is_active(i) { '1' } else { '0' })
            .collect()
    }

    pub fn jaccard(&self, other: &SparseCode) -> f32 {
        jaccard_words(&self.words, &other.words)
    }
}

impl FromStr for SparseCode {
    type Err = GridForgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let mut bits = Vec::with_capacity(trimmed.len());
        for (pos, c) in trimmed.chars().enumerate() {
            match c {
                '0' => bits.push(false),
                '1' => bits.push(true),
                _ => {
                    return Err(GridForgeError::Validation(format!(
                        "Invalid character '{}' at position {} in code '{}'",
                        c, pos, trimmed
                    )))
                }
            }
        }
        Ok(Self::from_bits(&bits))
    }
}

impl fmt::Display for SparseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_bit_string())
    }
}

impl From<SparseCode> for String {
    fn from(code: SparseCode) -> Self {
        code.to_bit_string()
    }
}

impl TryFrom<String> for SparseCode {
    type Error = GridForgeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Intersection-over-union of two packed bit sets of equal word length.
/// Two empty sets have similarity 0.
#[inline]
pub fn jaccard_words(a: &[u64], b: &[u64]) -> f32 {
    let mut inter = 0u32;
    let mut union = 0u32;
    for (x, y) in a.iter().zip(b.iter()) {
        inter += (x & y).count_ones();
        union += (x | y).count_ones();
    }
    if union == 0 {
        0.0
    } else {
        inter as f32 / union as f32
    }
}

/// The validated codes of one run, packed back to back.
#[derive(Debug, Clone)]
pub struct CodeSet {
    bit_len: usize,
    words_per_code: usize,
    count: usize,
    words: Vec<u64>,
}

impl CodeSet {
    pub fn from_codes<'a, I>(codes: I) -> GfResult<Self>
    where
        I: IntoIterator<Item = &'a SparseCode>,
    {
        let mut bit_len = None;
        let mut words = Vec::new();
        let mut count = 0;

        for (idx, code) in codes.into_iter().enumerate() {
            match bit_len {
                None => {
                    if code.bit_len() == 0 {
                        return Err(GridForgeError::Validation(
                            "Code length must be positive (code 0 has 0 bits)".to_string(),
                        ));
                    }
                    bit_len = Some(code.bit_len());
                }
                Some(expected) if expected != code.bit_len() => {
                    return Err(GridForgeError::Validation(format!(
                        "Code {} has {} bits, expected {}",
                        idx,
                        code.bit_len(),
                        expected
                    )));
                }
                Some(_) => {}
            }
            words.extend_from_slice(code.words());
            count += 1;
        }

        let bit_len = bit_len.ok_or_else(|| {
            GridForgeError::Validation("Input set is empty: nothing to place".to_string())
        })?;

        if count > u32::MAX as usize - 1 {
            return Err(GridForgeError::Validation(format!(
                "Too many codes ({}) for 32-bit cell occupancy",
                count
            )));
        }

        Ok(Self {
            bit_len,
            words_per_code: words_for(bit_len),
            count,
            words,
        })
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    pub fn words_per_code(&self) -> usize {
        self.words_per_code
    }

    /// Contiguous packed words of every code, in input order.
    pub fn packed_words(&self) -> &[u64] {
        &self.words
    }

    #[inline(always)]
    pub fn code_words(&self, idx: usize) -> &[u64] {
        let start = idx * self.words_per_code;
        &self.words[start..start + self.words_per_code]
    }

    /// Raw similarity of two code indices. An index compared with itself is
    /// 1 even for an all-zero code.
    #[inline]
    pub fn raw_similarity(&self, a: usize, b: usize) -> f32 {
        if a == b {
            1.0
        } else {
            jaccard_words(self.code_words(a), self.code_words(b))
        }
    }
}
