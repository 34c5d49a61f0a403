//! Similarity model: raw Jaccard closeness, the threshold gate that turns it
//! into a pair weight, and the optional precomputed `n×n` cache.

use crate::code::{jaccard_words, CodeSet};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Source of raw pairwise similarities between code indices.
///
/// Implemented by the host corpus, the host cache and the device buffer
/// views, so every backend evaluates the same arithmetic.
pub trait PairWeights: Sync {
    fn raw(&self, a: u32, b: u32) -> f32;
}

#[inline(always)]
fn sigmoid(z: f32) -> f32 {
    1.0 / (1.0 + (-z).exp())
}

/// Soft/hard threshold applied to a raw similarity.
/// `eta == None` is the hard gate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Gate {
    pub lambda: f32,
    pub eta: Option<f32>,
}

impl Gate {
    pub fn new(lambda: f32, eta: Option<f32>) -> Self {
        Self { lambda, eta }
    }

    #[inline(always)]
    pub fn apply(&self, x: f32) -> f32 {
        match self.eta {
            None => {
                if x >= self.lambda {
                    x
                } else {
                    0.0
                }
            }
            Some(eta) => x * sigmoid(eta * (x - self.lambda)),
        }
    }
}

/// Linear interpolation of the gate threshold over the main epochs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdSchedule {
    pub start: f32,
    pub end: f32,
    pub epochs: usize,
}

impl ThresholdSchedule {
    pub fn new(start: f32, end: f32, epochs: usize) -> Self {
        Self { start, end, epochs }
    }

    pub fn lambda(&self, epoch: usize) -> f32 {
        let t = if self.epochs <= 1 {
            1.0
        } else {
            (epoch as f32 / (self.epochs - 1) as f32).clamp(0.0, 1.0)
        };
        self.start + (self.end - self.start) * t
    }
}

impl PairWeights for CodeSet {
    #[inline(always)]
    fn raw(&self, a: u32, b: u32) -> f32 {
        self.raw_similarity(a as usize, b as usize)
    }
}

/// Borrowed view of packed code words (`words_per_code` words per code).
#[derive(Debug, Clone, Copy)]
pub struct PackedCodes<'a> {
    pub words_per_code: usize,
    pub words: &'a [u64],
}

impl PairWeights for PackedCodes<'_> {
    #[inline(always)]
    fn raw(&self, a: u32, b: u32) -> f32 {
        if a == b {
            return 1.0;
        }
        let w = self.words_per_code;
        let (a, b) = (a as usize * w, b as usize * w);
        jaccard_words(&self.words[a..a + w], &self.words[b..b + w])
    }
}

/// Borrowed view of a row-major `n×n` similarity matrix.
#[derive(Debug, Clone, Copy)]
pub struct SimilarityMatrix<'a> {
    pub n: usize,
    pub values: &'a [f32],
}

impl PairWeights for SimilarityMatrix<'_> {
    #[inline(always)]
    fn raw(&self, a: u32, b: u32) -> f32 {
        self.values[a as usize * self.n + b as usize]
    }
}

/// Fills one row of the similarity matrix. Shared by the host cache build
/// and the device similarity kernel.
#[inline]
pub fn fill_similarity_row(codes: &PackedCodes<'_>, row: usize, out: &mut [f32]) {
    for (col, slot) in out.iter_mut().enumerate() {
        *slot = codes.raw(row as u32, col as u32);
    }
}

/// Host-side `n×n` raw similarity cache, diagonal 1.
#[derive(Debug, Clone)]
pub struct SimilarityCache {
    n: usize,
    values: Vec<f32>,
}

impl SimilarityCache {
    pub fn build(codes: &CodeSet) -> Self {
        let n = codes.len();
        let view = PackedCodes {
            words_per_code: codes.words_per_code(),
            words: codes.packed_words(),
        };
        let mut values = vec![0.0f32; n * n];
        values
            .par_chunks_mut(n)
            .enumerate()
            .for_each(|(row, out)| fill_similarity_row(&view, row, out));

        debug!("Built {}x{} similarity cache", n, n);
        Self { n, values }
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    pub fn get(&self, a: usize, b: usize) -> f32 {
        self.values[a * self.n + b]
    }

    pub fn as_matrix(&self) -> SimilarityMatrix<'_> {
        SimilarityMatrix {
            n: self.n,
            values: &self.values,
        }
    }
}

impl PairWeights for SimilarityCache {
    #[inline(always)]
    fn raw(&self, a: u32, b: u32) -> f32 {
        self.as_matrix().raw(a, b)
    }
}
