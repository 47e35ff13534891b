//! Channel-count mixing matrices used by `Server::get_block` when the
//! caller's requested channel count differs from the output node's.

use std::collections::HashMap;

#[cfg(not(feature = "std"))]
extern crate alloc;
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

/// A dense `out_channels x in_channels` gain matrix.
#[derive(Debug, Clone)]
pub struct MixMatrix {
    in_channels: usize,
    out_channels: usize,
    /// Row-major: `weights[out * in_channels + in]`.
    weights: Vec<f32>,
}

impl MixMatrix {
    /// Builds a matrix from a row-major weight vector.
    pub fn new(in_channels: usize, out_channels: usize, weights: Vec<f32>) -> Self {
        debug_assert_eq!(weights.len(), in_channels * out_channels);
        Self { in_channels, out_channels, weights }
    }

    /// An identity-like matrix: channel `i` maps straight to output `i`
    /// for `i < min(in, out)`; remaining inputs are dropped, remaining
    /// outputs are silent.
    pub fn identity(in_channels: usize, out_channels: usize) -> Self {
        let mut weights = vec![0.0; in_channels * out_channels];
        for i in 0..in_channels.min(out_channels) {
            weights[i * in_channels + i] = 1.0;
        }
        Self { in_channels, out_channels, weights }
    }

    /// Applies the matrix to one frame of `in_channels` input samples,
    /// writing `out_channels` output samples.
    pub fn apply_frame(&self, input: &[f32], output: &mut [f32]) {
        for o in 0..self.out_channels {
            let mut sum = 0.0;
            for i in 0..self.in_channels {
                sum += self.weights[o * self.in_channels + i] * input[i];
            }
            output[o] = sum;
        }
    }
}

/// Keyed registry of default and custom mixing matrices, owned by the Server.
#[derive(Default)]
pub struct MixMatrixRegistry {
    matrices: HashMap<(usize, usize), MixMatrix>,
}

impl MixMatrixRegistry {
    /// Builds a registry pre-populated with the standard defaults
    /// (mono<->stereo, 5.1 up/downmix, 7.1 up/downmix). Missing pairs
    /// fall back to [`MixMatrix::identity`] at lookup time.
    pub fn with_defaults() -> Self {
        let mut reg = Self::default();
        reg.register(1, 2, MixMatrix::new(1, 2, vec![1.0, 1.0]));
        reg.register(2, 1, MixMatrix::new(2, 1, vec![0.5, 0.5]));
        reg.register(2, 6, MixMatrix::new(2, 6, vec![
            1.0, 0.0, // front-left
            0.0, 1.0, // front-right
            0.5, 0.5, // center
            0.0, 0.0, // lfe
            0.0, 0.0, // surround-left
            0.0, 0.0, // surround-right
        ]));
        reg.register(6, 2, MixMatrix::new(6, 2, vec![
            1.0, 0.0, 0.7, 0.0, 0.7, 0.0,
            0.0, 1.0, 0.7, 0.0, 0.0, 0.7,
        ]));
        reg.register(2, 8, MixMatrix::new(2, 8, vec![
            1.0, 0.0,
            0.0, 1.0,
            0.5, 0.5,
            0.0, 0.0,
            0.0, 0.0,
            0.0, 0.0,
            0.7, 0.0,
            0.0, 0.7,
        ]));
        reg.register(8, 2, MixMatrix::new(8, 2, vec![
            1.0, 0.0, 0.7, 0.0, 0.7, 0.0, 0.5, 0.0, 0.5, 0.0, 0.0, 0.0, 0.7, 0.0, 0.0, 0.5,
        ]));
        reg
    }

    /// Registers (or replaces) the matrix for `(in_channels, out_channels)`.
    pub fn register(&mut self, in_channels: usize, out_channels: usize, matrix: MixMatrix) {
        self.matrices.insert((in_channels, out_channels), matrix);
    }

    /// Looks up the matrix for `(in_channels, out_channels)`, falling back
    /// to identity if none was registered.
    pub fn lookup(&self, in_channels: usize, out_channels: usize) -> MixMatrix {
        self.matrices
            .get(&(in_channels, out_channels))
            .cloned()
            .unwrap_or_else(|| MixMatrix::identity(in_channels, out_channels))
    }
}
