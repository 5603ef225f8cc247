//! Shared fixtures for integration tests

#![allow(dead_code)]

use gaussian_mixtures::MultivariateGaussian;
use ndarray::{array, concatenate, Array1, Array2, Axis};
use rand::prelude::*;

/// Random 2×2 SPD matrix with eigenvalues in [0.5, 1.0] and a random orientation
pub fn random_spd_2d<R: Rng>(rng: &mut R) -> Array2<f64> {
    let theta: f64 = rng.gen_range(0.0..std::f64::consts::PI);
    let (s, c) = theta.sin_cos();
    let rotation = array![[c, -s], [s, c]];
    let eigen = Array2::from_diag(&array![rng.gen_range(0.5..1.0), rng.gen_range(0.5..1.0)]);
    let m = rotation.dot(&eigen).dot(&rotation.t());
    // exact symmetry
    (&m + &m.t()) / 2.0
}

/// `n` samples from N(mean, cov)
pub fn sample_gaussian<R: Rng>(mean: Array1<f64>, cov: Array2<f64>, n: usize, rng: &mut R) -> Array2<f64> {
    let g = MultivariateGaussian::new(mean, cov).unwrap();
    let mut out = Array2::zeros((n, g.dim()));
    for mut row in out.rows_mut() {
        row.assign(&g.sample(rng));
    }
    out
}

/// Stack per-component sample blocks, returning the data and generating labels
pub fn stack_blocks(blocks: &[Array2<f64>]) -> (Array2<f64>, Vec<usize>) {
    let views: Vec<_> = blocks.iter().map(|b| b.view()).collect();
    let data = concatenate(Axis(0), &views).unwrap();
    let labels = blocks
        .iter()
        .enumerate()
        .flat_map(|(k, b)| std::iter::repeat(k).take(b.nrows()))
        .collect();
    (data, labels)
}

/// Whether `found` equals `expected` up to a relabeling of components
pub fn same_partition(found: &[usize], expected: &[usize]) -> bool {
    use std::collections::HashMap;
    let mut forward = HashMap::new();
    let mut backward = HashMap::new();
    found.len() == expected.len()
        && found.iter().zip(expected).all(|(&f, &e)| {
            *forward.entry(f).or_insert(e) == e && *backward.entry(e).or_insert(f) == f
        })
}
