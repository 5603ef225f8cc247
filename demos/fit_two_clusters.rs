//! Fit a two-component mixture to synthetic data
//!
//! Draws 500 samples from a known mixture, fits a fresh model with EM and
//! prints the recovered parameters next to the generating ones.
//!
//! Run with `RUST_LOG=gaussian_mixtures=debug` to see every iteration.

use gaussian_mixtures::prelude::*;
use ndarray::{array, stack, Axis};
use rand::prelude::*;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("=== Gaussian Mixture EM Example ===\n");

    let truth = GaussianMixtureModel::new(
        array![[-3.0, 0.0], [3.0, 2.0]],
        stack![
            Axis(0),
            array![[1.0, 0.6], [0.6, 1.0]],
            array![[0.5, -0.2], [-0.2, 1.5]]
        ],
        array![0.4, 0.6],
    )?;

    let mut rng = StdRng::seed_from_u64(2024);
    let (data, labels) = truth.sample(500, &mut rng)?;
    println!("Generated {} samples with {} features", data.nrows(), data.ncols());

    let config = FitConfig::new(2)
        .random_seed(7)
        .max_iterations(200)
        .empty_component_policy(EmptyComponentPolicy::reseed());
    let result = fit(data.view(), &config)?;

    println!("\nStopped after {} iterations ({:?})", result.iterations, result.stop_reason);
    println!("Log-likelihood: {:.4}", result.log_likelihood);
    println!("Trajectory:");
    for (i, ll) in result.trajectory.iter().enumerate() {
        println!("  {:>3}: {:.4}", i, ll);
    }

    println!("\nFitted parameters:");
    for k in 0..result.model.n_components() {
        let component = result.model.component(k)?;
        println!("  Component {}:", k);
        println!("    weight:     {:.3}", result.model.weights()[k]);
        println!("    mean:       {:.3}", component.mean());
        println!("    covariance: {:.3}", component.covariance());
    }

    println!("\nGenerating parameters:");
    println!("  weights: {:.3}", truth.weights());
    println!("  means:   {:.3}", truth.means());

    // Fitted labels are a permutation of the generating ones
    let predicted = result.labels();
    let agree = predicted.iter().zip(&labels).filter(|(a, b)| a == b).count();
    let accuracy = agree.max(labels.len() - agree) as f64 / labels.len() as f64;
    println!("\nLabel agreement (up to relabelling): {:.1}%", accuracy * 100.0);

    let held_out = array![[-3.0, 0.0], [3.0, 2.0], [0.0, 1.0]];
    println!("\nHeld-out points:");
    for (point, label) in held_out.outer_iter().zip(predict(&result.model, held_out.view())?) {
        println!("  {} -> component {}", point, label);
    }

    Ok(())
}
