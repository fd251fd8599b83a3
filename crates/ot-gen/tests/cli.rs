//! End-to-end tests of the `ot-gen` binary.
//!
//! The dual run trains on the synthetic Gaussian-mixture target; MNIST needs
//! a download. The VAE run reads a handful of CIFAR-10 records written to a
//! temp directory in the binary batch format.

use std::path::Path;
use std::process::{Command, Output};

fn ot_gen(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_ot-gen"))
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("failed to spawn ot-gen")
}

fn write_config(dir: &Path) -> String {
    let path = dir.join("run.toml");
    std::fs::write(
        &path,
        "[icnn]\nhidden_dim = 8\nseed = 2\n\n[data]\nmixture_means = [-1.0, 1.0]\nmixture_stds = [0.3, 0.3]\nmixture_weights = [0.5, 0.5]\n",
    )
    .unwrap();
    path.display().to_string()
}

/// Five `data_batch_N.bin` files with two 3073-byte records each.
fn write_cifar_batches(dir: &Path) {
    for batch in 1..=5u8 {
        let mut bytes = Vec::new();
        for record in 0..2u8 {
            bytes.push(record);
            bytes.extend((0..3072).map(|p| ((p + batch as usize * 37) % 256) as u8));
        }
        std::fs::write(dir.join(format!("data_batch_{batch}.bin")), bytes).unwrap();
    }
}

#[test]
fn test_invalid_optimizer_fails_before_training() {
    let out = ot_gen(&["dual", "--optimizer", "adagrad", "--epoch", "50"]);
    assert!(!out.status.success());

    let stdout = String::from_utf8_lossy(&out.stdout);
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stdout.starts_with("Input arguments:\n"), "stdout: {stdout}");
    assert!(stderr.contains("Invalid Optimizer"), "stderr: {stderr}");
    assert!(!stdout.contains("Training completed!"));
}

#[test]
fn test_short_run_reports_zero_cadence() {
    let out = ot_gen(&["dual", "--epoch", "10"]);
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("print cadence"), "stderr: {stderr}");
}

#[test]
fn test_gaussian_mixture_run_writes_samples() {
    let dir = tempfile::TempDir::new().unwrap();
    let config = write_config(dir.path());
    let output = dir.path().join("mnist.png");

    let out = ot_gen(&[
        "dual",
        "--target",
        "gaussian-mixture",
        "--dims",
        "2",
        "--n",
        "64",
        "--epoch",
        "100",
        "--seed",
        "1",
        "--optimizer",
        "radam",
        "--config",
        &config,
        "--output",
        output.to_str().unwrap(),
    ]);
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(out.status.success(), "stdout: {stdout}\nstderr: {}", String::from_utf8_lossy(&out.stderr));

    // 100 epochs report every 2nd epoch
    let loss_lines = stdout
        .lines()
        .filter(|line| line.parse::<f64>().is_ok())
        .count();
    assert_eq!(loss_lines, 50);
    assert_eq!(stdout.lines().last(), Some("Training completed!"));
    assert!(stdout.contains("\noptimizer        radam\n"));

    let json = std::fs::read_to_string(dir.path().join("samples.json")).unwrap();
    let rows: Vec<Vec<f32>> = serde_json::from_str(&json).unwrap();
    assert_eq!(rows.len(), 64);
    assert!(rows.iter().all(|row| row.len() == 2));
    assert!(!output.exists());
}

#[test]
fn test_vae_run_with_default_config_writes_grid() {
    let dir = tempfile::TempDir::new().unwrap();
    let data_dir = dir.path().join("cifar");
    std::fs::create_dir(&data_dir).unwrap();
    write_cifar_batches(&data_dir);
    let output = dir.path().join("cifar.png");

    let out = ot_gen(&[
        "vae",
        "--epoch",
        "2",
        "--batch-size",
        "4",
        "--dims",
        "8",
        "--seed",
        "3",
        "--gen-theor",
        "--data-dir",
        data_dir.to_str().unwrap(),
        "--output",
        output.to_str().unwrap(),
    ]);
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(out.status.success(), "stdout: {stdout}\nstderr: {}", String::from_utf8_lossy(&out.stderr));

    let epochs: Vec<&str> = stdout.lines().filter(|line| line.starts_with("Epoch ")).collect();
    assert_eq!(epochs.len(), 2, "stdout: {stdout}");
    assert!(epochs[0].starts_with("Epoch 1 : "));
    assert!(epochs[1].starts_with("Epoch 2 : "));
    assert!(epochs[1]["Epoch 2 : ".len()..].parse::<f64>().is_ok());
    assert_eq!(stdout.lines().last(), Some("Training completed!"));

    let png = std::fs::read(&output).unwrap();
    assert!(png.starts_with(&[0x89, b'P', b'N', b'G']));
}

#[test]
fn test_vae_missing_data_dir_fails() {
    let dir = tempfile::TempDir::new().unwrap();
    let out = ot_gen(&[
        "vae",
        "--data-dir",
        dir.path().join("absent").to_str().unwrap(),
        "--output",
        dir.path().join("cifar.png").to_str().unwrap(),
    ]);
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("loading CIFAR-10"), "stderr: {stderr}");
}
