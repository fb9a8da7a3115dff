//! Resource quotas
//!
//! A [`ResourceQuota`] declares the compute a runner may use. It is plain
//! data: the runner sizes itself from it and never adjusts it afterwards.
//!
//! [`ResourceQuota::detect`] builds the "whole machine" default. Detection
//! uses filesystem probes and `nvidia-smi` rather than linking GPU libraries.

use crate::error::{RunnerError, RunnerResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use sysinfo::{CpuRefreshKind, RefreshKind, System};

/// Declared CPU share and GPU devices available to a runner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceQuota {
    /// Fractional core count
    pub cpu: f64,
    /// Ordered GPU device identifiers; empty for CPU-only
    #[serde(default)]
    pub gpus: Vec<String>,
}

impl ResourceQuota {
    pub fn new(cpu: f64, gpus: Vec<String>) -> RunnerResult<Self> {
        let quota = Self { cpu, gpus };
        quota.validate()?;
        Ok(quota)
    }

    /// CPU-only quota
    pub fn cpu(cpu: f64) -> RunnerResult<Self> {
        Self::new(cpu, Vec::new())
    }

    pub fn validate(&self) -> RunnerResult<()> {
        if !self.cpu.is_finite() || self.cpu < 0.0 {
            return Err(RunnerError::Config(format!(
                "resource quota cpu must be a finite value >= 0, got {}",
                self.cpu
            )));
        }
        if self.gpus.iter().any(|g| g.trim().is_empty()) {
            return Err(RunnerError::Config(
                "resource quota gpu identifiers must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// True iff at least one GPU device is declared
    pub fn on_gpu(&self) -> bool {
        !self.gpus.is_empty()
    }

    /// Whole-machine quota: every logical CPU and every visible NVIDIA GPU.
    ///
    /// Runs synchronously and spawns `nvidia-smi`; call it once from the
    /// composition root, not per request.
    pub fn detect() -> Self {
        let gpus = detect_cuda_devices();
        let quota = Self {
            cpu: num_cpus() as f64,
            gpus,
        };
        tracing::debug!(cpu = quota.cpu, gpus = ?quota.gpus, "detected resource quota");
        quota
    }
}

/// Indices of visible CUDA devices, empty when none are present.
///
/// Detection strategy:
/// 1. Check for the `/dev/nvidia0` device node (kernel module loaded)
/// 2. List device indices with `nvidia-smi --query-gpu=index`
fn detect_cuda_devices() -> Vec<String> {
    if !Path::new("/dev/nvidia0").exists() {
        return Vec::new();
    }

    let output = match std::process::Command::new("nvidia-smi")
        .args(["--query-gpu=index", "--format=csv,noheader"])
        .output()
    {
        Ok(output) if output.status.success() => output,
        _ => return Vec::new(),
    };

    parse_device_list(&String::from_utf8_lossy(&output.stdout))
}

fn parse_device_list(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && line.chars().all(|c| c.is_ascii_digit()))
        .map(str::to_string)
        .collect()
}

fn num_cpus() -> usize {
    let sys =
        System::new_with_specifics(RefreshKind::new().with_cpu(CpuRefreshKind::new()));
    match sys.cpus().len() {
        0 => std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1),
        n => n,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_on_gpu_derived_from_device_list() {
        assert!(!ResourceQuota::cpu(4.0).unwrap().on_gpu());
        let quota = ResourceQuota::new(4.0, vec!["0".into(), "1".into()]).unwrap();
        assert!(quota.on_gpu());
    }

    #[test]
    fn test_rejects_negative_or_nan_cpu() {
        assert!(matches!(
            ResourceQuota::cpu(-1.0),
            Err(RunnerError::Config(_))
        ));
        assert!(ResourceQuota::cpu(f64::NAN).is_err());
        assert!(ResourceQuota::new(1.0, vec![" ".into()]).is_err());
    }

    #[test]
    fn test_parse_device_list() {
        assert_eq!(parse_device_list("0\n1\n"), vec!["0", "1"]);
        assert!(parse_device_list("No devices were found\n").is_empty());
    }

    #[test]
    fn test_detect_reports_cpus() {
        let quota = ResourceQuota::detect();
        assert!(quota.cpu >= 1.0);
        assert!(quota.validate().is_ok());
    }

    #[test]
    fn test_serde_gpus_default_empty() {
        let quota: ResourceQuota = serde_json::from_str(r#"{"cpu": 2.5}"#).unwrap();
        assert_eq!(quota.cpu, 2.5);
        assert!(quota.gpus.is_empty());
    }
}
