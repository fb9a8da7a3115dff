//! Resource-driven sizing
//!
//! Turns a [`ResourceQuota`] into replica and concurrency counts:
//!
//! - GPU quota: one replica per declared device, one request slot each, one
//!   host thread per replica.
//! - CPU quota: a single replica whose concurrency is the explicit thread
//!   override if there is one, else the rounded CPU share.
//!
//! [`plan`] is pure: same quota and override, same answer.

use modelrun_kernel::{ResourceQuota, RunnerError, RunnerResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a GPU replica picks its device index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceAssignment {
    /// Every replica runs on device 0.
    ///
    /// Known limitation: with several GPUs declared all replicas still
    /// target device 0 unless the process is launched with a per-replica
    /// device mask.
    #[default]
    Pinned,
    /// Replica `i` runs on the `i`-th device of the quota
    PerReplica,
}

impl fmt::Display for DeviceAssignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceAssignment::Pinned => write!(f, "pinned"),
            DeviceAssignment::PerReplica => write!(f, "per_replica"),
        }
    }
}

impl FromStr for DeviceAssignment {
    type Err = RunnerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pinned" => Ok(Self::Pinned),
            "per_replica" | "per-replica" => Ok(Self::PerReplica),
            other => Err(RunnerError::Config(format!(
                "unknown device assignment {other:?}, expected pinned or per_replica"
            ))),
        }
    }
}

/// Computed replica/concurrency plan for one runner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Sizing {
    pub replicas: usize,
    pub concurrency_per_replica: usize,
    /// Host threads handed to the native engine per replica
    pub threads: usize,
    pub on_gpu: bool,
    /// GPU device index for this replica; `None` on CPU
    pub device: Option<u32>,
}

impl Sizing {
    /// Total concurrent batch calls this runner can take
    pub fn capacity(&self) -> usize {
        self.replicas * self.concurrency_per_replica
    }
}

/// Size a runner for `quota`.
///
/// `thread_override` is the explicit per-replica thread count from the
/// merged options (already filtered of the "use all available" sentinel).
/// `replica_index` selects the device under [`DeviceAssignment::PerReplica`].
///
/// # Errors
/// - `RunnerError::Config` when the replica index is outside the device list
///   or a device identifier is not an integer index
pub fn plan(
    quota: &ResourceQuota,
    thread_override: Option<usize>,
    assignment: DeviceAssignment,
    replica_index: usize,
) -> RunnerResult<Sizing> {
    if quota.on_gpu() {
        let device = match assignment {
            DeviceAssignment::Pinned => 0,
            DeviceAssignment::PerReplica => device_for(quota, replica_index)?,
        };
        return Ok(Sizing {
            replicas: quota.gpus.len(),
            concurrency_per_replica: 1,
            threads: 1,
            on_gpu: true,
            device: Some(device),
        });
    }

    let threads = rounded_cpu(quota.cpu);
    Ok(Sizing {
        replicas: 1,
        concurrency_per_replica: thread_override.filter(|&n| n > 0).unwrap_or(threads),
        threads,
        on_gpu: false,
        device: None,
    })
}

/// Round-half-to-even, never below one thread.
pub fn rounded_cpu(cpu: f64) -> usize {
    (cpu.round_ties_even() as usize).max(1)
}

fn device_for(quota: &ResourceQuota, replica_index: usize) -> RunnerResult<u32> {
    let id = quota.gpus.get(replica_index).ok_or_else(|| {
        RunnerError::Config(format!(
            "replica index {replica_index} is out of range for {} declared GPUs",
            quota.gpus.len()
        ))
    })?;
    id.trim().parse().map_err(|_| {
        RunnerError::Config(format!("GPU identifier {id:?} is not a device index"))
    })
}
