//! CLI context: the composition root wiring config, store and adapters once

use crate::cli::RunnerArgs;
use crate::error::{CliError, CliResult};
use modelrun_kernel::config::AppConfig;
use modelrun_kernel::{Options, ResourceQuota, Tag};
use modelrun_runner::xgboost::XgboostAdapter;
use modelrun_runner::{AdapterRegistry, DeviceAssignment, PredictMode, RunnerBuilder};
use modelrun_store::LocalModelStore;
use std::path::{Path, PathBuf};

const HOME_DIR: &str = ".modelrun";
const CONFIG_FILE: &str = "config.toml";
const MODELS_DIR: &str = "models";

/// Shared context for CLI commands
pub struct CliContext {
    pub config: AppConfig,
    pub store: LocalModelStore,
    pub registry: AdapterRegistry,
    /// Configuration file that was loaded, if any
    pub config_path: Option<PathBuf>,
}

impl CliContext {
    pub fn new(config_path: Option<&Path>, store_override: Option<&Path>) -> CliResult<Self> {
        let home = modelrun_home()?;
        let config_path = match config_path {
            Some(path) => Some(path.to_path_buf()),
            None => Some(home.join(CONFIG_FILE)).filter(|p| p.is_file()),
        };

        let mut config = AppConfig::load(config_path.as_deref(), &home.join(MODELS_DIR))?;
        if let Some(root) = store_override {
            config.store_root = root.to_path_buf();
        }
        tracing::debug!(store_root = %config.store_root.display(), "configuration loaded");

        let store = LocalModelStore::new(&config.store_root)?;
        let mut registry = AdapterRegistry::new();
        registry.register(&XgboostAdapter::new())?;

        Ok(Self {
            config,
            store,
            registry,
            config_path,
        })
    }

    /// Quota from the arguments, then the configuration, then the machine
    pub fn quota(&self, args: &RunnerArgs) -> CliResult<ResourceQuota> {
        if args.cpu.is_none() && args.gpus.is_empty() {
            return Ok(self
                .config
                .resources
                .clone()
                .unwrap_or_else(ResourceQuota::detect));
        }
        let cpu = match args.cpu {
            Some(cpu) => cpu,
            None => self
                .config
                .resources
                .as_ref()
                .map_or_else(|| ResourceQuota::detect().cpu, |q| q.cpu),
        };
        Ok(ResourceQuota::new(cpu, args.gpus.clone())?)
    }

    /// Runner builder configured from the shared arguments
    pub fn runner_builder(&self, tag: &str, args: &RunnerArgs) -> CliResult<RunnerBuilder> {
        let mode: PredictMode = args
            .mode
            .as_deref()
            .unwrap_or(&self.config.default_predict_mode)
            .parse()?;
        let assignment: DeviceAssignment = args.device_assignment.parse()?;

        Ok(RunnerBuilder::new(Tag::parse(tag)?)
            .options(parse_assignments(&args.options)?)
            .resource_quota(self.quota(args)?)
            .predict_mode(mode)
            .device_assignment(assignment)
            .replica_index(args.replica_index))
    }
}

/// `~/.modelrun`
pub fn modelrun_home() -> CliResult<PathBuf> {
    let home = dirs_next::home_dir()
        .ok_or_else(|| CliError::Other("Failed to determine home directory".to_string()))?;
    Ok(home.join(HOME_DIR))
}

/// Parse repeated `key=value` arguments into options
pub fn parse_assignments(raw: &[String]) -> CliResult<Options> {
    raw.iter()
        .map(|item| {
            Options::parse_assignment(item).ok_or_else(|| {
                CliError::InvalidArgument(format!("expected KEY=VALUE, got {item:?}"))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_assignments() {
        let options =
            parse_assignments(&["nthread=4".to_string(), "objective=binary:logistic".into()])
                .unwrap();
        assert_eq!(options.get_i64("nthread"), Some(4));
        assert_eq!(
            options.get("objective").and_then(|v| v.as_str()),
            Some("binary:logistic")
        );
        assert!(parse_assignments(&["novalue".to_string()]).is_err());
    }

    #[test]
    fn test_context_with_explicit_store() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = dir.path().join("modelrun.yaml");
        std::fs::write(&config, "resources:\n  cpu: 2\n").unwrap();

        let ctx = CliContext::new(Some(&config), Some(&dir.path().join("models"))).unwrap();
        assert!(ctx.registry.get("modelrun.xgboost").is_some());

        let quota = ctx.quota(&RunnerArgs::default()).unwrap();
        assert_eq!(quota.cpu, 2.0);
        let quota = ctx
            .quota(&RunnerArgs {
                gpus: vec!["0".into()],
                ..Default::default()
            })
            .unwrap();
        assert_eq!(quota.cpu, 2.0);
        assert!(quota.on_gpu());
    }
}
