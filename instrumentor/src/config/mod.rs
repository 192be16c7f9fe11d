mod error;
mod failure_policy;

use std::path::{Path, PathBuf};

use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use resolve_path::PathResolveExt;
use serde::{Deserialize, Serialize};
use snafu::ResultExt;

pub use self::{
    error::Error,
    failure_policy::{FailurePolicy, ParseFailurePolicyError},
};
use crate::instrumentation::{InjectOptions, Instrumentation, Runtime, default_volume_size_limit};

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Scratch size for descriptors that set neither `volumeSizeLimit` nor
    /// `volumeClaimTemplate`.
    #[serde(default = "default_volume_size_limit")]
    pub default_volume_size_limit: Quantity,

    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// Descriptors applied to every pod handed to the mutator.
    #[serde(default = "Vec::new")]
    pub instrumentations: Vec<Instrumentation>,

    #[serde(default = "instrumentor_cli::config::LogConfig::default")]
    pub log: instrumentor_cli::config::LogConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_volume_size_limit: default_volume_size_limit(),
            failure_policy: FailurePolicy::default(),
            instrumentations: Vec::new(),
            log: instrumentor_cli::config::LogConfig::default(),
        }
    }
}

impl Config {
    /// The first existing file among the default path and the fallback
    /// directories, or the default path when none exists.
    #[must_use]
    pub fn search_config_file_path() -> PathBuf {
        let paths = vec![Self::default_path()]
            .into_iter()
            .chain(instrumentor_base::fallback_project_config_directories().into_iter().map(
                |mut path| {
                    path.push(instrumentor_base::CLI_CONFIG_NAME);
                    path
                },
            ))
            .collect::<Vec<_>>();
        for path in paths {
            let Ok(exists) = path.try_exists() else {
                continue;
            };
            if exists {
                return path;
            }
        }
        Self::default_path()
    }

    #[inline]
    #[must_use]
    pub fn default_path() -> PathBuf {
        [
            instrumentor_base::PROJECT_CONFIG_DIR.to_path_buf(),
            PathBuf::from(instrumentor_base::CLI_CONFIG_NAME),
        ]
        .into_iter()
        .collect()
    }

    /// Reads and parses the configuration at `path`, resolving `~` in it and
    /// in the log file path.
    ///
    /// # Errors
    ///
    /// Returns an error if a path cannot be resolved or the file cannot be
    /// read or parsed.
    #[inline]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let mut config: Self = {
            let path =
                path.as_ref().try_resolve().map(|path| path.to_path_buf()).with_context(|_| {
                    error::ResolveFilePathSnafu { file_path: path.as_ref().to_path_buf() }
                })?;
            let data =
                std::fs::read(&path).context(error::OpenConfigSnafu { filename: path.clone() })?;
            serde_yaml::from_slice(&data).context(error::ParseConfigSnafu { filename: path })?
        };

        config.log.file_path = match config.log.file_path.map(|path| {
            path.try_resolve()
                .map(|path| path.to_path_buf())
                .with_context(|_| error::ResolveFilePathSnafu { file_path: path.clone() })
        }) {
            Some(Ok(path)) => Some(path),
            Some(Err(err)) => return Err(err),
            None => None,
        };

        Ok(config)
    }

    /// The default configuration rendered as YAML.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SerializeConfig`] if rendering fails.
    pub fn template_basic() -> Result<Vec<u8>, Error> {
        serde_yaml::to_string(&Self::default())
            .map(String::into_bytes)
            .context(error::SerializeConfigSnafu)
    }

    #[must_use]
    pub fn inject_options(&self) -> InjectOptions {
        InjectOptions { default_volume_size_limit: self.default_volume_size_limit.clone() }
    }

    /// Drops every descriptor whose runtime is not in `runtimes`. An empty
    /// `runtimes` keeps them all.
    pub fn retain_runtimes(&mut self, runtimes: &[Runtime]) {
        if !runtimes.is_empty() {
            self.instrumentations.retain(|descriptor| runtimes.contains(&descriptor.runtime));
        }
    }
}
