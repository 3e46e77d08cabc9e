use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

pub const DEFAULT_CONFIG_FILE: &str = "slatrack.toml";

pub const ENV_INPUT: &str = "SLATRACK_INPUT";
pub const ENV_OUTPUT_DIR: &str = "SLATRACK_OUTPUT_DIR";
pub const ENV_CHART_DIR: &str = "SLATRACK_CHART_DIR";
pub const ENV_AS_OF: &str = "SLATRACK_AS_OF";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub chart_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from("data/raw/requests.csv"),
            output_dir: PathBuf::from("outputs"),
            chart_dir: PathBuf::from("images"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Reporting date for request ages. Defaults to today in `timezone`.
    pub as_of: Option<NaiveDate>,
    pub timezone: String,
    pub validate_due_dates: bool,
    pub charts: bool,
    pub sql_export: bool,
    pub log_format: LogFormat,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            as_of: None,
            timezone: "UTC".to_string(),
            validate_due_dates: true,
            charts: true,
            sql_export: true,
            log_format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub seed: u64,
    pub count: usize,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            count: 240,
            start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default(),
            end: NaiveDate::from_ymd_opt(2025, 12, 31).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub paths: PathsConfig,
    pub run: RunConfig,
    pub generator: GeneratorConfig,
}

impl PipelineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|err| PipelineError::Config(format!("invalid configuration: {err}")))
    }

    /// Loads `path` when given (it must exist), else `slatrack.toml` in the working
    /// directory when present, else the built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let candidate = match path {
            Some(explicit) => Some(explicit.to_path_buf()),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                default.is_file().then_some(default)
            }
        };

        match candidate {
            Some(file) => {
                let content =
                    fs::read_to_string(&file).map_err(|err| PipelineError::io(&file, err))?;
                Self::from_toml_str(&content)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Applies `SLATRACK_*` overrides from an arbitrary lookup. Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(input) = lookup(ENV_INPUT) {
            self.paths.input = PathBuf::from(input);
        }
        if let Some(output_dir) = lookup(ENV_OUTPUT_DIR) {
            self.paths.output_dir = PathBuf::from(output_dir);
        }
        if let Some(chart_dir) = lookup(ENV_CHART_DIR) {
            self.paths.chart_dir = PathBuf::from(chart_dir);
        }
        if let Some(as_of) = lookup(ENV_AS_OF) {
            let parsed = NaiveDate::parse_from_str(as_of.trim(), "%Y-%m-%d").map_err(|err| {
                PipelineError::Config(format!("{ENV_AS_OF}='{as_of}' is not a YYYY-MM-DD date: {err}"))
            })?;
            self.run.as_of = Some(parsed);
        }
        Ok(())
    }

    pub fn timezone(&self) -> Result<Tz> {
        self.run.timezone.parse::<Tz>().map_err(|err| {
            PipelineError::Config(format!("unknown timezone '{}': {err}", self.run.timezone))
        })
    }

    /// The pinned `as_of` date, or the calendar date of `now` in the configured timezone.
    pub fn resolve_as_of(&self, now: DateTime<Utc>) -> Result<NaiveDate> {
        let tz = self.timezone()?;
        Ok(self
            .run
            .as_of
            .unwrap_or_else(|| now.with_timezone(&tz).date_naive()))
    }
}
