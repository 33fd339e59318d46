//! Deserializable cache configuration.
//!
//! Durations are written in humantime notation (`"3s"`, `"250ms"`, `"1m"`).
//! Every field is optional; omitted fields keep the [`Options`] defaults.
//!
//! ```yaml
//! consistency: strong
//! batch_size: 50
//! lock_duration: 2s
//! fresh_ttl: 5m
//! empty_ttl: 30s
//! ```

use crate::error::BuildError;
use crate::options::{Consistency, Options};

use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct OptionsConfig {
  #[serde(default)]
  pub consistency: Option<Consistency>,
  #[serde(default)]
  pub disable_cache_read: Option<bool>,
  #[serde(default)]
  pub disable_cache_delete: Option<bool>,
  #[serde(default)]
  pub batch_size: Option<usize>,
  #[serde(default)]
  pub lock_duration: Option<String>,
  #[serde(default)]
  pub fresh_ttl: Option<String>,
  #[serde(default)]
  pub empty_ttl: Option<String>,
  #[serde(default)]
  pub lock_sleep: Option<String>,
  #[serde(default)]
  pub max_backoff: Option<String>,
  #[serde(default)]
  pub wait_timeout: Option<String>,
  #[serde(default)]
  pub random_expire_adjustment: Option<f64>,
  #[serde(default)]
  pub delete_retention: Option<String>,
}

fn parse_duration(field: &str, raw: &str) -> Result<Duration, BuildError> {
  humantime::parse_duration(raw).map_err(|e| BuildError::InvalidConfigValue {
    field: field.to_string(),
    message: e.to_string(),
  })
}

fn override_duration(
  target: &mut Duration,
  field: &str,
  raw: &Option<String>,
) -> Result<(), BuildError> {
  if let Some(raw) = raw {
    *target = parse_duration(field, raw)?;
  }
  Ok(())
}

impl OptionsConfig {
  /// Parses a YAML document.
  pub fn from_yaml_str(yaml: &str) -> Result<Self, BuildError> {
    serde_yaml::from_str(yaml).map_err(|e| BuildError::ConfigParse(e.to_string()))
  }

  /// Applies this configuration on top of `base` and validates the result.
  pub fn apply_to(&self, base: Options) -> Result<Options, BuildError> {
    let mut options = base;
    if let Some(consistency) = self.consistency {
      options.consistency = consistency;
    }
    if let Some(flag) = self.disable_cache_read {
      options.disable_cache_read = flag;
    }
    if let Some(flag) = self.disable_cache_delete {
      options.disable_cache_delete = flag;
    }
    if let Some(size) = self.batch_size {
      options.batch_size = size;
    }
    override_duration(&mut options.lock_duration, "lock_duration", &self.lock_duration)?;
    override_duration(&mut options.fresh_ttl, "fresh_ttl", &self.fresh_ttl)?;
    override_duration(&mut options.lock_sleep, "lock_sleep", &self.lock_sleep)?;
    override_duration(&mut options.max_backoff, "max_backoff", &self.max_backoff)?;
    override_duration(&mut options.wait_timeout, "wait_timeout", &self.wait_timeout)?;
    override_duration(
      &mut options.delete_retention,
      "delete_retention",
      &self.delete_retention,
    )?;
    if let Some(raw) = &self.empty_ttl {
      options.empty_ttl = Some(parse_duration("empty_ttl", raw)?);
    }
    if let Some(adjustment) = self.random_expire_adjustment {
      options.random_expire_adjustment = adjustment;
    }

    options.validate()?;
    Ok(options)
  }

  /// Builds validated [`Options`] from defaults plus this configuration.
  pub fn into_options(self) -> Result<Options, BuildError> {
    self.apply_to(Options::default())
  }
}
