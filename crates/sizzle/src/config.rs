//! Stage configuration, read once at setup.

use std::path::PathBuf;
use std::time::Duration;
use serde::Deserialize;
use crate::communication::InputPorts;
use crate::error::ConfigError;

/// How the downstream sender reacts to a full transport.
///
/// The default retries forever with a fixed 200ms delay, holding the stage
/// until downstream drains rather than dropping results.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Delay between attempts
    pub interval_ms: u64,

    /// Give up after this many retries; `None` retries forever
    pub max_retries: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval_ms: 200,
            max_retries: None,
        }
    }
}

impl RetryPolicy {
    pub fn unbounded(interval: Duration) -> Self {
        Self {
            interval_ms: interval.as_millis() as u64,
            max_retries: None,
        }
    }

    pub fn bounded(interval: Duration, max_retries: u32) -> Self {
        Self {
            interval_ms: interval.as_millis() as u64,
            max_retries: Some(max_retries),
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Whether another attempt is allowed after `retries` retries.
    pub fn allows(&self, retries: u32) -> bool {
        self.max_retries.is_none_or(|max| retries < max)
    }
}

/// Configuration of one inference stage.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EngineConfig {
    pub model_path: PathBuf,

    #[serde(default = "default_ports")]
    pub input_ports: InputPorts,

    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_ports() -> InputPorts {
    InputPorts::Single
}

impl EngineConfig {
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            input_ports: InputPorts::Single,
            retry: RetryPolicy::default(),
        }
    }

    /// Builds the config from graph-style `name = value` items.
    ///
    /// Recognised names are `model_path`, `input_size` (`1` or `2`),
    /// `send_retry_interval_ms` and `send_max_retries`. Unknown names are
    /// ignored.
    pub fn from_items<I, K, V>(items: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut model_path = None;
        let mut input_ports = InputPorts::Single;
        let mut retry = RetryPolicy::default();

        for (name, value) in items {
            let (name, value) = (name.as_ref(), value.as_ref());
            match name {
                "model_path" if !value.is_empty() => model_path = Some(PathBuf::from(value)),
                "model_path" => return Err(ConfigError::MissingModelPath),
                "input_size" => {
                    input_ports = match value {
                        "1" => InputPorts::Single,
                        "2" => InputPorts::Dual,
                        _ => return Err(invalid(name, value)),
                    }
                }
                "send_retry_interval_ms" => retry.interval_ms = value.parse().map_err(|_| invalid(name, value))?,
                "send_max_retries" => retry.max_retries = Some(value.parse().map_err(|_| invalid(name, value))?),
                _ => tracing::debug!(name, "unused config item"),
            }
        }

        Ok(Self {
            model_path: model_path.ok_or(ConfigError::MissingModelPath)?,
            input_ports,
            retry,
        })
    }

    /// The model name: the text of `model_path` after the last path separator
    /// (`/` or a backslash), up to its last `.`.
    pub fn model_name(&self) -> String {
        model_name(&self.model_path.to_string_lossy())
    }
}

fn model_name(path: &str) -> String {
    let file = path.rsplit(['/', '\\']).next().unwrap_or(path);
    let stem = file.rsplit_once('.').map_or(file, |(stem, _)| stem);
    stem.to_string()
}

fn invalid(name: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        name: name.to_string(),
        value: value.to_string(),
    }
}
