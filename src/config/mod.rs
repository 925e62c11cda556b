use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::oracle::FieldMarker;
use crate::sweep::{DEFAULT_COUNT, DEFAULT_LOOKBACK, SweepSettings};

const CONFIG_FILENAME: &str = "config.toml";
const CONFIG_DIR: &str = ".vmprobe";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ChannelConfig {
    /// Path to `jcmd`. Unset means `$JAVA_HOME/bin/jcmd`, then `PATH`.
    #[serde(default)]
    pub program: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SweepConfig {
    #[serde(default = "default_lookback")]
    pub lookback: u64,
    #[serde(default = "default_count")]
    pub count: u64,
    /// Also sweep around the thread address, not only the object.
    #[serde(default = "default_sweep_thread")]
    pub sweep_thread: bool,
    #[serde(default)]
    pub reject_empty: bool,
}

/// The object the inspected VM is expected to hold: a lock instance some
/// thread is waiting on, with one integer field of known value.
///
/// ```toml
/// [fixture]
/// lock_class = "MyLock"
/// field_name = "myInt"
/// field_type = "I"
/// field_value = 12345
/// ```
#[derive(Debug, Deserialize, Serialize)]
pub struct FixtureConfig {
    #[serde(default = "default_lock_class")]
    pub lock_class: String,
    #[serde(default = "default_field_name")]
    pub field_name: String,
    #[serde(default = "default_field_type")]
    pub field_type: String,
    #[serde(default = "default_field_value")]
    pub field_value: i64,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct LogConfig {
    /// JSON-lines execution log. Unset disables it.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

fn default_lookback() -> u64 {
    DEFAULT_LOOKBACK
}

fn default_count() -> u64 {
    DEFAULT_COUNT
}

fn default_sweep_thread() -> bool {
    true
}

fn default_lock_class() -> String {
    "MyLock".to_string()
}

fn default_field_name() -> String {
    "myInt".to_string()
}

fn default_field_type() -> String {
    "I".to_string()
}

fn default_field_value() -> i64 {
    12345
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            lookback: default_lookback(),
            count: default_count(),
            sweep_thread: default_sweep_thread(),
            reject_empty: false,
        }
    }
}

impl SweepConfig {
    pub fn settings(&self) -> SweepSettings {
        SweepSettings {
            lookback: self.lookback,
            count: self.count,
            reject_empty: self.reject_empty,
        }
    }
}

impl Default for FixtureConfig {
    fn default() -> Self {
        Self {
            lock_class: default_lock_class(),
            field_name: default_field_name(),
            field_type: default_field_type(),
            field_value: default_field_value(),
        }
    }
}

impl FixtureConfig {
    pub fn field_marker(&self) -> FieldMarker {
        FieldMarker::new(&self.field_name, &self.field_type, self.field_value)
    }
}

#[derive(Debug, Deserialize, Serialize, Default)]
pub struct HarnessConfig {
    #[serde(default)]
    pub channel: ChannelConfig,
    #[serde(default)]
    pub sweep: SweepConfig,
    #[serde(default)]
    pub fixture: FixtureConfig,
    #[serde(default)]
    pub log: LogConfig,
}

impl HarnessConfig {
    /// Search upward from `start` for a `.vmprobe/config.toml` file and load it.
    /// Returns the default config if no file is found.
    pub fn load(start: &Path) -> Result<(Self, Option<PathBuf>)> {
        if let Some(path) = Self::find_config_file(start) {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let config: HarnessConfig = toml::from_str(&contents)
                .with_context(|| format!("failed to parse {}", path.display()))?;
            Ok((config, Some(path)))
        } else {
            Ok((HarnessConfig::default(), None))
        }
    }

    fn find_config_file(start: &Path) -> Option<PathBuf> {
        let mut dir = start.to_path_buf();
        loop {
            let candidate = dir.join(CONFIG_DIR).join(CONFIG_FILENAME);
            if candidate.is_file() {
                return Some(candidate);
            }
            if !dir.pop() {
                return None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn default_config_values() {
        let config = HarnessConfig::default();
        assert!(config.channel.program.is_none());
        assert_eq!(config.sweep.lookback, 256);
        assert_eq!(config.sweep.count, 512);
        assert!(config.sweep.sweep_thread);
        assert!(!config.sweep.reject_empty);
        assert_eq!(config.fixture.lock_class, "MyLock");
        assert_eq!(config.fixture.field_name, "myInt");
        assert_eq!(config.fixture.field_type, "I");
        assert_eq!(config.fixture.field_value, 12345);
        assert!(config.log.path.is_none());
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
[channel]
program = "/opt/jdk/bin/jcmd"

[sweep]
lookback = 64
count = 128
sweep_thread = false
reject_empty = true

[fixture]
lock_class = "Gate"
field_name = "count"
field_type = "J"
field_value = -7

[log]
path = "/tmp/vmprobe.jsonl"
"#;
        let config: HarnessConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.channel.program.as_deref(), Some("/opt/jdk/bin/jcmd"));
        assert_eq!(
            config.sweep.settings(),
            SweepSettings {
                lookback: 64,
                count: 128,
                reject_empty: true
            }
        );
        assert!(!config.sweep.sweep_thread);
        assert_eq!(config.fixture.field_marker(), FieldMarker::new("count", "J", -7));
        assert_eq!(config.fixture.lock_class, "Gate");
        assert_eq!(config.log.path, Some(PathBuf::from("/tmp/vmprobe.jsonl")));
    }

    #[test]
    fn parse_partial_config() {
        let toml = r#"
[sweep]
count = 16
"#;
        let config: HarnessConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.sweep.count, 16);
        assert_eq!(config.sweep.lookback, 256);
        assert_eq!(config.fixture.field_value, 12345);
    }

    #[test]
    fn load_from_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join(".vmprobe");
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("config.toml"),
            r#"
[fixture]
lock_class = "Gate"
"#,
        )
        .unwrap();

        let (config, path) = HarnessConfig::load(tmp.path()).unwrap();
        assert!(path.is_some());
        assert_eq!(config.fixture.lock_class, "Gate");
    }

    #[test]
    fn load_returns_default_when_no_file() {
        let tmp = tempfile::tempdir().unwrap();
        let (config, path) = HarnessConfig::load(tmp.path()).unwrap();
        assert!(path.is_none());
        assert_eq!(config.fixture.lock_class, "MyLock");
    }

    #[test]
    fn load_walks_up_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join(".vmprobe");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("config.toml"), "[sweep]\ncount = 8\n").unwrap();

        let nested = tmp.path().join("a").join("b").join("c");
        fs::create_dir_all(&nested).unwrap();

        let (config, path) = HarnessConfig::load(&nested).unwrap();
        assert!(path.is_some());
        assert_eq!(config.sweep.count, 8);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join(".vmprobe");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("config.toml"), "[sweep\ncount = 8\n").unwrap();
        assert!(HarnessConfig::load(tmp.path()).is_err());
    }
}
