//! Optional project configuration stored in `.testwang.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cycles::Echo;

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".testwang.toml";

/// Project configuration (TOML).
///
/// Every field is optional in the file; missing fields take the defaults
/// below. Command-line flags override file values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TestwangConfig {
    /// Interpreter used to run `-m pytest`; `~` is expanded.
    pub python: String,

    /// Number of cycles to run.
    pub cycles: u32,

    /// Stop re-running a test once it has passed.
    pub failure_focus: bool,

    /// When to echo the runner's raw output.
    pub echo: Echo,

    /// Resolve test modules against the filesystem instead of the
    /// positional class/method rule.
    pub resolve_modules: bool,

    /// Kill a cycle's runner after this many seconds. Unset waits forever.
    pub cycle_timeout_secs: Option<u64>,

    /// Extra arguments passed to pytest before the selectors.
    pub pytest_args: Vec<String>,
}

impl Default for TestwangConfig {
    fn default() -> Self {
        Self {
            python: "python3".to_string(),
            cycles: 1,
            failure_focus: false,
            echo: Echo::None,
            resolve_modules: false,
            cycle_timeout_secs: None,
            pytest_args: Vec::new(),
        }
    }
}

impl TestwangConfig {
    pub fn validate(&self) -> Result<()> {
        if self.python.trim().is_empty() {
            return Err(anyhow!("python must be non-empty"));
        }
        if self.cycles == 0 {
            return Err(anyhow!("cycles must be > 0"));
        }
        if self.cycle_timeout_secs == Some(0) {
            return Err(anyhow!("cycle_timeout_secs must be > 0"));
        }
        Ok(())
    }

    /// Interpreter path with a leading `~` replaced by `$HOME`.
    pub fn python_path(&self) -> PathBuf {
        expand_home(&self.python, std::env::var_os("HOME").map(PathBuf::from))
    }
}

fn expand_home(raw: &str, home: Option<PathBuf>) -> PathBuf {
    match (raw.strip_prefix('~'), home) {
        (Some(""), Some(home)) => home,
        (Some(rest), Some(home)) if rest.starts_with('/') => home.join(&rest[1..]),
        _ => PathBuf::from(raw),
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `TestwangConfig::default()`.
pub fn load_config(path: &Path) -> Result<TestwangConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "no config file, using defaults");
        let cfg = TestwangConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: TestwangConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    debug!(path = %path.display(), ?cfg, "config loaded");
    Ok(cfg)
}
