//! Harness configuration loading.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{FnameError, FnameResult};
use crate::format::{Mode, OverflowPolicy};
use crate::harness::Outcome;

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "GECOS_FNAME_CONFIG";

/// Buffer size of the sendmail buildfname benchmark driver.
pub const DEFAULT_CAPACITY: i64 = 5;

/// Largest buffer the harness will request. Allocations are zero-filled, so
/// this bounds the memory touched per run.
pub const MAX_CAPACITY: i64 = 1 << 20;

/// Complete harness configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Size requested from the allocator when a scenario does not set one.
    #[serde(default = "default_capacity")]
    pub capacity: i64,

    /// Formatter to run.
    #[serde(default)]
    pub mode: Mode,

    /// Overflow handling for the checked formatter.
    #[serde(default)]
    pub policy: OverflowPolicy,

    /// Scenarios for `run`.
    #[serde(default = "default_scenarios")]
    pub scenarios: Vec<Scenario>,
}

/// A single gecos/login pair to format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub gecos: String,
    pub login: String,

    /// Overrides the harness capacity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<i64>,

    /// Expected display name, if the scenario is a check.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expect: Option<String>,

    /// Expected outcome, if the scenario is meant to overflow, truncate or
    /// fail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expect_outcome: Option<Outcome>,

    /// Run against an allocator that always fails.
    #[serde(default, skip_serializing_if = "is_false")]
    pub simulate_oom: bool,
}

fn default_capacity() -> i64 {
    DEFAULT_CAPACITY
}

fn is_false(b: &bool) -> bool {
    !*b
}

fn default_scenarios() -> Vec<Scenario> {
    vec![
        Scenario::new("plain", "John Doe", "jdoe")
            .with_capacity(32)
            .expecting("John Doe"),
        Scenario::new("sentinel", "*Jane Smith,Room 5", "jsmith")
            .with_capacity(32)
            .expecting("Jane Smith"),
        Scenario::new("substitution", "&, Manager", "al")
            .with_capacity(32)
            .expecting("Al"),
        Scenario::new("undersized", "John Doe", "jdoe").expecting_outcome(Outcome::Overflowed),
    ]
}

impl Scenario {
    pub fn new(
        name: impl Into<String>,
        gecos: impl Into<String>,
        login: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            gecos: gecos.into(),
            login: login.into(),
            capacity: None,
            expect: None,
            expect_outcome: None,
            simulate_oom: false,
        }
    }

    pub fn with_capacity(mut self, capacity: i64) -> Self {
        self.capacity = Some(capacity);
        self
    }

    pub fn expecting(mut self, expect: impl Into<String>) -> Self {
        self.expect = Some(expect.into());
        self
    }

    pub fn expecting_outcome(mut self, outcome: Outcome) -> Self {
        self.expect_outcome = Some(outcome);
        self
    }

    pub fn simulating_oom(mut self) -> Self {
        self.simulate_oom = true;
        self
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            mode: Mode::default(),
            policy: OverflowPolicy::default(),
            scenarios: default_scenarios(),
        }
    }
}

impl HarnessConfig {
    /// Load configuration.
    ///
    /// Priority (highest to lowest):
    /// 1. `explicit` path (the `--config` flag)
    /// 2. GECOS_FNAME_CONFIG environment variable
    /// 3. ~/.config/gecos-fname/config.toml
    /// 4. Built-in defaults
    pub fn load(explicit: Option<&Path>) -> FnameResult<Self> {
        if let Some(path) = explicit {
            return Self::load_required(&expand_path(&path.to_string_lossy()));
        }

        if let Ok(env_path) = std::env::var(CONFIG_ENV) {
            let path = expand_path(&env_path);
            info!("Loading config from {CONFIG_ENV}: {:?}", path);
            return Self::load_required(&path);
        }

        if let Some(user_config) = Self::user_config_path()
            && user_config.exists()
        {
            debug!("Loading user config from {:?}", user_config);
            return Self::load_file(&user_config);
        }

        Ok(Self::default())
    }

    fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("gecos-fname").join("config.toml"))
    }

    fn load_required(path: &Path) -> FnameResult<Self> {
        if !path.exists() {
            return Err(FnameError::Config(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        Self::load_file(path)
    }

    /// Parse and validate a config file.
    pub fn load_file(path: &Path) -> FnameResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content).map_err(|e| match e {
            FnameError::Config(msg) => FnameError::Config(format!("{}: {msg}", path.display())),
            other => other,
        })
    }

    pub fn from_toml(content: &str) -> FnameResult<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| FnameError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configs whose scenarios could not be told apart or whose
    /// gecos could not come from a passwd entry.
    pub fn validate(&self) -> FnameResult<()> {
        check_capacity("capacity", self.capacity)?;
        let mut seen = HashSet::new();
        for scenario in &self.scenarios {
            if scenario.name.is_empty() {
                return Err(FnameError::Config("scenario name is empty".into()));
            }
            if !seen.insert(scenario.name.as_str()) {
                return Err(FnameError::Config(format!(
                    "duplicate scenario name '{}'",
                    scenario.name
                )));
            }
            if scenario.gecos.contains([':', '\n', '\r']) {
                return Err(FnameError::Config(format!(
                    "scenario '{}': gecos contains a passwd separator or newline",
                    scenario.name
                )));
            }
            if let Some(capacity) = scenario.capacity {
                check_capacity(&format!("scenario '{}': capacity", scenario.name), capacity)?;
            }
        }
        Ok(())
    }

    /// Capacity for `scenario`, falling back to the harness default.
    pub fn capacity_for(&self, scenario: &Scenario) -> i64 {
        scenario.capacity.unwrap_or(self.capacity)
    }

    /// Example configuration file.
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

fn check_capacity(what: &str, capacity: i64) -> FnameResult<()> {
    if capacity > MAX_CAPACITY {
        return Err(FnameError::Config(format!(
            "{what} {capacity} exceeds the {MAX_CAPACITY} byte limit"
        )));
    }
    Ok(())
}

fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).to_string())
}
