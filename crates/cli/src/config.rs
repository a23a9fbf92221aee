use proto::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tools::suite::DEFAULT_MISSING_TOOL_PATTERNS;
use tools::{SuiteSpec, SuiteTable, ToolMissingMatcher};
use tracing::debug;

/// Environment variable holding the external AI endpoint URL.
pub const AI_ENDPOINT_ENV: &str = "AI_API";
/// Environment variable overriding the HTTP port.
pub const PORT_ENV: &str = "CAPASSIST_PORT";
/// Environment variable overriding the test base directory.
pub const TESTS_DIR_ENV: &str = "CAPASSIST_TESTS_DIR";

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// External AI service settings.
    #[serde(default)]
    pub ai: AiConfig,

    /// Test runner settings.
    #[serde(default)]
    pub tests: TestsConfig,
}

/// HTTP server config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address.
    #[serde(default = "default_host")]
    pub host: String,
    /// HTTP port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Allowed CORS origins (comma-separated). Empty = allow all.
    #[serde(default)]
    pub cors_origins: String,
    /// Directory holding the built web client.
    #[serde(default = "default_static_dir")]
    pub static_dir: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_static_dir() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{home}/.capassist/web")
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: String::new(),
            static_dir: default_static_dir(),
        }
    }
}

/// External AI endpoint config.
///
/// `endpoint` is normally supplied through `AI_API`. When it stays empty every
/// chat request fails with a 502.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    #[serde(default)]
    pub endpoint: String,
    #[serde(default = "default_ai_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_ai_timeout_secs() -> u64 {
    60
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            timeout_secs: default_ai_timeout_secs(),
        }
    }
}

impl AiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// One suite entry under `[tests.rag]`, `[tests.ai]` or `[tests.ui]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteConfig {
    /// Directory relative to `tests.base_dir` (or absolute).
    pub dir: String,
    pub command: String,
    #[serde(default)]
    pub fallback: Option<String>,
}

impl SuiteConfig {
    fn to_spec(&self) -> SuiteSpec {
        let spec = SuiteSpec::new(&self.dir, &self.command);
        match &self.fallback {
            Some(fallback) => spec.with_fallback(fallback),
            None => spec,
        }
    }
}

fn default_python_suite(dir: &str) -> SuiteConfig {
    SuiteConfig {
        dir: dir.to_string(),
        command: "uv run -q pytest -vv".to_string(),
        fallback: Some("pytest -vv".to_string()),
    }
}

fn default_rag_suite() -> SuiteConfig {
    default_python_suite("../rag")
}

fn default_ai_suite() -> SuiteConfig {
    default_python_suite("../ai")
}

fn default_ui_suite() -> SuiteConfig {
    SuiteConfig {
        dir: ".".to_string(),
        command: "pnpm test".to_string(),
        fallback: None,
    }
}

/// Test runner config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestsConfig {
    /// Directory the suite dirs are resolved against.
    #[serde(default = "default_tests_base_dir")]
    pub base_dir: String,
    /// Bound for one step, in seconds.
    #[serde(default = "default_step_timeout_secs")]
    pub timeout_secs: u64,
    /// Phrases that mark a tool as unavailable on stderr.
    #[serde(default = "default_missing_tool_patterns")]
    pub missing_tool_patterns: Vec<String>,
    #[serde(default = "default_rag_suite")]
    pub rag: SuiteConfig,
    #[serde(default = "default_ai_suite")]
    pub ai: SuiteConfig,
    #[serde(default = "default_ui_suite")]
    pub ui: SuiteConfig,
}

fn default_tests_base_dir() -> String {
    ".".to_string()
}

fn default_step_timeout_secs() -> u64 {
    180
}

fn default_missing_tool_patterns() -> Vec<String> {
    DEFAULT_MISSING_TOOL_PATTERNS
        .iter()
        .map(|p| p.to_string())
        .collect()
}

impl Default for TestsConfig {
    fn default() -> Self {
        Self {
            base_dir: default_tests_base_dir(),
            timeout_secs: default_step_timeout_secs(),
            missing_tool_patterns: default_missing_tool_patterns(),
            rag: default_rag_suite(),
            ai: default_ai_suite(),
            ui: default_ui_suite(),
        }
    }
}

impl TestsConfig {
    /// Builds the fixed suite table.
    pub fn suite_table(&self) -> SuiteTable {
        SuiteTable::new(
            &self.base_dir,
            self.rag.to_spec(),
            self.ai.to_spec(),
            self.ui.to_spec(),
        )
    }

    pub fn matcher(&self) -> ToolMissingMatcher {
        ToolMissingMatcher::new(&self.missing_tool_patterns)
    }

    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Loads configuration from explicit path, fallback locations, and env overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config_path = path.map(|p| p.to_path_buf()).or_else(|| {
            // Look in current dir, then home dir
            let cwd = std::env::current_dir().ok()?.join("config.toml");
            if cwd.exists() {
                return Some(cwd);
            }
            let home = std::env::var("HOME").ok()?;
            let home_config = PathBuf::from(home).join(".capassist").join("config.toml");
            if home_config.exists() {
                return Some(home_config);
            }
            None
        });
        debug!(path = ?config_path, "Config file resolved");

        let mut config = if let Some(path) = config_path {
            let content = std::fs::read_to_string(&path).map_err(ConfigError::Io)?;
            toml::from_str(&content).map_err(|e| ConfigError::Toml(e.to_string()))?
        } else {
            Config::default()
        };

        config.apply_env()?;
        config.validate()?;

        debug!(
            port = config.server.port,
            ai_endpoint_set = !config.ai.endpoint.is_empty(),
            tests_base_dir = %config.tests.base_dir,
            "Config loaded"
        );
        Ok(config)
    }

    /// Environment variable overrides.
    fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(endpoint) = std::env::var(AI_ENDPOINT_ENV) {
            self.ai.endpoint = endpoint;
        }
        if let Ok(port) = std::env::var(PORT_ENV) {
            self.server.port = port.parse().map_err(|_| ConfigError::InvalidValue {
                field: PORT_ENV.to_string(),
                reason: format!("not a port number: {port}"),
            })?;
        }
        if let Ok(dir) = std::env::var(TESTS_DIR_ENV) {
            self.tests.base_dir = dir;
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.ai.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "ai.timeout_secs".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.tests.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "tests.timeout_secs".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        for (name, suite) in [
            ("rag", &self.tests.rag),
            ("ai", &self.tests.ai),
            ("ui", &self.tests.ui),
        ] {
            if suite.command.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: format!("tests.{name}.command"),
                    reason: "must not be empty".to_string(),
                });
            }
        }
        Ok(())
    }
}
