use std::path::PathBuf;
use std::time::Duration;

/// Application-level constants
pub const APP_NAME: &str = "HealthShield";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name the advisory assistant introduces itself with.
pub const ASSISTANT_NAME: &str = "August AI";

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const DEFAULT_MODEL: &str = "medgemma";
const DEFAULT_LLM_TIMEOUT_SECS: u64 = 120;
const DEFAULT_GRANT_MINUTES: u64 = 30;
/// Longest grant a doctor can be configured to hold: one day.
const MAX_GRANT_MINUTES: u64 = 24 * 60;

/// Get the application data directory
/// ~/HealthShield/ on all platforms, falling back to the working directory
/// when no home directory can be determined.
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Default tracing filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "healthshield=info,warn"
}

/// Runtime configuration. Every field can be overridden from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub ollama_url: String,
    pub model: String,
    pub llm_timeout_secs: u64,
    /// How long a doctor keeps access after redeeming a patient's token.
    pub grant_duration: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: app_data_dir(),
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            llm_timeout_secs: DEFAULT_LLM_TIMEOUT_SECS,
            grant_duration: Duration::from_secs(DEFAULT_GRANT_MINUTES * 60),
        }
    }
}

impl AppConfig {
    /// Build a config from `HEALTHSHIELD_*` environment variables.
    /// Unparseable numbers fall back to their defaults with a warning.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(dir) = lookup("HEALTHSHIELD_DATA_DIR").filter(|d| !d.trim().is_empty()) {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(url) = lookup("HEALTHSHIELD_OLLAMA_URL").filter(|u| !u.trim().is_empty()) {
            config.ollama_url = url.trim().trim_end_matches('/').to_string();
        }
        if let Some(model) = lookup("HEALTHSHIELD_MODEL").filter(|m| !m.trim().is_empty()) {
            config.model = model.trim().to_string();
        }
        if let Some(secs) = parse_number(&lookup, "HEALTHSHIELD_LLM_TIMEOUT_SECS") {
            config.llm_timeout_secs = secs;
        }
        if let Some(minutes) = parse_number(&lookup, "HEALTHSHIELD_GRANT_MINUTES") {
            match minutes.checked_mul(60).filter(|_| minutes <= MAX_GRANT_MINUTES) {
                Some(secs) => config.grant_duration = Duration::from_secs(secs),
                None => tracing::warn!(
                    key = "HEALTHSHIELD_GRANT_MINUTES",
                    max = MAX_GRANT_MINUTES,
                    "ignoring out-of-range grant duration"
                ),
            }
        }

        config
    }

    /// SQLite file holding every record.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("records.db")
    }

    /// File holding the identifier of the signed-in user.
    pub fn session_pointer_path(&self) -> PathBuf {
        self.data_dir.join("session")
    }
}

fn parse_number(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<u64> {
    let raw = lookup(key)?;
    match raw.trim().parse::<u64>() {
        Ok(value) if value > 0 => Some(value),
        _ => {
            tracing::warn!(key, "ignoring invalid numeric setting");
            None
        }
    }
}
