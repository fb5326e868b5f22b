use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Run configuration for a channel scan.
///
/// # Configuration Locations
///
/// Sources are layered, later ones overriding earlier ones:
/// 1. Global `$HOME/.config/chanscout/config.yaml`
/// 2. Local `.chanscout.yaml` in the current directory
/// 3. Custom config file passed via `--config`
/// 4. `CHANSCOUT_*` environment variables (e.g. `CHANSCOUT_API_HASH`)
///
/// # Configuration Format
///
/// ```yaml
/// # Client credentials, used by network message sources
/// api_id: "12345"
/// api_hash: "0123456789abcdef"
/// phone_number: "+10000000000"
///
/// # Channel to sweep (alias: channel_username)
/// channel: "archive_drops"
///
/// # Directory holding exported channel histories, one subdirectory per channel
/// source_root: "channels"
///
/// # Output artifacts
/// results_file: "results.txt"
/// errors_file: "errors.txt"
/// log_file: "log.log"
///
/// # Log level (trace, debug, info, warn, error); alias: logging_level
/// log_level: "info"
///
/// # Worker threads for archive decoding
/// max_workers: 5
///
/// # Attachments downloaded and searched at the same time
/// semaphore_limit: 5
///
/// # Deepest archive-in-archive nesting that is still opened
/// max_archive_depth: 16
///
/// # Pause after each finished attachment, and before reconnecting
/// pacing_delay: "2s"
/// reconnect_delay: "5s"
///
/// # Give up on an attachment after this many attempts (unset: never)
/// max_retries: 10
/// ```
///
/// The value is loaded once at start-up and handed to each component; nothing
/// reads configuration from global state afterwards.
#[derive(Clone, Deserialize)]
pub struct ScanConfig {
    /// Client API id
    #[serde(default)]
    pub api_id: Option<String>,

    /// Client API hash
    #[serde(default)]
    pub api_hash: Option<String>,

    /// Phone number used to authenticate the client session
    #[serde(default)]
    pub phone_number: Option<String>,

    /// Channel whose history is searched
    #[serde(alias = "channel_username")]
    pub channel: String,

    /// Root directory of exported channel histories
    #[serde(default = "default_source_root")]
    pub source_root: PathBuf,

    /// Where match records are appended
    #[serde(default = "default_results_file")]
    pub results_file: PathBuf,

    /// Where no-match and error records are appended
    #[serde(default = "default_errors_file")]
    pub errors_file: PathBuf,

    /// Log file for timestamped diagnostic lines
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "logging_level")]
    pub log_level: String,

    /// Size of the worker pool that decodes archive members
    #[serde(default = "default_concurrency")]
    pub max_workers: NonZeroUsize,

    /// Number of attachments in flight at once
    #[serde(default = "default_concurrency")]
    pub semaphore_limit: NonZeroUsize,

    /// Maximum archive nesting depth; the attachment itself is depth 1
    #[serde(default = "default_max_archive_depth")]
    pub max_archive_depth: usize,

    /// Delay inserted after each completed attachment
    #[serde(default = "default_pacing_delay", deserialize_with = "deserialize_duration")]
    pub pacing_delay: Duration,

    /// Delay before retrying after the connection was reset
    #[serde(
        default = "default_reconnect_delay",
        deserialize_with = "deserialize_duration"
    )]
    pub reconnect_delay: Duration,

    /// Retries per attachment before giving up; `None` retries forever
    #[serde(default)]
    pub max_retries: Option<u32>,
}

fn default_source_root() -> PathBuf {
    PathBuf::from("channels")
}

fn default_results_file() -> PathBuf {
    PathBuf::from("results.txt")
}

fn default_errors_file() -> PathBuf {
    PathBuf::from("errors.txt")
}

fn default_log_file() -> PathBuf {
    PathBuf::from("log.log")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_concurrency() -> NonZeroUsize {
    NonZeroUsize::MIN.saturating_add(4)
}

fn default_max_archive_depth() -> usize {
    16
}

fn default_pacing_delay() -> Duration {
    Duration::from_secs(2)
}

fn default_reconnect_delay() -> Duration {
    Duration::from_secs(5)
}

/// Accepts either a humantime string ("2s", "150ms") or a number of seconds
fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Seconds(u64),
        Text(String),
    }

    match Repr::deserialize(deserializer)? {
        Repr::Seconds(secs) => Ok(Duration::from_secs(secs)),
        Repr::Text(text) => {
            humantime::parse_duration(text.trim()).map_err(serde::de::Error::custom)
        }
    }
}

impl ScanConfig {
    /// Creates a configuration for `channel` with every other value defaulted
    pub fn for_channel(channel: impl Into<String>) -> Self {
        Self {
            api_id: None,
            api_hash: None,
            phone_number: None,
            channel: channel.into(),
            source_root: default_source_root(),
            results_file: default_results_file(),
            errors_file: default_errors_file(),
            log_file: default_log_file(),
            log_level: default_log_level(),
            max_workers: default_concurrency(),
            semaphore_limit: default_concurrency(),
            max_archive_depth: default_max_archive_depth(),
            pacing_delay: default_pacing_delay(),
            reconnect_delay: default_reconnect_delay(),
            max_retries: None,
        }
    }

    /// Loads configuration, adding a specific file on top of the defaults
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        let config_files = [
            dirs::config_dir().map(|p| p.join("chanscout/config.yaml")),
            Some(PathBuf::from(".chanscout.yaml")),
        ];

        for path in config_files.iter().flatten() {
            if path.exists() {
                builder = builder.add_source(File::from(path.as_path()));
            }
        }

        // An explicitly requested file must exist
        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder = builder.add_source(Environment::with_prefix("CHANSCOUT").try_parsing(true));

        let config: ScanConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.channel.trim().is_empty() {
            return Err(ConfigError::Message("channel must not be empty".into()));
        }
        if self.max_archive_depth == 0 {
            return Err(ConfigError::Message(
                "max_archive_depth must be at least 1".into(),
            ));
        }
        if self.max_retries == Some(0) {
            return Err(ConfigError::Message(
                "max_retries must be at least 1 when set".into(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for ScanConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanConfig")
            .field("api_id", &self.api_id)
            .field("api_hash", &self.api_hash.as_ref().map(|_| "<redacted>"))
            .field("phone_number", &self.phone_number)
            .field("channel", &self.channel)
            .field("source_root", &self.source_root)
            .field("results_file", &self.results_file)
            .field("errors_file", &self.errors_file)
            .field("log_file", &self.log_file)
            .field("log_level", &self.log_level)
            .field("max_workers", &self.max_workers)
            .field("semaphore_limit", &self.semaphore_limit)
            .field("max_archive_depth", &self.max_archive_depth)
            .field("pacing_delay", &self.pacing_delay)
            .field("reconnect_delay", &self.reconnect_delay)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}
