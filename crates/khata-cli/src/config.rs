use anyhow::{Context, Result};
use khata_core::order::PriceList;
use khata_io::sms::{Fast2SmsConfig, FAST2SMS_ENDPOINT};
use std::path::PathBuf;
use std::time::Duration;

/// Session configuration, loaded from environment variables.
pub struct Config {
    /// JSON ledger file.
    pub data_file: PathBuf,
    /// Where the face extractor should save enrollment snapshots.
    pub faces_dir: PathBuf,
    /// Euclidean distance threshold for a positive face match (inclusive).
    pub match_threshold: f64,
    /// Time limit for a face scan.
    pub scan_timeout_secs: u64,
    /// Time limit for a face enrollment.
    pub enroll_timeout_secs: u64,
    /// External face detector/extractor command line.
    pub face_command: Option<String>,
    /// External speech recogniser command line.
    pub stt_command: Option<String>,
    /// External speech synthesiser command line.
    pub tts_command: Option<String>,
    /// Language passed to the recogniser.
    pub speech_language: String,
    /// Fast2SMS settings; `None` when no API key is set.
    pub sms: Option<Fast2SmsConfig>,
    /// Optional TOML price list.
    pub price_file: Option<PathBuf>,
}

impl Config {
    /// Load configuration from `KHATA_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let data_dir = std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                PathBuf::from(home).join(".local/share")
            })
            .join("khata");

        let data_file = env_path("KHATA_DATA_FILE").unwrap_or_else(|| data_dir.join("customers.json"));
        let faces_dir = env_path("KHATA_FACES_DIR").unwrap_or_else(|| faces_dir_for(&data_file));

        let sms = env_string("KHATA_SMS_API_KEY").map(|api_key| Fast2SmsConfig {
            endpoint: env_string("KHATA_SMS_ENDPOINT").unwrap_or_else(|| FAST2SMS_ENDPOINT.to_string()),
            api_key,
            sender_id: env_string("KHATA_SMS_SENDER_ID").unwrap_or_else(|| "FSTSMS".to_string()),
            route: env_string("KHATA_SMS_ROUTE").unwrap_or_else(|| "dlt".to_string()),
            timeout: Duration::from_secs(env_u64("KHATA_SMS_TIMEOUT_SECS", 10)),
        });

        Self {
            data_file,
            faces_dir,
            match_threshold: env_f64("KHATA_MATCH_THRESHOLD", 0.55),
            scan_timeout_secs: env_u64("KHATA_SCAN_TIMEOUT_SECS", 10),
            enroll_timeout_secs: env_u64("KHATA_ENROLL_TIMEOUT_SECS", 12),
            face_command: env_string("KHATA_FACE_COMMAND"),
            stt_command: env_string("KHATA_STT_COMMAND"),
            tts_command: env_string("KHATA_TTS_COMMAND"),
            speech_language: env_string("KHATA_SPEECH_LANGUAGE").unwrap_or_else(|| "hi-IN".to_string()),
            sms,
            price_file: env_path("KHATA_PRICE_FILE"),
        }
    }

    /// Point at a different ledger file. The snapshot directory follows it
    /// unless `KHATA_FACES_DIR` was set.
    pub fn with_data_file(mut self, data_file: PathBuf) -> Self {
        if env_path("KHATA_FACES_DIR").is_none() {
            self.faces_dir = faces_dir_for(&data_file);
        }
        self.data_file = data_file;
        self
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_timeout_secs)
    }

    pub fn enroll_timeout(&self) -> Duration {
        Duration::from_secs(self.enroll_timeout_secs)
    }

    /// The configured price list, or the built-in one.
    pub fn load_prices(&self) -> Result<PriceList> {
        let Some(path) = &self.price_file else {
            return Ok(PriceList::default());
        };
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading price file {}", path.display()))?;
        let prices: PriceList = toml::from_str(&raw)
            .with_context(|| format!("parsing price file {}", path.display()))?;
        tracing::info!(path = %path.display(), items = prices.len(), "price list loaded");
        Ok(prices.normalized())
    }
}

fn faces_dir_for(data_file: &std::path::Path) -> PathBuf {
    data_file
        .parent()
        .map(|p| p.join("faces"))
        .unwrap_or_else(|| PathBuf::from("faces"))
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env_string(key).map(PathBuf::from)
}

fn env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_faces_dir_follows_data_file() {
        assert_eq!(
            faces_dir_for(std::path::Path::new("/srv/khata/customers.json")),
            PathBuf::from("/srv/khata/faces")
        );
    }

    #[test]
    fn test_price_file_is_parsed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prices.toml");
        std::fs::write(&path, "default_price = 12\n\n[prices]\nmaggi = 14\nTea = 220.5\n").unwrap();

        let config = Config {
            price_file: Some(path),
            ..Config::from_env()
        };
        let prices = config.load_prices().unwrap();
        assert_eq!(prices.price_of("Maggi"), khata_core::Money::from(14));
        assert_eq!(prices.price_of("unknown"), khata_core::Money::from(12));
        assert_eq!(prices.len(), 2);
    }

    #[test]
    fn test_missing_price_file_is_an_error() {
        let config = Config {
            price_file: Some(PathBuf::from("/nonexistent/prices.toml")),
            ..Config::from_env()
        };
        assert!(config.load_prices().is_err());
    }
}
