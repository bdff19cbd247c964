// src/config.rs
//
// vi_daq_config.toml plus validation of the run form.

use crate::error::ConfigError;
use crate::protocol::DEFAULT_BAUD_RATE;
use crate::session::SessionSettings;
use serde::Deserialize;
use std::fs;
use std::num::{IntErrorKind, ParseIntError};
use std::path::Path;
use std::time::Duration;

pub const CONFIG_FILE: &str = "vi_daq_config.toml";

const SAMPLE_CONFIG: &str = r#"# V/I Data Acquisition Unit configuration

# Serial port
port_name = "COM3"
baud_rate = 9600
read_timeout_ms = 2000

# Device reset wait after opening the port, and the budget for the startup banner
settle_delay_s = 2.0
banner_timeout_s = 30.0

# Form defaults
default_readings = 10
default_stabilization_s = 5.0

# CSV export folder
export_folder = "exports"
"#;

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    port_name: Option<String>,
    baud_rate: Option<u32>,
    read_timeout_ms: Option<u64>,
    settle_delay_s: Option<f64>,
    banner_timeout_s: Option<f64>,
    default_readings: Option<u32>,
    default_stabilization_s: Option<f64>,
    export_folder: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub port_name: String,
    pub baud_rate: u32,
    pub read_timeout_ms: u64,
    pub settle_delay_s: f64,
    pub banner_timeout_s: f64,
    pub default_readings: u32,
    pub default_stabilization_s: f64,
    pub export_folder: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port_name: "COM3".to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout_ms: 2000,
            settle_delay_s: 2.0,
            banner_timeout_s: 30.0,
            default_readings: 10,
            default_stabilization_s: 5.0,
            export_folder: "exports".to_string(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Self {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    /// Missing file: write a sample and use defaults. Unreadable or malformed: defaults.
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            if let Err(e) = fs::write(path, SAMPLE_CONFIG) {
                log::warn!("could not write sample config {}: {}", path.display(), e);
            } else {
                log::info!(
                    "{} not found, wrote a sample config; using defaults",
                    path.display()
                );
            }
            return AppConfig::default();
        }

        let content = match fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                log::warn!("reading {} failed: {}; using defaults", path.display(), e);
                return AppConfig::default();
            }
        };

        match Self::from_toml(&content) {
            Ok(cfg) => {
                log::info!(
                    "config: port={} baud={} timeout={}ms settle={}s banner={}s export={}",
                    cfg.port_name,
                    cfg.baud_rate,
                    cfg.read_timeout_ms,
                    cfg.settle_delay_s,
                    cfg.banner_timeout_s,
                    cfg.export_folder
                );
                cfg
            }
            Err(e) => {
                log::warn!("parsing {} failed: {}; using defaults", path.display(), e);
                AppConfig::default()
            }
        }
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        let raw: RawConfig = toml::from_str(content)?;

        let mut cfg = AppConfig::default();
        if let Some(p) = raw.port_name {
            cfg.port_name = p;
        }
        if let Some(b) = raw.baud_rate {
            cfg.baud_rate = b;
        }
        if let Some(t) = raw.read_timeout_ms {
            cfg.read_timeout_ms = t;
        }
        if let Some(s) = raw.settle_delay_s.filter(|s| s.is_finite() && *s >= 0.0) {
            cfg.settle_delay_s = s;
        }
        if let Some(b) = raw.banner_timeout_s.filter(|b| b.is_finite() && *b >= 0.0) {
            cfg.banner_timeout_s = b;
        }
        if let Some(n) = raw.default_readings {
            cfg.default_readings = n;
        }
        if let Some(d) = raw.default_stabilization_s {
            cfg.default_stabilization_s = d;
        }
        if let Some(f) = raw.export_folder {
            cfg.export_folder = f;
        }
        Ok(cfg)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            settle_delay: Duration::from_secs_f64(self.settle_delay_s),
            banner_timeout: Duration::from_secs_f64(self.banner_timeout_s),
        }
    }
}

/// Validated inputs of one run. Immutable once the run starts.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub port: String,
    pub readings: u32,
    pub stabilization: Duration,
}

/// Raw text of the "Experiment Setup" form.
#[derive(Debug, Clone, Default)]
pub struct RunForm {
    pub port: String,
    pub readings: String,
    pub stabilization: String,
}

impl RunForm {
    pub fn parse(&self) -> Result<SessionConfig, ConfigError> {
        let port = self.port.trim();
        if port.is_empty() {
            return Err(ConfigError::MissingPort);
        }

        let readings_text = self.readings.trim();
        let readings: i64 = readings_text.parse().map_err(|e: ParseIntError| {
            match e.kind() {
                IntErrorKind::PosOverflow => {
                    ConfigError::ReadingCountTooLarge(readings_text.to_string())
                }
                _ => ConfigError::InvalidReadingCount(readings_text.to_string()),
            }
        })?;
        if readings <= 0 {
            return Err(ConfigError::ReadingCountOutOfRange(readings));
        }
        let readings = u32::try_from(readings)
            .map_err(|_| ConfigError::ReadingCountTooLarge(readings_text.to_string()))?;

        let delay_text = self.stabilization.trim();
        let delay: f64 = delay_text
            .parse()
            .map_err(|_| ConfigError::InvalidDelay(delay_text.to_string()))?;
        if !delay.is_finite() || delay < 0.0 {
            return Err(ConfigError::DelayOutOfRange(delay));
        }

        Ok(SessionConfig {
            port: port.to_string(),
            readings,
            stabilization: Duration::from_secs_f64(delay),
        })
    }
}
