use crate::loader::LoaderConfig;
use crate::mock::{DatasetKind, Latency};
use crate::session::DEFAULT_MAX_SESSIONS;
use crate::types::WidgetConfig;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_with::{DurationSeconds, serde_as};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Runtime configuration for the widget server.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    /// Origin the iframe is served from; the loader's `widgetUrl`.
    pub public_url: url::Url,
    pub enable_cors: bool,
    pub session_ttl: Duration,
    pub max_sessions: usize,
    pub dataset: DatasetKind,
    pub latency_scale: f64,
    pub widget: WidgetConfig,
}

/// Optional TOML overlay; every key overrides the env-derived value.
#[serde_as]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub bind_addr: Option<SocketAddr>,
    pub public_url: Option<url::Url>,
    pub enable_cors: Option<bool>,
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    #[serde(default)]
    pub session_ttl: Option<Duration>,
    pub max_sessions: Option<usize>,
    pub dataset: Option<String>,
    pub latency_scale: Option<f64>,
    #[serde(default)]
    pub widget: crate::types::WidgetConfigPatch,
}

pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(30 * 60);

/// Upper bound on `latency_scale`; 100 turns the 500 ms question wait into 50 s.
pub const MAX_LATENCY_SCALE: f64 = 100.0;

fn check_latency_scale(value: f64) -> anyhow::Result<f64> {
    if value.is_finite() && (0.0..=MAX_LATENCY_SCALE).contains(&value) {
        Ok(value)
    } else {
        anyhow::bail!("latency_scale must be between 0 and {MAX_LATENCY_SCALE}, got {value}")
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let bind_addr: SocketAddr = std::env::var("BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
            .parse()
            .context("failed to parse BIND_ADDR")?;

        let public_url = std::env::var("WIDGET_PUBLIC_URL")
            .unwrap_or_else(|_| "http://localhost:8080".to_string())
            .parse()
            .context("failed to parse WIDGET_PUBLIC_URL")?;

        let enable_cors = env_flag("ENABLE_CORS");

        let session_ttl = std::env::var("SESSION_TTL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_SESSION_TTL);

        let max_sessions = std::env::var("WIDGET_MAX_SESSIONS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(DEFAULT_MAX_SESSIONS);

        let dataset = match std::env::var("WIDGET_DATASET") {
            Ok(v) => v
                .parse::<DatasetKind>()
                .map_err(anyhow::Error::msg)
                .context("failed to parse WIDGET_DATASET")?,
            Err(_) => DatasetKind::default(),
        };

        let latency_scale = match std::env::var("WIDGET_LATENCY_SCALE") {
            Ok(v) => v
                .parse::<f64>()
                .context("failed to parse WIDGET_LATENCY_SCALE")
                .and_then(check_latency_scale)
                .context("invalid WIDGET_LATENCY_SCALE")?,
            Err(_) => 1.0,
        };

        let mut widget = WidgetConfig::default();
        if let Some(threshold) = std::env::var("WIDGET_SOLUTION_THRESHOLD")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
        {
            widget.max_questions_before_solution = threshold;
        }

        Ok(Self {
            bind_addr,
            public_url,
            enable_cors,
            session_ttl,
            max_sessions,
            dataset,
            latency_scale,
            widget,
        })
    }

    /// Env first, then the TOML file on top when one is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = Self::from_env()?;
        if let Some(path) = path {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading config file {}", path.display()))?;
            let file: FileConfig = toml::from_str(&raw)
                .with_context(|| format!("parsing config file {}", path.display()))?;
            config.apply(file)?;
        }
        crate::validation::validate_config(&config.widget).context("invalid widget defaults")?;
        Ok(config)
    }

    pub fn apply(&mut self, file: FileConfig) -> anyhow::Result<()> {
        if let Some(v) = file.bind_addr {
            self.bind_addr = v;
        }
        if let Some(v) = file.public_url {
            self.public_url = v;
        }
        if let Some(v) = file.enable_cors {
            self.enable_cors = v;
        }
        if let Some(v) = file.session_ttl {
            self.session_ttl = v;
        }
        if let Some(v) = file.max_sessions {
            self.max_sessions = v;
        }
        if let Some(v) = file.dataset {
            self.dataset = v.parse().map_err(anyhow::Error::msg)?;
        }
        if let Some(v) = file.latency_scale {
            self.latency_scale = check_latency_scale(v)?;
        }
        self.widget.merge(file.widget);
        Ok(())
    }

    pub fn latency(&self) -> Latency {
        Latency::scaled(self.latency_scale)
    }

    /// Origin string as `MessageEvent.origin` reports it.
    pub fn widget_origin(&self) -> String {
        self.public_url.origin().ascii_serialization()
    }

    /// Defaults baked into the served loader script.
    pub fn loader_defaults(&self) -> LoaderConfig {
        LoaderConfig {
            widget: self.widget.clone(),
            widget_url: self.widget_origin(),
        }
    }
}
