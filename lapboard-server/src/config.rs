//! Server configuration from environment variables
//!
//! | variable                           | default                                   |
//! |------------------------------------|-------------------------------------------|
//! | `LAPBOARD_BIND`                    | `0.0.0.0:9100`                            |
//! | `LAPBOARD_DATASET`                 | `<data dir>/lapboard/dataset.json` if present |
//! | `LAPBOARD_DEMO`                    | `false`                                   |
//! | `LAPBOARD_RECOMPUTE_INTERVAL_SECS` | `30`                                      |
//! | `LAPBOARD_RECOMPUTE_ATTEMPTS`      | `3`                                       |

use crate::recompute::DEFAULT_ATTEMPTS;
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_BIND: &str = "0.0.0.0:9100";
const DEFAULT_INTERVAL_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub dataset: Option<PathBuf>,
    pub demo: bool,
    pub recompute_interval: Duration,
    pub recompute_attempts: u32,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup, so tests need not touch the process environment
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind = lookup("LAPBOARD_BIND")
            .unwrap_or_else(|| DEFAULT_BIND.to_string())
            .parse()
            .context("LAPBOARD_BIND must be a socket address like 0.0.0.0:9100")?;

        let dataset = lookup("LAPBOARD_DATASET")
            .map(PathBuf::from)
            .or_else(default_dataset);

        let demo = match lookup("LAPBOARD_DEMO").as_deref() {
            None => false,
            Some(v) => matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"),
        };

        let interval_secs = match lookup("LAPBOARD_RECOMPUTE_INTERVAL_SECS") {
            Some(v) => v
                .trim()
                .parse::<u64>()
                .context("LAPBOARD_RECOMPUTE_INTERVAL_SECS must be a whole number of seconds")?,
            None => DEFAULT_INTERVAL_SECS,
        };

        let recompute_attempts = match lookup("LAPBOARD_RECOMPUTE_ATTEMPTS") {
            Some(v) => v
                .trim()
                .parse::<u32>()
                .context("LAPBOARD_RECOMPUTE_ATTEMPTS must be a positive integer")?,
            None => DEFAULT_ATTEMPTS,
        };

        Ok(Self {
            bind,
            dataset,
            demo,
            recompute_interval: Duration::from_secs(interval_secs.max(1)),
            recompute_attempts: recompute_attempts.max(1),
        })
    }
}

fn default_dataset() -> Option<PathBuf> {
    dirs::data_dir()
        .map(|d| d.join("lapboard").join("dataset.json"))
        .filter(|p| p.exists())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<ServerConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|k| vars.get(k).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.bind, "0.0.0.0:9100".parse().unwrap());
        assert!(!cfg.demo);
        assert_eq!(cfg.recompute_interval, Duration::from_secs(30));
        assert_eq!(cfg.recompute_attempts, 3);
    }

    #[test]
    fn test_overrides() {
        let cfg = config(&[
            ("LAPBOARD_BIND", "127.0.0.1:8080"),
            ("LAPBOARD_DATASET", "/tmp/laps.json"),
            ("LAPBOARD_DEMO", "TRUE"),
            ("LAPBOARD_RECOMPUTE_INTERVAL_SECS", "10"),
            ("LAPBOARD_RECOMPUTE_ATTEMPTS", "0"),
        ])
        .unwrap();

        assert_eq!(cfg.bind.port(), 8080);
        assert_eq!(cfg.dataset, Some(PathBuf::from("/tmp/laps.json")));
        assert!(cfg.demo);
        assert_eq!(cfg.recompute_interval, Duration::from_secs(10));
        assert_eq!(cfg.recompute_attempts, 1);
    }

    #[test]
    fn test_invalid_values_are_errors() {
        assert!(config(&[("LAPBOARD_BIND", "nowhere")]).is_err());
        assert!(config(&[("LAPBOARD_RECOMPUTE_INTERVAL_SECS", "soon")]).is_err());
    }
}
