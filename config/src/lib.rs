//! Layered configuration: an embedded default, merged with an optional
//! on-disk YAML file, merged with `PMOPLAYER__*` environment overrides.
//! Grounded on the discover-a-config-dir / embed-a-default / merge
//! strategy used elsewhere in this workspace, but resolved into a typed
//! `PlayerConfig` up front rather than kept as a raw YAML tree, since
//! every consumer here wants a fixed, known shape.

mod error;

pub use error::ConfigError;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use tracing::{debug, info};

const DEFAULT_CONFIG: &str = include_str!("default.yaml");
const ENV_PREFIX: &str = "PMOPLAYER__";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JitterConfig {
    pub count: usize,
    pub block_size: usize,
    pub threshold_low: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeartbeatKind {
    Samples,
    Bitrate,
    Pulse,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    pub kind: HeartbeatKind,
    pub samplerate: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RtpConfig {
    pub clock_rate: u32,
    pub control_payload_type: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    pub bind: String,
    pub max_pending_calls: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RealtimeScheduler {
    Other,
    Fifo,
    RoundRobin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    pub priority: i32,
    pub scheduler: RealtimeScheduler,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    pub jitter: JitterConfig,
    pub heartbeat: HeartbeatConfig,
    pub rtp: RtpConfig,
    pub rpc: RpcConfig,
    pub realtime: RealtimeConfig,
    /// Where decoded PCM goes for the default playback path, e.g.
    /// `"alsa://default"` or `"file:///tmp/pmoplayer-out.pcm"`.
    pub sink_uri: String,
}

impl PlayerConfig {
    /// Load the default, then overlay `path` (if given, else the
    /// discovered config dir's `config.yaml` if it exists), then
    /// overlay `PMOPLAYER__*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut value: Value = serde_yaml::from_str(DEFAULT_CONFIG)?;

        let external_path = match path {
            Some(p) => Some(p.to_path_buf()),
            None => discover_config_file(),
        };
        if let Some(p) = &external_path {
            if p.is_file() {
                let text = std::fs::read_to_string(p)?;
                let overlay: Value = serde_yaml::from_str(&text)?;
                merge_values(&mut value, overlay);
                info!(path = %p.display(), "loaded external config file");
            }
        }

        apply_env_overrides(&mut value)?;

        let config: PlayerConfig = serde_yaml::from_value(value)?;
        Ok(config)
    }
}

/// `$PMOPLAYER_CONFIG_DIR/config.yaml`, else `~/.pmoplayer/config.yaml`
/// if it exists, else `None` (defaults + env only).
fn discover_config_file() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("PMOPLAYER_CONFIG_DIR") {
        return Some(PathBuf::from(dir).join("config.yaml"));
    }
    let home = dirs::home_dir()?;
    let candidate = home.join(".pmoplayer").join("config.yaml");
    if candidate.is_file() {
        Some(candidate)
    } else {
        None
    }
}

fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            for (k, v) in overlay_map {
                match base_map.get_mut(&k) {
                    Some(existing) => merge_values(existing, v),
                    None => {
                        base_map.insert(k, v);
                    }
                }
            }
        }
        (base_slot, overlay_value) => {
            *base_slot = overlay_value;
        }
    }
}

/// Reads every `PMOPLAYER__SECTION__FIELD=value` environment variable
/// and writes it into the matching path of the YAML tree, e.g.
/// `PMOPLAYER__JITTER__COUNT=16` sets `jitter.count`.
fn apply_env_overrides(value: &mut Value) -> Result<(), ConfigError> {
    let overrides: HashMap<String, String> = std::env::vars()
        .filter(|(k, _)| k.starts_with(ENV_PREFIX))
        .collect();

    for (key, raw) in overrides {
        let path: Vec<String> = key[ENV_PREFIX.len()..]
            .split("__")
            .map(|s| s.to_lowercase())
            .collect();
        if path.is_empty() {
            continue;
        }
        let parsed: Value = serde_yaml::from_str(&raw).unwrap_or(Value::String(raw.clone()));
        set_path(value, &path, parsed);
        debug!(key = %key, "applied environment config override");
    }
    Ok(())
}

fn set_path(value: &mut Value, path: &[String], new_value: Value) {
    if path.is_empty() {
        return;
    }
    if !value.is_mapping() {
        *value = Value::Mapping(Default::default());
    }
    let map = value.as_mapping_mut().unwrap();
    let key = Value::String(path[0].clone());
    if path.len() == 1 {
        map.insert(key, new_value);
        return;
    }
    let entry = map.entry(key).or_insert_with(|| Value::Mapping(Default::default()));
    set_path(entry, &path[1..], new_value);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_defaults_with_no_override() {
        std::env::remove_var("PMOPLAYER_CONFIG_DIR");
        let cfg = PlayerConfig::load(None).unwrap();
        assert_eq!(cfg.jitter.count, 8);
        assert_eq!(cfg.rtp.clock_rate, 48_000);
    }

    #[test]
    fn external_file_overlays_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "jitter:\n  count: 32\n").unwrap();
        let cfg = PlayerConfig::load(Some(&path)).unwrap();
        assert_eq!(cfg.jitter.count, 32);
        // untouched fields keep their default
        assert_eq!(cfg.jitter.block_size, 4096);
    }

    #[test]
    fn env_override_wins_over_file_and_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "jitter:\n  count: 32\n").unwrap();
        std::env::set_var("PMOPLAYER__JITTER__COUNT", "64");
        let cfg = PlayerConfig::load(Some(&path)).unwrap();
        std::env::remove_var("PMOPLAYER__JITTER__COUNT");
        assert_eq!(cfg.jitter.count, 64);
    }
}
