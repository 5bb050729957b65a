// SPDX-License-Identifier: Apache-2.0

//! Layered configuration: a TOML file merged with environment overrides and
//! CLI flags (spec §10). The host does not interpret per-provider config
//! stanzas — they are handed opaquely to the lifecycle manager as
//! `serde_json::Value` and passed straight through to `Install`/`Enable`.

use crate::error::Result;
use crate::util::fs::read_toml;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "./capgate.toml";
pub const CONFIG_PATH_ENV_VAR: &str = "CAPGATE_CONFIG";

/// Reserved port range base (spec §6): `openai`=15501, `ollama`=15502, ...
pub const DEFAULT_PORT_BASE: u16 = 15500;

fn default_port_table() -> BTreeMap<String, u16> {
	[
		("openai", 15501),
		("ollama", 15502),
		("coze", 15503),
		("doubao", 15504),
		("chatglm", 15505),
		("deepgram", 15506),
		("gosherpa", 15507),
		("stepfun", 15508),
		("edge", 15509),
	]
	.into_iter()
	.map(|(id, port)| (id.to_string(), port))
	.collect()
}

/// Default discovery roots (spec §6): the local `./plugins` directory, the
/// user's `~/.capgate/plugins`, and the system-wide `/opt/capgate/plugins`.
/// The home-directory root is skipped if `dirs::home_dir` can't resolve one.
fn default_scan_roots() -> Vec<String> {
	let mut roots = vec!["./plugins".to_string()];
	if let Some(home) = dirs::home_dir() {
		roots.push(home.join(".capgate/plugins").to_string_lossy().into_owned());
	}
	roots.push("/opt/capgate/plugins".to_string());
	roots
}

const fn default_scan_interval_secs() -> u64 {
	30
}

const fn default_max_spawn_attempts() -> usize {
	3
}

const fn default_max_conn_attempts() -> usize {
	5
}

const fn default_backoff_interval_micros() -> u64 {
	1_000
}

const fn default_jitter_percent() -> u8 {
	10
}

const fn default_grpc_buffer() -> usize {
	10
}

const fn default_lifecycle_close_timeout_secs() -> u64 {
	10
}

const fn default_rpc_stop_timeout_secs() -> u64 {
	30
}

/// Deserialized shape of `capgate.toml`. Every field has a default so an
/// empty or partially-specified file is valid.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
	/// Directories to scan for plugin manifests.
	pub discovery_roots: Vec<String>,
	/// Re-scan cadence, in seconds.
	#[serde(default = "default_scan_interval_secs")]
	pub scan_interval_secs: u64,
	/// provider id -> fixed RPC port.
	pub ports: BTreeMap<String, u16>,
	#[serde(default = "default_max_spawn_attempts")]
	pub max_spawn_attempts: usize,
	#[serde(default = "default_max_conn_attempts")]
	pub max_conn_attempts: usize,
	#[serde(default = "default_backoff_interval_micros")]
	pub backoff_interval_micros: u64,
	#[serde(default = "default_jitter_percent")]
	pub jitter_percent: u8,
	#[serde(default = "default_grpc_buffer")]
	pub grpc_buffer: usize,
	#[serde(default = "default_lifecycle_close_timeout_secs")]
	pub lifecycle_close_timeout_secs: u64,
	#[serde(default = "default_rpc_stop_timeout_secs")]
	pub rpc_stop_timeout_secs: u64,
	/// Opaque per-provider config stanzas, passed through verbatim.
	pub providers: BTreeMap<String, serde_json::Value>,
}

impl Default for Config {
	fn default() -> Self {
		Config {
			discovery_roots: default_scan_roots(),
			scan_interval_secs: default_scan_interval_secs(),
			ports: default_port_table(),
			max_spawn_attempts: default_max_spawn_attempts(),
			max_conn_attempts: default_max_conn_attempts(),
			backoff_interval_micros: default_backoff_interval_micros(),
			jitter_percent: default_jitter_percent(),
			grpc_buffer: default_grpc_buffer(),
			lifecycle_close_timeout_secs: default_lifecycle_close_timeout_secs(),
			rpc_stop_timeout_secs: default_rpc_stop_timeout_secs(),
			providers: BTreeMap::new(),
		}
	}
}

impl Config {
	/// Loads from `path` if it exists, falling back to defaults with a
	/// debug log rather than an error — absence of a config file is normal
	/// for a first run.
	pub fn load(path: &Path) -> Result<Config> {
		if path.exists() {
			log::debug!("loading configuration from '{}'", path.display());
			read_toml(path)
		} else {
			log::debug!(
				"no configuration file found at '{}', using defaults",
				path.display()
			);
			Ok(Config::default())
		}
	}

	/// Resolves the config path from `--config`, then `$CAPGATE_CONFIG`,
	/// then the default relative path, in that order.
	pub fn resolve_path(cli_flag: Option<&str>) -> PathBuf {
		if let Some(flag) = cli_flag {
			return PathBuf::from(flag);
		}
		if let Ok(env_path) = std::env::var(CONFIG_PATH_ENV_VAR) {
			return PathBuf::from(env_path);
		}
		PathBuf::from(DEFAULT_CONFIG_PATH)
	}

	/// Discovery roots filtered to those that exist, falling back to
	/// `./plugins` if none do (spec §6).
	pub fn existing_discovery_roots(&self) -> Vec<PathBuf> {
		let existing: Vec<PathBuf> = self
			.discovery_roots
			.iter()
			.map(PathBuf::from)
			.filter(|p| p.exists())
			.collect();
		if existing.is_empty() {
			default_scan_roots().into_iter().map(PathBuf::from).collect()
		} else {
			existing
		}
	}
}
