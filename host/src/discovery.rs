// SPDX-License-Identifier: Apache-2.0

//! The Discovery Service (spec §4.5): walks a set of root directories
//! looking for plugin executables, reads an adjacent YAML/JSON manifest if
//! one exists, and synthesizes a default when it doesn't. Re-scans on an
//! interval; nothing discovered once is ever removed by a scan (removal is
//! an explicit `Uninstall`).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::Duration;
use walkdir::WalkDir;

const EXECUTABLE_EXTENSIONS: &[&str] = &["exe", "dll", "so", "dylib"];
const EXECUTABLE_BASENAMES: &[&str] = &[
	"plugin", "main", "run", "start", "server", "daemon", "asr", "tts", "llm", "device", "utility",
];

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PluginManifest {
	pub name: String,
	#[serde(default = "default_version")]
	pub version: String,
	#[serde(default)]
	pub description: String,
	#[serde(default)]
	pub author: String,
	#[serde(default, rename = "type")]
	pub plugin_type: String,
	#[serde(default)]
	pub tags: Vec<String>,
	#[serde(default)]
	pub capabilities: Vec<String>,
	#[serde(default)]
	pub metadata: HashMap<String, serde_json::Value>,
}

fn default_version() -> String {
	"1.0.0".to_string()
}

#[derive(Debug, Clone)]
pub struct DiscoveredPlugin {
	pub id: String,
	pub executable_path: PathBuf,
	pub manifest: PluginManifest,
}

/// Base filename without extension, non-alphanumeric/hyphen/underscore
/// characters replaced with `-`; an empty result defaults to `"plugin"`
/// (spec §4.5).
fn synthesize_plugin_id(path: &Path) -> String {
	let stem = path
		.file_stem()
		.and_then(|s| s.to_str())
		.unwrap_or_default();
	let id: String = stem
		.chars()
		.map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
		.collect();
	if id.is_empty() {
		"plugin".to_string()
	} else {
		id
	}
}

fn looks_like_plugin_executable(path: &Path) -> bool {
	if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
		if EXECUTABLE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()) {
			return true;
		}
	}
	path.file_stem()
		.and_then(|s| s.to_str())
		.map(|stem| EXECUTABLE_BASENAMES.contains(&stem.to_ascii_lowercase().as_str()))
		.unwrap_or(false)
}

fn read_manifest_sidecar(executable: &Path) -> Option<PluginManifest> {
	let yaml_path = with_extra_suffix(executable, "yaml");
	if yaml_path.exists() {
		if let Ok(contents) = std::fs::read_to_string(&yaml_path) {
			if let Ok(manifest) = serde_yaml::from_str(&contents) {
				return Some(manifest);
			}
		}
	}
	let json_path = with_extra_suffix(executable, "json");
	if json_path.exists() {
		if let Ok(contents) = std::fs::read_to_string(&json_path) {
			if let Ok(manifest) = serde_json::from_str(&contents) {
				return Some(manifest);
			}
		}
	}
	None
}

fn with_extra_suffix(path: &Path, suffix: &str) -> PathBuf {
	let mut os = path.as_os_str().to_owned();
	os.push(".");
	os.push(suffix);
	PathBuf::from(os)
}

fn synthesize_default_manifest(path: &Path) -> PluginManifest {
	let name = path
		.file_stem()
		.and_then(|s| s.to_str())
		.unwrap_or("plugin")
		.to_string();
	PluginManifest { name, version: default_version(), ..Default::default() }
}

pub struct DiscoveryService {
	roots: Vec<PathBuf>,
	pub scan_interval: Duration,
	found: RwLock<HashMap<String, DiscoveredPlugin>>,
}

impl DiscoveryService {
	pub fn new(roots: Vec<PathBuf>, scan_interval: Duration) -> Self {
		DiscoveryService { roots, scan_interval, found: RwLock::new(HashMap::new()) }
	}

	/// Walks all roots once, merging newly found plugins into the internal
	/// map (existing entries for the same id are left untouched).
	pub fn scan(&self) {
		for root in &self.roots {
			for entry in WalkDir::new(root).into_iter().filter_map(Result::ok) {
				if !entry.file_type().is_file() {
					continue;
				}
				let path = entry.path();
				if !looks_like_plugin_executable(path) {
					continue;
				}
				let id = synthesize_plugin_id(path);
				let manifest = read_manifest_sidecar(path).unwrap_or_else(|| synthesize_default_manifest(path));
				let mut found = self.found.write().expect("discovery lock poisoned");
				found.entry(id.clone()).or_insert(DiscoveredPlugin {
					id,
					executable_path: path.to_path_buf(),
					manifest,
				});
			}
		}
	}

	/// Snapshot of everything discovered so far.
	pub fn discover(&self) -> Vec<DiscoveredPlugin> {
		self.found.read().expect("discovery lock poisoned").values().cloned().collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn plugin_id_replaces_non_word_chars_with_hyphen() {
		assert_eq!(synthesize_plugin_id(Path::new("./plugins/foo bar.so")), "foo-bar");
	}

	#[test]
	fn plugin_id_empty_stem_falls_back_to_plugin() {
		assert_eq!(synthesize_plugin_id(Path::new("./plugins/...")), "plugin");
	}

	#[test]
	fn recognizes_extension_and_basename_heuristics() {
		assert!(looks_like_plugin_executable(Path::new("foo.so")));
		assert!(looks_like_plugin_executable(Path::new("server")));
		assert!(!looks_like_plugin_executable(Path::new("readme.md")));
	}

	#[test]
	fn missing_sidecar_synthesizes_default_manifest() {
		let manifest = synthesize_default_manifest(Path::new("./plugins/foo.so"));
		assert_eq!(manifest.name, "foo");
		assert_eq!(manifest.version, "1.0.0");
	}
}
