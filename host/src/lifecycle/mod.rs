// SPDX-License-Identifier: Apache-2.0

//! The Plugin Lifecycle Manager (spec §4.4): install → enable → running →
//! disable → uninstall, plus the `error` terminal state for failed
//! transitions. One exclusive lock guards every mutation; `start_plugin`/
//! `stop_plugin` assume the caller already holds it.

pub mod manager;

use crate::error::{Error, Result};
use crate::registry::Registry;
use manager::{LocalBinaryAdapter, RunningPlugin, RuntimeAdapter};
use std::collections::HashMap;
use std::process::Child;
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginStatus {
	Installed,
	Running,
	Disabled,
	Stopped,
	Error,
	/// No provider registered under this id when metadata was last derived;
	/// distinct from `Error`, which is a failed runtime transition.
	Unknown,
}

/// Record owned exclusively by the Lifecycle Manager (spec §3); other
/// components reference plugins by id, never by holding this directly.
#[derive(Debug, Clone)]
pub struct PluginMetadata {
	pub id: String,
	pub name: String,
	pub plugin_type: String,
	pub description: String,
	/// Left blank: neither `Provider::get_capabilities` nor the
	/// `GetPluginInfo` wire response carries a per-provider version today.
	pub version: String,
	pub entrypoint: String,
	pub status: PluginStatus,
	pub config: serde_json::Value,
	pub created_at: u64,
	pub updated_at: u64,
}

fn now_unix_secs() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_secs())
		.unwrap_or(0)
}

/// Display names for known provider ids, used by `auto_discover_plugins`
/// when no manifest name is available (spec §4.4).
const KNOWN_PROVIDER_NAMES: &[(&str, &str)] = &[
	("openai", "OpenAI"),
	("ollama", "Ollama"),
	("coze", "Coze"),
	("doubao", "Doubao"),
	("chatglm", "ChatGLM"),
	("deepgram", "Deepgram"),
	("gosherpa", "GoSherpa"),
	("stepfun", "StepFun"),
	("edge", "Edge"),
];

fn display_name_for(provider_id: &str) -> String {
	KNOWN_PROVIDER_NAMES
		.iter()
		.find(|(id, _)| *id == provider_id)
		.map(|(_, name)| name.to_string())
		.unwrap_or_else(|| provider_id.to_string())
}

struct Active {
	process: Option<Child>,
}

pub struct LifecycleManager {
	registry: Registry,
	adapter: Box<dyn RuntimeAdapter>,
	ports: HashMap<String, u16>,
	metadata: Mutex<HashMap<String, PluginMetadata>>,
	active: Mutex<HashMap<String, Active>>,
	rpc_stop_timeout: Duration,
}

impl LifecycleManager {
	pub fn new(registry: Registry, ports: HashMap<String, u16>, rpc_stop_timeout: Duration) -> Self {
		LifecycleManager {
			registry,
			adapter: Box::new(LocalBinaryAdapter::new(3, 5, 1_000, 10)),
			ports,
			metadata: Mutex::new(HashMap::new()),
			active: Mutex::new(HashMap::new()),
			rpc_stop_timeout,
		}
	}

	/// Populates name/type/description by querying the Registry's provider
	/// for `plugin_id` (spec §4.4); a plugin that hasn't been enabled yet has
	/// no provider registered, so this most commonly falls back to blank
	/// fields and `PluginStatus::Unknown` rather than resolving anything.
	pub fn install(&self, plugin_id: &str, entrypoint: &str, config: serde_json::Value) -> Result<()> {
		let mut metadata = self.metadata.lock().expect("lifecycle lock poisoned");
		if metadata.contains_key(plugin_id) {
			return Err(Error::AlreadyInstalled(plugin_id.to_string()));
		}
		let now = now_unix_secs();
		let (name, plugin_type, description, status) = match self.registry.get_provider(plugin_id) {
			Some(provider) => match provider.get_capabilities().into_iter().next() {
				Some(def) => (def.name, def.capability_type.as_str().to_string(), def.description, PluginStatus::Installed),
				None => (String::new(), "unknown".to_string(), String::new(), PluginStatus::Installed),
			},
			None => (String::new(), "unknown".to_string(), String::new(), PluginStatus::Unknown),
		};
		metadata.insert(
			plugin_id.to_string(),
			PluginMetadata {
				id: plugin_id.to_string(),
				name,
				plugin_type,
				description,
				version: String::new(),
				entrypoint: entrypoint.to_string(),
				status,
				config,
				created_at: now,
				updated_at: now,
			},
		);
		Ok(())
	}

	pub async fn uninstall(&self, plugin_id: &str) -> Result<()> {
		{
			let metadata = self.metadata.lock().expect("lifecycle lock poisoned");
			if !metadata.contains_key(plugin_id) {
				return Err(Error::NotInstalled(plugin_id.to_string()));
			}
		}
		if self.is_running(plugin_id) {
			self.disable(plugin_id).await?;
		}
		self.metadata.lock().expect("lifecycle lock poisoned").remove(plugin_id);
		Ok(())
	}

	pub async fn enable(&self, plugin_id: &str) -> Result<()> {
		let entrypoint = {
			let metadata = self.metadata.lock().expect("lifecycle lock poisoned");
			let record = metadata
				.get(plugin_id)
				.ok_or_else(|| Error::NotInstalled(plugin_id.to_string()))?;
			if record.status == PluginStatus::Running {
				return Err(Error::AlreadyRunning(plugin_id.to_string()));
			}
			record.entrypoint.clone()
		};

		let port = *self
			.ports
			.get(plugin_id)
			.ok_or_else(|| Error::NoPortAvailable(plugin_id.to_string()))?;

		match self.adapter.start(plugin_id, &entrypoint, port).await {
			Ok(RunningPlugin { provider, process }) => {
				self.registry.register(plugin_id, std::sync::Arc::new(provider))?;
				self.active.lock().expect("lifecycle lock poisoned").insert(
					plugin_id.to_string(),
					Active { process },
				);
				self.set_status(plugin_id, PluginStatus::Running);
				Ok(())
			}
			Err(e) => {
				self.set_status(plugin_id, PluginStatus::Error);
				Err(e)
			}
		}
	}

	/// Graceful stop (spec §4.3): sends `SIGTERM` and gives the process up to
	/// `rpc_stop_timeout` to exit on its own before force-killing it.
	pub async fn disable(&self, plugin_id: &str) -> Result<()> {
		{
			let metadata = self.metadata.lock().expect("lifecycle lock poisoned");
			metadata
				.get(plugin_id)
				.ok_or_else(|| Error::NotInstalled(plugin_id.to_string()))?;
		}
		self.registry.unregister(plugin_id);
		if let Some(mut active) = self.active.lock().expect("lifecycle lock poisoned").remove(plugin_id) {
			if let Some(mut process) = active.process.take() {
				self.stop_gracefully(plugin_id, &mut process).await;
			}
		}
		self.set_status(plugin_id, PluginStatus::Disabled);
		Ok(())
	}

	async fn stop_gracefully(&self, plugin_id: &str, process: &mut Child) {
		let pid = process.id() as libc::pid_t;
		// SAFETY: `pid` names a child process we own and have not yet reaped.
		let sent = unsafe { libc::kill(pid, libc::SIGTERM) } == 0;
		if !sent {
			let _ = process.kill();
			return;
		}

		let deadline = tokio::time::Instant::now() + self.rpc_stop_timeout;
		loop {
			match process.try_wait() {
				Ok(Some(_)) => return,
				Ok(None) if tokio::time::Instant::now() >= deadline => break,
				Ok(None) => tokio::time::sleep(Duration::from_millis(50)).await,
				Err(e) => {
					log::warn!("failed to poll plugin '{plugin_id}' during graceful stop: {e}");
					break;
				}
			}
		}
		log::warn!("plugin '{plugin_id}' did not exit within the graceful stop timeout, forcing kill");
		let _ = process.kill();
	}

	pub fn get_plugin_status(&self, plugin_id: &str) -> Result<PluginMetadata> {
		self.metadata
			.lock()
			.expect("lifecycle lock poisoned")
			.get(plugin_id)
			.cloned()
			.ok_or_else(|| Error::NotInstalled(plugin_id.to_string()))
	}

	pub fn list(&self) -> Vec<PluginMetadata> {
		self.metadata.lock().expect("lifecycle lock poisoned").values().cloned().collect()
	}

	/// Creates `installed` records for any provider already in the Registry
	/// but not yet tracked here (spec §4.4).
	pub fn auto_discover_plugins(&self) {
		let known_providers = self.registry.get_all_providers();
		let mut metadata = self.metadata.lock().expect("lifecycle lock poisoned");
		for provider_id in known_providers.keys() {
			if !metadata.contains_key(provider_id) {
				let now = now_unix_secs();
				metadata.insert(
					provider_id.clone(),
					PluginMetadata {
						id: provider_id.clone(),
						name: display_name_for(provider_id),
						plugin_type: "unknown".to_string(),
						description: String::new(),
						version: String::new(),
						entrypoint: String::new(),
						status: PluginStatus::Installed,
						config: serde_json::Value::Null,
						created_at: now,
						updated_at: now,
					},
				);
			}
		}
	}

	/// Stops every running plugin. Callers are expected to bound this with
	/// their own timeout (spec: 10s for `Close`); a `tokio::time::timeout`
	/// wrapper around the call provides that at the call site.
	pub async fn close(&self) {
		let running: Vec<String> = self
			.metadata
			.lock()
			.expect("lifecycle lock poisoned")
			.values()
			.filter(|m| m.status == PluginStatus::Running)
			.map(|m| m.id.clone())
			.collect();
		for plugin_id in running {
			if let Err(e) = self.disable(&plugin_id).await {
				log::warn!("failed to stop plugin '{plugin_id}' during shutdown: {e}");
			}
		}
	}

	fn is_running(&self, plugin_id: &str) -> bool {
		self.metadata
			.lock()
			.expect("lifecycle lock poisoned")
			.get(plugin_id)
			.map(|m| m.status == PluginStatus::Running)
			.unwrap_or(false)
	}

	fn set_status(&self, plugin_id: &str, status: PluginStatus) {
		if let Some(record) = self.metadata.lock().expect("lifecycle lock poisoned").get_mut(plugin_id) {
			record.status = status;
			record.updated_at = now_unix_secs();
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn manager() -> LifecycleManager {
		LifecycleManager::new(
			Registry::new(),
			HashMap::from([("openai".to_string(), 15501)]),
			Duration::from_secs(30),
		)
	}

	#[test]
	fn install_uninstall_round_trips_metadata_to_prior_state() {
		let m = manager();
		assert_eq!(m.list().len(), 0);

		m.install("openai", "openai-plugin", serde_json::json!({})).unwrap();
		assert_eq!(m.list().len(), 1);

		// uninstall is sync-safe here because the plugin was never enabled
		let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
		rt.block_on(m.uninstall("openai")).unwrap();
		assert_eq!(m.list().len(), 0);
	}

	#[test]
	fn double_install_fails_without_mutating_state() {
		let m = manager();
		m.install("openai", "openai-plugin", serde_json::json!({})).unwrap();
		let err = m.install("openai", "openai-plugin", serde_json::json!({})).unwrap_err();
		assert!(matches!(err, Error::AlreadyInstalled(id) if id == "openai"));
		assert_eq!(m.list().len(), 1);
	}

	#[test]
	fn status_of_unknown_plugin_is_not_installed() {
		let m = manager();
		let err = m.get_plugin_status("ghost").unwrap_err();
		assert!(matches!(err, Error::NotInstalled(id) if id == "ghost"));
	}

	#[test]
	fn install_without_a_registered_provider_falls_back_to_unknown_status() {
		let m = manager();
		m.install("openai", "openai-plugin", serde_json::json!({})).unwrap();

		let record = m.get_plugin_status("openai").unwrap();
		assert_eq!(record.status, PluginStatus::Unknown);
		assert_eq!(record.name, "");
		assert_eq!(record.plugin_type, "unknown");
	}
}
