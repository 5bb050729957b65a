// SPDX-License-Identifier: Apache-2.0

//! Wires the Registry, Lifecycle Manager, and Discovery Service together in
//! one explicit pass (spec §9: an explicit `bootstrap()` function rather
//! than ctor-based global provider registration).

use crate::config::Config;
use crate::discovery::DiscoveryService;
use crate::error::Result;
use crate::lifecycle::LifecycleManager;
use crate::registry::Registry;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub struct Runtime {
	pub config: Config,
	pub registry: Registry,
	pub lifecycle: Arc<LifecycleManager>,
	pub discovery: Arc<DiscoveryService>,
}

/// Loads configuration, scans the discovery roots once, installs every
/// plugin found (without enabling it — enabling is a separate, explicit
/// step so a freshly-discovered plugin never starts without being asked
/// to), and returns the assembled runtime. `lifecycle`/`discovery` are
/// `Arc`-wrapped so `serve()` can hand shared handles to its periodic
/// rescan task.
pub fn bootstrap(config_path: Option<&str>) -> Result<Runtime> {
	let path = Config::resolve_path(config_path);
	let config = Config::load(&path)?;

	let registry = Registry::new();

	let ports: HashMap<String, u16> = config.ports.iter().map(|(k, v)| (k.clone(), *v)).collect();
	let rpc_stop_timeout = Duration::from_secs(config.rpc_stop_timeout_secs);
	let lifecycle = Arc::new(LifecycleManager::new(registry.clone(), ports, rpc_stop_timeout));

	let discovery = Arc::new(DiscoveryService::new(
		config.existing_discovery_roots(),
		Duration::from_secs(config.scan_interval_secs),
	));
	install_discovered(&discovery, &lifecycle, &config);

	Ok(Runtime { config, registry, lifecycle, discovery })
}

/// Scans `discovery`'s roots and installs any plugin not already tracked by
/// `lifecycle`. Shared between the initial bootstrap scan and every tick of
/// the periodic rescan task started by `serve()` (spec §4.5).
pub fn install_discovered(discovery: &DiscoveryService, lifecycle: &LifecycleManager, config: &Config) {
	discovery.scan();
	for plugin in discovery.discover() {
		let provider_config = config
			.providers
			.get(&plugin.id)
			.cloned()
			.unwrap_or(serde_json::Value::Null);
		let entrypoint = plugin.executable_path.display().to_string();
		match lifecycle.install(&plugin.id, &entrypoint, provider_config) {
			Ok(()) => log::info!("discovered and installed plugin '{}'", plugin.id),
			Err(e) => log::debug!("plugin '{}' already installed: {e}", plugin.id),
		}
	}
}
