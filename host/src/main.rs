// SPDX-License-Identifier: Apache-2.0

mod bootstrap;
mod cli;
mod config;
mod discovery;
mod dispatch;
mod error;
mod lifecycle;
mod registry;
mod remote_provider;
mod util;
mod version;

use clap::Parser;
use cli::{Args, Commands, PluginCommands};
use error::Result;
use std::time::Duration;

#[tokio::main]
async fn main() {
	let args = Args::parse();

	let mut builder = env_logger::Builder::from_default_env();
	if args.quiet {
		builder.filter_level(log::LevelFilter::Error);
	}
	builder.init();

	if let Err(e) = run(args).await {
		log::error!("{e}");
		std::process::exit(1);
	}
}

async fn run(args: Args) -> Result<()> {
	match args.command {
		Commands::Serve => serve(args.config.as_deref()).await,
		Commands::Discover => discover(args.config.as_deref()),
		Commands::Plugin { command } => plugin_command(args.config.as_deref(), command).await,
	}
}

async fn serve(config_path: Option<&str>) -> Result<()> {
	let runtime = bootstrap::bootstrap(config_path)?;
	log::info!("capgated {} starting", version::host_version());

	for metadata in runtime.lifecycle.list() {
		if let Err(e) = runtime.lifecycle.enable(&metadata.id).await {
			log::warn!("failed to enable plugin '{}': {e}", metadata.id);
		}
	}

	let rescan_task = spawn_rescan_task(runtime.discovery.clone(), runtime.lifecycle.clone(), runtime.config.clone());

	log::info!("serving; press ctrl-c to stop");
	let _ = tokio::signal::ctrl_c().await;
	rescan_task.abort();

	log::info!("shutting down");
	let close_timeout = Duration::from_secs(runtime.config.lifecycle_close_timeout_secs);
	if tokio::time::timeout(close_timeout, runtime.lifecycle.close()).await.is_err() {
		log::warn!("shutdown did not complete within {close_timeout:?}, exiting anyway");
	}
	Ok(())
}

/// Re-walks the discovery roots every `scan_interval` and installs anything
/// newly found (spec §4.5). Newly discovered plugins are installed but not
/// auto-enabled, matching the same explicit-enable rule bootstrap follows.
fn spawn_rescan_task(
	discovery: std::sync::Arc<discovery::DiscoveryService>,
	lifecycle: std::sync::Arc<lifecycle::LifecycleManager>,
	config: config::Config,
) -> tokio::task::JoinHandle<()> {
	let mut interval = tokio::time::interval(discovery.scan_interval);
	interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
	tokio::spawn(async move {
		// First tick fires immediately; the bootstrap scan already covered it.
		interval.tick().await;
		loop {
			interval.tick().await;
			log::debug!("periodic rescan starting");
			bootstrap::install_discovered(&discovery, &lifecycle, &config);
		}
	})
}

fn discover(config_path: Option<&str>) -> Result<()> {
	let runtime = bootstrap::bootstrap(config_path)?;
	for metadata in runtime.lifecycle.list() {
		println!("{}\t{}\t{:?}", metadata.id, metadata.name, metadata.status);
	}
	Ok(())
}

async fn plugin_command(config_path: Option<&str>, command: PluginCommands) -> Result<()> {
	let runtime = bootstrap::bootstrap(config_path)?;
	match command {
		PluginCommands::List => {
			for metadata in runtime.lifecycle.list() {
				println!("{}\t{}\t{:?}", metadata.id, metadata.name, metadata.status);
			}
		}
		PluginCommands::Install { plugin_id, config } => {
			let provider_config = match config {
				Some(path) => {
					let contents = std::fs::read_to_string(&path)?;
					serde_json::from_str(&contents).map_err(|e| {
						error::Error::ManifestParse { path, source: Box::new(e) }
					})?
				}
				None => serde_json::Value::Null,
			};
			let entrypoint = runtime
				.discovery
				.discover()
				.into_iter()
				.find(|p| p.id == plugin_id)
				.map(|p| p.executable_path.display().to_string())
				.unwrap_or_default();
			runtime.lifecycle.install(&plugin_id, &entrypoint, provider_config)?;
			println!("installed '{plugin_id}'");
		}
		PluginCommands::Enable { plugin_id } => {
			runtime.lifecycle.enable(&plugin_id).await?;
			println!("enabled '{plugin_id}'");
		}
		PluginCommands::Disable { plugin_id } => {
			runtime.lifecycle.disable(&plugin_id).await?;
			println!("disabled '{plugin_id}'");
		}
		PluginCommands::Uninstall { plugin_id } => {
			runtime.lifecycle.uninstall(&plugin_id).await?;
			println!("uninstalled '{plugin_id}'");
		}
	}
	Ok(())
}
