// SPDX-License-Identifier: Apache-2.0

//! Data structures for the host's CLI (spec §10), mirroring this codebase's
//! `clap`-derived `Args`/subcommand layering.

use clap::{Parser, Subcommand};

/// Discovers, launches, supervises, and routes requests to capability
/// provider plugins.
#[derive(Debug, Parser)]
#[command(name = "capgated", version, about, long_about = None)]
pub struct Args {
	/// Path to the configuration file.
	#[arg(short, long, value_name = "FILE", global = true)]
	pub config: Option<String>,

	/// Silence non-error output.
	#[arg(short = 'q', long, global = true)]
	pub quiet: bool,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
	/// Run the host: start discovery, enable configured plugins, and serve
	/// dispatch requests until terminated.
	Serve,
	/// Scan the discovery roots once and print what would be registered.
	Discover,
	/// Plugin lifecycle operations.
	Plugin {
		#[command(subcommand)]
		command: PluginCommands,
	},
}

#[derive(Debug, Subcommand)]
pub enum PluginCommands {
	/// List installed plugins and their status.
	List,
	/// Install a plugin by id.
	Install {
		plugin_id: String,
		/// Path to a JSON file with the plugin's config, if any.
		#[arg(long)]
		config: Option<String>,
	},
	/// Enable (start) an installed plugin.
	Enable { plugin_id: String },
	/// Disable (stop) a running plugin.
	Disable { plugin_id: String },
	/// Uninstall a plugin, stopping it first if running.
	Uninstall { plugin_id: String },
}
