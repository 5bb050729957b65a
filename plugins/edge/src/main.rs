// SPDX-License-Identifier: Apache-2.0

mod provider;

use capgate_plugin_sdk::{init_tracing_logger, PluginServer};
use capgate_proto::PluginInfo;
use clap::Parser;
use provider::EdgeProvider;
use std::sync::Arc;

#[derive(Parser, Debug)]
struct Args {
	#[arg(long)]
	port: u16,

	#[arg(trailing_var_arg(true), allow_hyphen_values(true), hide = true)]
	unknown_args: Vec<String>,
}

#[tokio::main]
async fn main() -> capgate_plugin_sdk::Result<()> {
	let args = Args::parse();
	init_tracing_logger();

	let info = PluginInfo {
		plugin_id: "edge".to_string(),
		name: "Edge".to_string(),
		version: env!("CARGO_PKG_VERSION").to_string(),
		description: "Text-to-speech and voice-activity-detection provider".to_string(),
	};

	PluginServer::register(info, vec![Arc::new(EdgeProvider::new())])?
		.listen_local(args.port)
		.await
}
