// SPDX-License-Identifier: Apache-2.0

mod provider;

use capgate_plugin_sdk::{init_tracing_logger, PluginServer};
use capgate_proto::PluginInfo;
use clap::Parser;
use provider::OpenAiProvider;
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
		plugin_id: "openai".to_string(),
		name: "OpenAI".to_string(),
		version: env!("CARGO_PKG_VERSION").to_string(),
		description: "OpenAI-wire-compatible chat completion provider".to_string(),
	};

	PluginServer::register(info, vec![Arc::new(OpenAiProvider::new())])?
		.listen_local(args.port)
		.await
}
