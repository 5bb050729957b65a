// SPDX-License-Identifier: Apache-2.0

//! Everything a capability plugin binary needs: the RPC server that speaks
//! the host protocol, and a couple of reusable helpers (think-tag filtering,
//! vision input fusion) that most LLM-shaped providers end up wanting.
//!
//! A plugin author builds one or more `capgate_proto::Provider` impls, hands
//! them to [`server::PluginServer::register`], and calls `.listen_local(port)`
//! from `main`. Everything else here is optional.

pub mod error;
pub mod server;
pub mod think_filter;
pub mod vision;

pub use error::{Error, Result};
pub use server::{Host, PluginServer};
pub use think_filter::ThinkTagFilter;
pub use vision::{fuse_images_into_last_user_message, ImageAttachment};

/// Re-exported so plugin binaries don't need to depend on `capgate-proto`
/// directly just to implement `Provider`.
pub use capgate_proto;

/// Initializes a `tracing` subscriber reading its filter from `RUST_LOG`
/// (default `info`). Call once at the top of `main`, before
/// `PluginServer::listen*`.
pub fn init_tracing_logger() {
	use tracing_subscriber::EnvFilter;

	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
	let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
