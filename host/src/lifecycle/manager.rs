// SPDX-License-Identifier: Apache-2.0

//! Runtime Adapters: the strategies for actually getting a plugin process
//! running and reachable over gRPC (spec §9, Open Question 1). Only the
//! local-binary adapter is complete; container and remote-service adapters
//! are stubs behind the same trait so the seam is real without pretending
//! those strategies ship.

use crate::error::{Error, Result};
use crate::remote_provider::RemoteProvider;
use async_trait::async_trait;
use capgate_proto::proto::plugin_service_client::PluginServiceClient;
use rand::Rng;
use std::ffi::OsString;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use tokio::time::{sleep_until, Duration, Instant};

/// A plugin process (if any) plus the `Provider` the host dispatches
/// through. `process` is `None` for adapters that don't own a local child
/// (container/remote-service).
pub struct RunningPlugin {
	pub provider: RemoteProvider,
	pub process: Option<Child>,
}

#[async_trait]
pub trait RuntimeAdapter: Send + Sync {
	async fn start(&self, plugin_id: &str, entrypoint: &str, port: u16) -> Result<RunningPlugin>;
}

/// Spawns a local executable and dials it over loopback gRPC, retrying the
/// connection with linear backoff plus jitter. Grounded directly on this
/// codebase's existing plugin-process supervision logic.
#[derive(Clone, Debug)]
pub struct LocalBinaryAdapter {
	pub max_spawn_attempts: usize,
	pub max_conn_attempts: usize,
	pub backoff_interval: Duration,
	pub jitter_percent: u8,
}

impl LocalBinaryAdapter {
	pub fn new(
		max_spawn_attempts: usize,
		max_conn_attempts: usize,
		backoff_interval_micros: u64,
		jitter_percent: u8,
	) -> Self {
		LocalBinaryAdapter {
			max_spawn_attempts,
			max_conn_attempts,
			backoff_interval: Duration::from_micros(backoff_interval_micros),
			jitter_percent: jitter_percent.min(100),
		}
	}

	fn connect_jitter_duration(&self, attempt: u32) -> Duration {
		let jitter: i32 = rand::rng().random_range(0..(2 * self.jitter_percent as i32));
		let jitter_percent = 1.0 + ((jitter - self.jitter_percent as i32) as f64 / 100.0);
		self.backoff_interval
			.saturating_mul(attempt)
			.mul_f64(jitter_percent.clamp(0.0, 2.0))
	}
}

#[async_trait]
impl RuntimeAdapter for LocalBinaryAdapter {
	async fn start(&self, plugin_id: &str, entrypoint: &str, port: u16) -> Result<RunningPlugin> {
		let mut parts = entrypoint.split_whitespace();
		let bin = parts
			.next()
			.ok_or_else(|| Error::Spawn(format!("empty entrypoint for plugin '{plugin_id}'")))?;
		let extra_args: Vec<&str> = parts.collect();

		let resolved_bin = which::which_in::<&str, &OsString, &Path>(bin, None, Path::new("."))
			.map_err(|e| Error::Spawn(format!("failed to resolve binary '{bin}': {e}")))?;

		let mut spawn_attempts = 0;
		while spawn_attempts < self.max_spawn_attempts {
			let port_str = port.to_string();
			log::debug!("spawning plugin '{plugin_id}' ({entrypoint}) on port {port_str}");

			let mut cmd = Command::new(&resolved_bin);
			cmd.args(&extra_args)
				.arg("--port")
				.arg(&port_str)
				.stdout(Stdio::inherit())
				.stderr(Stdio::inherit());

			let Ok(mut process) = cmd.spawn() else {
				spawn_attempts += 1;
				continue;
			};

			let mut conn_attempts = 0;
			let mut connected = None;
			while conn_attempts < self.max_conn_attempts {
				let sleep_duration = self.connect_jitter_duration(conn_attempts as u32);
				sleep_until(Instant::now() + sleep_duration).await;
				match PluginServiceClient::connect(format!("http://127.0.0.1:{port_str}")).await {
					Ok(client) => {
						connected = Some(client);
						break;
					}
					Err(_) => conn_attempts += 1,
				}
			}

			let Some(client) = connected else {
				let _ = process.kill();
				spawn_attempts += 1;
				continue;
			};

			let provider = RemoteProvider::connect(client).await?;
			return Ok(RunningPlugin { provider, process: Some(process) });
		}

		Err(Error::ConnectionFailed(self.max_conn_attempts))
	}
}

/// Not yet implemented: launching a plugin as a container workload.
pub struct ContainerAdapter;

#[async_trait]
impl RuntimeAdapter for ContainerAdapter {
	async fn start(&self, plugin_id: &str, _entrypoint: &str, _port: u16) -> Result<RunningPlugin> {
		Err(Error::Spawn(format!(
			"container runtime adapter not yet implemented (plugin '{plugin_id}')"
		)))
	}
}

/// Not yet implemented: dialing a plugin already running as an external
/// remote service, with no local process to supervise.
pub struct RemoteServiceAdapter;

#[async_trait]
impl RuntimeAdapter for RemoteServiceAdapter {
	async fn start(&self, plugin_id: &str, _entrypoint: &str, _port: u16) -> Result<RunningPlugin> {
		Err(Error::Spawn(format!(
			"remote-service runtime adapter not yet implemented (plugin '{plugin_id}')"
		)))
	}
}
