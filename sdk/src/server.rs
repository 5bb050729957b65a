// SPDX-License-Identifier: Apache-2.0

//! The gRPC server every plugin binary runs. Implements the protocol
//! (spec §4.3) on top of whatever `Provider`s the plugin author registers;
//! the plugin author never touches `tonic` directly.

use crate::error::Error;
use capgate_proto::proto::{
	plugin_service_server::{PluginService, PluginServiceServer},
	ExecuteCapabilityRequest, ExecuteCapabilityResponse, GetPluginInfoRequest,
	GetPluginInfoResponse, HealthCheckRequest, HealthCheckResponse,
};
use capgate_proto::{value, CancellationToken, CapabilityDefinition, Executor, PluginInfo, Provider, ProviderError};
use std::{collections::HashMap, net::Ipv4Addr, net::SocketAddr, sync::Arc};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{transport::Server, Request, Response, Status};

/// Mirrors this codebase's existing `Host` enum: loopback for local
/// development, any-interface for containerized deployments.
#[derive(Debug, Clone)]
pub enum Host {
	Loopback,
	Any,
}

impl Host {
	fn to_socket_addr(&self, port: u16) -> SocketAddr {
		match self {
			Host::Loopback => SocketAddr::new(Ipv4Addr::new(127, 0, 0, 1).into(), port),
			Host::Any => SocketAddr::new(Ipv4Addr::new(0, 0, 0, 0).into(), port),
		}
	}
}

struct CapabilityEntry {
	provider: Arc<dyn Provider>,
	definition: CapabilityDefinition,
}

pub struct PluginServer {
	info: PluginInfo,
	capabilities: HashMap<String, CapabilityEntry>,
}

impl PluginServer {
	/// Registers one or more providers under a single plugin identity.
	/// Fails if two providers in this plugin declare the same capability id
	/// (the same all-or-nothing uniqueness invariant the host's Registry
	/// enforces globally, applied locally before the plugin ever advertises
	/// itself).
	pub fn register(info: PluginInfo, providers: Vec<Arc<dyn Provider>>) -> crate::error::Result<Self> {
		let mut capabilities = HashMap::new();
		for provider in providers {
			for definition in provider.get_capabilities() {
				if capabilities.contains_key(&definition.id) {
					return Err(Error::DuplicateCapability(definition.id.clone()));
				}
				capabilities.insert(
					definition.id.clone(),
					CapabilityEntry {
						provider: provider.clone(),
						definition,
					},
				);
			}
		}
		Ok(PluginServer { info, capabilities })
	}

	pub async fn listen_local(self, port: u16) -> crate::error::Result<()> {
		self.listen(Host::Loopback, port).await
	}

	pub async fn listen(self, host: Host, port: u16) -> crate::error::Result<()> {
		let addr = host.to_socket_addr(port);
		tracing::info!(%addr, plugin_id = %self.info.plugin_id, "starting plugin RPC server");
		Server::builder()
			.add_service(PluginServiceServer::new(self))
			.serve_with_shutdown(addr, shutdown_signal())
			.await
			.map_err(Error::FailedToStartServer)?;
		Ok(())
	}

	async fn executor_for(
		&self,
		capability_id: &str,
		cancel: CancellationToken,
	) -> std::result::Result<Box<dyn Executor>, ProviderError> {
		let entry = self
			.capabilities
			.get(capability_id)
			.ok_or_else(|| ProviderError::UnknownCapability(capability_id.to_string()))?;
		entry.provider.create_executor(capability_id, cancel).await
	}
}

/// Resolves once `ctrl_c` or (on unix) `SIGTERM` arrives, letting
/// `serve_with_shutdown` drain in-flight requests instead of dropping
/// connections mid-call.
async fn shutdown_signal() {
	let ctrl_c = async {
		tokio::signal::ctrl_c().await.expect("failed to install ctrl-c handler");
	};

	#[cfg(unix)]
	let terminate = async {
		tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
			.expect("failed to install SIGTERM handler")
			.recv()
			.await;
	};
	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => {},
		_ = terminate => {},
	}
}

#[tonic::async_trait]
impl PluginService for PluginServer {
	type ExecuteCapabilityStreamStream = ReceiverStream<Result<ExecuteCapabilityResponse, Status>>;

	async fn get_plugin_info(
		&self,
		_req: Request<GetPluginInfoRequest>,
	) -> Result<Response<GetPluginInfoResponse>, Status> {
		let capabilities = self
			.capabilities
			.values()
			.map(|entry| entry.definition.to_wire())
			.collect();
		Ok(Response::new(GetPluginInfoResponse {
			info: Some(capgate_proto::proto::PluginInfo {
				plugin_id: self.info.plugin_id.clone(),
				name: self.info.name.clone(),
				version: self.info.version.clone(),
				description: self.info.description.clone(),
			}),
			capabilities,
		}))
	}

	async fn execute_capability(
		&self,
		req: Request<ExecuteCapabilityRequest>,
	) -> Result<Response<ExecuteCapabilityResponse>, Status> {
		let req = req.into_inner();
		let cancel = CancellationToken::new();
		let response = match self.executor_for(&req.capability_id, cancel.clone()).await {
			Err(e) => error_response(&e),
			Ok(executor) => {
				let config = decode_or_error(&req.config_json);
				let inputs = decode_or_error(&req.inputs_json);
				match (config, inputs) {
					(Ok(config), Ok(inputs)) => match executor.execute(config, inputs, cancel).await {
						Ok(outputs) => ExecuteCapabilityResponse {
							success: true,
							outputs_json: value::to_wire_json(&outputs),
							error_message: String::new(),
							stream_finished: true,
						},
						Err(e) => error_response(&e),
					},
					_ => error_response(&ProviderError::Configuration(
						"malformed config/inputs JSON".to_string(),
					)),
				}
			}
		};
		Ok(Response::new(response))
	}

	async fn execute_capability_stream(
		&self,
		req: Request<ExecuteCapabilityRequest>,
	) -> Result<Response<Self::ExecuteCapabilityStreamStream>, Status> {
		let req = req.into_inner();
		let (tx, rx) = mpsc::channel(10);
		let cancel = CancellationToken::new();

		let executor = self.executor_for(&req.capability_id, cancel.clone()).await;
		let config = decode_or_error(&req.config_json);
		let inputs = decode_or_error(&req.inputs_json);

		// The client hanging up (dropping its receiving end) must stop the
		// producer promptly rather than let it run to completion unread.
		let watcher_cancel = cancel.clone();
		let watcher_tx = tx.clone();
		tokio::spawn(async move {
			watcher_tx.closed().await;
			watcher_cancel.cancel();
		});

		tokio::spawn(async move {
			let terminal = match (executor, config, inputs) {
				(Err(e), _, _) => Some(error_response(&e)),
				(_, Err(_), _) | (_, _, Err(_)) => Some(error_response(&ProviderError::Configuration(
					"malformed config/inputs JSON".to_string(),
				))),
				(Ok(executor), Ok(config), Ok(inputs)) => {
					match executor.as_stream() {
						None => Some(error_response(&ProviderError::Configuration(
							"capability does not support streaming".to_string(),
						))),
						Some(stream_executor) => {
							match stream_executor.execute_stream(config, inputs, cancel).await {
								Err(e) => Some(error_response(&e)),
								Ok(mut stream) => {
									use futures::StreamExt;
									let mut closed = false;
									while let Some(item) = stream.next().await {
										let resp = match item {
											Ok(outputs) => ExecuteCapabilityResponse {
												success: true,
												outputs_json: value::to_wire_json(&outputs),
												error_message: String::new(),
												stream_finished: false,
											},
											Err(e) => {
												closed = true;
												error_response(&e)
											}
										};
										if tx.send(Ok(resp)).await.is_err() {
											return;
										}
										if closed {
											return;
										}
									}
									// Clean end-of-stream: emit the terminal marker.
									Some(ExecuteCapabilityResponse {
										success: true,
										outputs_json: value::to_wire_json(&serde_json::Value::Null),
										error_message: String::new(),
										stream_finished: true,
									})
								}
							}
						}
					}
				}
			};
			if let Some(terminal) = terminal {
				let _ = tx.send(Ok(terminal)).await;
			}
		});

		Ok(Response::new(ReceiverStream::new(rx)))
	}

	async fn health_check(
		&self,
		req: Request<HealthCheckRequest>,
	) -> Result<Response<HealthCheckResponse>, Status> {
		let plugin_id = req.into_inner().plugin_id;
		let nominal = self.capabilities.keys().next().cloned();
		let response = match nominal {
			None => HealthCheckResponse {
				healthy: false,
				message: "plugin advertises no capabilities".to_string(),
				details: HashMap::new(),
			},
			Some(capability_id) => match self.executor_for(&capability_id, CancellationToken::new()).await {
				Ok(_) => HealthCheckResponse {
					healthy: true,
					message: "ok".to_string(),
					details: HashMap::from([("plugin_id".to_string(), plugin_id)]),
				},
				Err(e) => HealthCheckResponse {
					healthy: false,
					message: e.to_string(),
					details: HashMap::new(),
				},
			},
		};
		Ok(Response::new(response))
	}
}

fn decode_or_error(raw: &str) -> std::result::Result<serde_json::Value, ()> {
	value::from_wire_json(raw).map_err(|_| ())
}

fn error_response(e: &ProviderError) -> ExecuteCapabilityResponse {
	ExecuteCapabilityResponse {
		success: false,
		outputs_json: String::new(),
		error_message: e.to_string(),
		stream_finished: true,
	}
}
