// SPDX-License-Identifier: Apache-2.0

//! A `Provider` that proxies every call over gRPC to a spawned plugin
//! process. This is the seam between the host's in-process `Provider`
//! abstraction and an out-of-process plugin binary (spec §9, Open Question
//! 1): the dispatch layer and the Registry never know the difference.

use async_trait::async_trait;
use capgate_proto::proto::plugin_service_client::PluginServiceClient;
use capgate_proto::proto::{ExecuteCapabilityRequest, GetPluginInfoRequest};
use capgate_proto::{
	value, CancellationToken, CapabilityDefinition, Executor, OutputStream, Provider, ProviderError,
	ProviderResult, StreamExecutor,
};
use serde_json::Value;
use tonic::transport::Channel;

#[derive(Clone)]
pub struct RemoteProvider {
	client: PluginServiceClient<Channel>,
	capabilities: Vec<CapabilityDefinition>,
}

impl RemoteProvider {
	/// `capabilities` is fetched once at connect time via `GetPluginInfo`
	/// and cached; `get_capabilities` is documented as pure/idempotent, so
	/// re-querying on every call would be wasted RPC traffic.
	pub async fn connect(client: PluginServiceClient<Channel>) -> ProviderResult<Self> {
		let mut client = client;
		let response = client
			.get_plugin_info(GetPluginInfoRequest { plugin_id: String::new() })
			.await
			.map_err(|status| ProviderError::Transport(status.to_string()))?
			.into_inner();

		let capabilities = response
			.capabilities
			.iter()
			.filter_map(|wire| CapabilityDefinition::from_wire(wire).ok())
			.collect();

		Ok(RemoteProvider { client, capabilities })
	}
}

#[async_trait]
impl Provider for RemoteProvider {
	fn get_capabilities(&self) -> Vec<CapabilityDefinition> {
		self.capabilities.clone()
	}

	async fn create_executor(
		&self,
		capability_id: &str,
		_cancel: CancellationToken,
	) -> ProviderResult<Box<dyn Executor>> {
		if !self.capabilities.iter().any(|c| c.id == capability_id) {
			return Err(ProviderError::UnknownCapability(capability_id.to_string()));
		}
		Ok(Box::new(RemoteExecutor {
			client: self.client.clone(),
			capability_id: capability_id.to_string(),
		}))
	}
}

struct RemoteExecutor {
	client: PluginServiceClient<Channel>,
	capability_id: String,
}

#[async_trait]
impl Executor for RemoteExecutor {
	async fn execute(&self, config: Value, inputs: Value, cancel: CancellationToken) -> ProviderResult<Value> {
		let mut client = self.client.clone();
		let request = client.execute_capability(ExecuteCapabilityRequest {
			capability_id: self.capability_id.clone(),
			config_json: value::to_wire_json(&config),
			inputs_json: value::to_wire_json(&inputs),
		});

		let response = tokio::select! {
			res = request => res.map_err(|status| ProviderError::Transport(status.to_string()))?,
			_ = cancel.cancelled() => return Err(ProviderError::Cancelled),
		}
		.into_inner();

		if !response.success {
			return Err(ProviderError::Upstream(response.error_message));
		}
		value::from_wire_json(&response.outputs_json)
			.map_err(|e| ProviderError::Upstream(e.to_string()))
	}

	fn as_stream(&self) -> Option<&dyn StreamExecutor> {
		Some(self)
	}
}

#[async_trait]
impl StreamExecutor for RemoteExecutor {
	async fn execute_stream(
		&self,
		config: Value,
		inputs: Value,
		cancel: CancellationToken,
	) -> ProviderResult<OutputStream> {
		use futures::StreamExt;

		let mut client = self.client.clone();
		let request = client.execute_capability_stream(ExecuteCapabilityRequest {
			capability_id: self.capability_id.clone(),
			config_json: value::to_wire_json(&config),
			inputs_json: value::to_wire_json(&inputs),
		});

		let response = tokio::select! {
			res = request => res.map_err(|status| ProviderError::Transport(status.to_string()))?,
			_ = cancel.cancelled() => return Err(ProviderError::Cancelled),
		};

		let stream = response.into_inner().filter_map(|item| async move {
			match item {
				Ok(chunk) if chunk.stream_finished && !chunk.success => {
					Some(Err(ProviderError::Upstream(chunk.error_message)))
				}
				Ok(chunk) if chunk.stream_finished => None,
				Ok(chunk) => match value::from_wire_json(&chunk.outputs_json) {
					Ok(v) => Some(Ok(v)),
					Err(e) => Some(Err(ProviderError::Upstream(e.to_string()))),
				},
				Err(status) => Some(Err(ProviderError::Transport(status.to_string()))),
			}
		});

		// Stops polling the gRPC stream promptly on cancellation rather than
		// continuing to read from a call the caller no longer wants, per the
		// "producers must not leak" rule.
		let cancellable = tokio_stream::StreamExt::take_until(stream, cancel.cancelled_owned());

		Ok(Box::pin(cancellable))
	}
}
