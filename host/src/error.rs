// SPDX-License-Identifier: Apache-2.0

//! One flat error enum for the host crate (spec §7), following the plugin
//! SDK's convention rather than an ad hoc `Box<dyn Error>`.

use std::result::Result as StdResult;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("capability '{0}' is not registered with any provider")]
	CapabilityNotFound(String),

	#[error("provider '{0}' is not registered")]
	ProviderNotFound(String),

	#[error("capability id '{0}' is already registered by another provider")]
	DuplicateCapability(String),

	#[error("plugin '{0}' is already installed")]
	AlreadyInstalled(String),

	#[error("plugin '{0}' is not installed")]
	NotInstalled(String),

	#[error("plugin '{0}' is already running")]
	AlreadyRunning(String),

	#[error("no configuration found for provider type '{0}'")]
	ProviderConfigNotFound(String),

	#[error("provider type '{0}' has no known capability mapping")]
	UnknownProviderType(String),

	#[error("no free port available for plugin '{0}'")]
	NoPortAvailable(String),

	#[error("failed to spawn plugin process: {0}")]
	Spawn(String),

	#[error("failed to connect to plugin RPC server after {0} attempts")]
	ConnectionFailed(usize),

	#[error("malformed plugin manifest at {path}: {source}")]
	ManifestParse {
		path: String,
		#[source]
		source: Box<dyn std::error::Error + Send + Sync>,
	},

	#[error("failed to read configuration file {path}: {source}")]
	ConfigRead {
		path: String,
		#[source]
		source: std::io::Error,
	},

	#[error("failed to parse configuration: {0}")]
	ConfigParse(#[from] toml::de::Error),

	#[error("empty request: {0}")]
	EmptyRequest(String),

	#[error(transparent)]
	Provider(#[from] capgate_proto::ProviderError),

	#[error(transparent)]
	Wire(#[from] capgate_proto::Error),

	#[error("gRPC transport error: {0}")]
	Transport(#[from] tonic::transport::Error),

	#[error("gRPC call failed: {0}")]
	Rpc(#[from] tonic::Status),

	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),
}

pub type Result<T> = StdResult<T, Error>;
