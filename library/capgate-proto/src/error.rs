// SPDX-License-Identifier: Apache-2.0

use std::result::Result as StdResult;

/// Errors that can occur while moving values across the plugin RPC boundary:
/// JSON (de)serialization of the dynamic config/inputs/outputs payloads and
/// schema-wire conversion. Distinct from `ProviderError`, which is the
/// failure mode of a capability call itself.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("invalid JSON payload on the wire")]
	InvalidJson(#[from] serde_json::Error),

	#[error("schema property '{0}' has no type tag")]
	MissingSchemaType(String),

	#[error("unknown capability type '{0}'")]
	UnknownCapabilityType(String),
}

pub type Result<T> = StdResult<T, Error>;
