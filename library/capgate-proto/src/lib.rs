// SPDX-License-Identifier: Apache-2.0

//! Shared wire types, domain traits, and compiled gRPC protocol for the
//! capability plugin runtime. Depended on by both the host (`capgate-host`)
//! and the plugin SDK (`capgate-plugin-sdk`) so the two sides of the RPC
//! agree on the contract by construction.

pub mod capability;
pub mod error;
pub mod provider;
pub mod value;

pub mod proto {
	tonic::include_proto!("capgate.v1");
}

pub use capability::{CapabilityDefinition, CapabilityType, PluginInfo, Property, Schema};
pub use error::{Error, Result};
pub use provider::{
	BatchExecutor, CancellationToken, Executor, OutputStream, Provider, ProviderError, ProviderResult,
	StreamExecutor,
};
pub use value::{from_wire_json, to_wire_json};
