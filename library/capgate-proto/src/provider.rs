// SPDX-License-Identifier: Apache-2.0

//! The `Provider`/`Executor` contract (spec §3, §4.2). A `Provider` is a
//! factory for executors; an `Executor` performs one invocation. Both the
//! plugin SDK (providers implemented in-process inside a plugin binary) and
//! the host (a `RemoteProvider` that proxies these calls over gRPC to a
//! spawned plugin process) implement the same trait, per the Open Question
//! resolution in SPEC_FULL.md §9: process supervision is a Runtime Adapter
//! concern orthogonal to the `Provider` contract itself.

use crate::capability::CapabilityDefinition;
use futures::stream::BoxStream;
use serde_json::Value;
use std::result::Result as StdResult;

pub use tokio_util::sync::CancellationToken;

/// The failure mode of a capability call, as distinct from a transport- or
/// protocol-level `capgate_proto::Error`.
#[derive(Debug, thiserror::Error, Clone)]
pub enum ProviderError {
	#[error("unknown capability '{0}'")]
	UnknownCapability(String),

	#[error("missing or invalid configuration: {0}")]
	Configuration(String),

	#[error("transport error: {0}")]
	Transport(String),

	#[error("upstream vendor error: {0}")]
	Upstream(String),

	#[error("call was cancelled")]
	Cancelled,
}

pub type ProviderResult<T> = StdResult<T, ProviderError>;

/// A stream of output chunks. Finite, forward-only, non-restartable; closes
/// on end-of-stream, cancellation, or an unrecoverable error (spec §3).
pub type OutputStream = BoxStream<'static, ProviderResult<Value>>;

/// A factory for executors, grouping one or more related capabilities from
/// a single vendor (spec glossary). `get_capabilities` is pure and
/// idempotent; `create_executor` yields a fresh, caller-owned executor on
/// every call.
#[async_trait::async_trait]
pub trait Provider: Send + Sync {
	fn get_capabilities(&self) -> Vec<CapabilityDefinition>;

	async fn create_executor(
		&self,
		capability_id: &str,
		cancel: CancellationToken,
	) -> ProviderResult<Box<dyn Executor>>;
}

/// The runtime object that performs one invocation of a capability.
/// Streaming-capable executors additionally implement [`StreamExecutor`] and
/// expose it via [`Executor::as_stream`] — callers detect stream support
/// with a structural test rather than a capability flag.
#[async_trait::async_trait]
pub trait Executor: Send + Sync {
	/// Blocks until the call completes, `config`/`inputs` are rejected, or
	/// `cancel` fires. On cancellation the implementation must release
	/// underlying resources (connections, tasks) before returning.
	async fn execute(&self, config: Value, inputs: Value, cancel: CancellationToken) -> ProviderResult<Value>;

	/// Structural test for streaming support. Default: batch-only.
	fn as_stream(&self) -> Option<&dyn StreamExecutor> {
		None
	}
}

/// Extends [`Executor`] with a lazy-sequence call. The returned stream's
/// producer has already started by the time this returns; cancelling
/// `cancel` after that must still stop the producer promptly.
#[async_trait::async_trait]
pub trait StreamExecutor: Executor {
	async fn execute_stream(
		&self,
		config: Value,
		inputs: Value,
		cancel: CancellationToken,
	) -> ProviderResult<OutputStream>;
}

pub type BatchExecutor = dyn Executor;
