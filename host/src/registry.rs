// SPDX-License-Identifier: Apache-2.0

//! The Capability Registry (spec §4.1, §3): a concurrent index from
//! provider id and capability id to the provider that serves it. Reads take
//! a shared lock; writes take an exclusive one; `get_executor` releases the
//! lock before invoking the provider's factory method so registry
//! contention never blocks on arbitrary provider logic.

use crate::error::{Error, Result};
use capgate_proto::{CancellationToken, CapabilityDefinition, Executor, Provider};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

#[derive(Default)]
struct Indexes {
	providers: HashMap<String, Arc<dyn Provider>>,
	capabilities: HashMap<String, CapabilityDefinition>,
	cap_to_provider: HashMap<String, String>,
}

/// Thread-safe; clone freely, all instances share the same underlying maps.
#[derive(Clone, Default)]
pub struct Registry {
	inner: Arc<RwLock<Indexes>>,
}

impl Registry {
	pub fn new() -> Self {
		Registry::default()
	}

	/// Registers every capability the provider declares, atomically: if any
	/// id collides with an existing registration, nothing is added.
	pub fn register(&self, provider_id: &str, provider: Arc<dyn Provider>) -> Result<()> {
		let definitions = provider.get_capabilities();

		let mut guard = self.inner.write().expect("registry lock poisoned");
		for def in &definitions {
			if guard.capabilities.contains_key(&def.id) {
				return Err(Error::DuplicateCapability(def.id.clone()));
			}
		}
		for def in definitions {
			guard.cap_to_provider.insert(def.id.clone(), provider_id.to_string());
			guard.capabilities.insert(def.id.clone(), def);
		}
		guard.providers.insert(provider_id.to_string(), provider);
		Ok(())
	}

	/// Resolves `capability_id` to a provider, releases the lock, then
	/// invokes `create_executor` outside the critical section.
	pub async fn get_executor(
		&self,
		capability_id: &str,
		cancel: CancellationToken,
	) -> Result<Box<dyn Executor>> {
		let provider = {
			let guard = self.inner.read().expect("registry lock poisoned");
			let provider_id = guard
				.cap_to_provider
				.get(capability_id)
				.ok_or_else(|| Error::CapabilityNotFound(capability_id.to_string()))?;
			guard
				.providers
				.get(provider_id)
				.cloned()
				.ok_or_else(|| Error::ProviderNotFound(provider_id.clone()))?
		};
		Ok(provider.create_executor(capability_id, cancel).await?)
	}

	pub fn get_provider(&self, provider_id: &str) -> Option<Arc<dyn Provider>> {
		self.inner
			.read()
			.expect("registry lock poisoned")
			.providers
			.get(provider_id)
			.cloned()
	}

	pub fn get_all_providers(&self) -> HashMap<String, Arc<dyn Provider>> {
		self.inner.read().expect("registry lock poisoned").providers.clone()
	}

	/// Removes a provider and every capability it owns. Used by
	/// `Disable`/`Uninstall` once the underlying plugin process has
	/// stopped; a disabled plugin's capabilities must not resolve.
	pub fn unregister(&self, provider_id: &str) {
		let mut guard = self.inner.write().expect("registry lock poisoned");
		guard.providers.remove(provider_id);
		guard
			.cap_to_provider
			.retain(|_, owner| owner != provider_id);
		let owned_ids: Vec<String> = guard
			.capabilities
			.iter()
			.filter(|(id, _)| !guard.cap_to_provider.contains_key(id.as_str()))
			.map(|(id, _)| id.clone())
			.collect();
		for id in owned_ids {
			guard.capabilities.remove(&id);
		}
	}

	/// Snapshot; safe to iterate without holding any lock.
	pub fn list_capabilities(&self) -> Vec<CapabilityDefinition> {
		self.inner
			.read()
			.expect("registry lock poisoned")
			.capabilities
			.values()
			.cloned()
			.collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use async_trait::async_trait;
	use capgate_proto::{CapabilityType, ProviderError, ProviderResult, Schema};
	use serde_json::Value;

	struct StubProvider {
		ids: Vec<&'static str>,
	}

	#[async_trait]
	impl Provider for StubProvider {
		fn get_capabilities(&self) -> Vec<CapabilityDefinition> {
			self.ids
				.iter()
				.map(|id| CapabilityDefinition {
					id: id.to_string(),
					capability_type: CapabilityType::Llm,
					name: id.to_string(),
					description: String::new(),
					config_schema: Schema::object(),
					input_schema: Schema::object(),
					output_schema: Schema::object(),
				})
				.collect()
		}

		async fn create_executor(
			&self,
			capability_id: &str,
			_cancel: CancellationToken,
		) -> ProviderResult<Box<dyn Executor>> {
			struct StubExecutor;
			#[async_trait]
			impl Executor for StubExecutor {
				async fn execute(
					&self,
					_config: Value,
					_inputs: Value,
					_cancel: CancellationToken,
				) -> ProviderResult<Value> {
					Ok(Value::Null)
				}
			}
			if self.ids.contains(&capability_id) {
				Ok(Box::new(StubExecutor))
			} else {
				Err(ProviderError::UnknownCapability(capability_id.to_string()))
			}
		}
	}

	#[test]
	fn register_then_list_returns_all_capabilities() {
		let registry = Registry::new();
		registry
			.register("openai", Arc::new(StubProvider { ids: vec!["openai_llm", "openai_vllm"] }))
			.unwrap();

		let mut ids: Vec<String> = registry.list_capabilities().into_iter().map(|d| d.id).collect();
		ids.sort();
		assert_eq!(ids, vec!["openai_llm".to_string(), "openai_vllm".to_string()]);
	}

	#[test]
	fn duplicate_capability_across_providers_is_rejected_without_partial_update() {
		let registry = Registry::new();
		registry
			.register("openai", Arc::new(StubProvider { ids: vec!["shared_id"] }))
			.unwrap();

		let err = registry
			.register("ollama", Arc::new(StubProvider { ids: vec!["shared_id", "ollama_only"] }))
			.unwrap_err();
		assert!(matches!(err, Error::DuplicateCapability(id) if id == "shared_id"));

		// Second registration must not have partially landed.
		assert!(registry.get_provider("ollama").is_none());
		assert_eq!(registry.list_capabilities().len(), 1);
	}

	#[tokio::test]
	async fn get_executor_resolves_registered_capability() {
		let registry = Registry::new();
		registry
			.register("openai", Arc::new(StubProvider { ids: vec!["openai_llm"] }))
			.unwrap();

		assert!(registry.get_executor("openai_llm", CancellationToken::new()).await.is_ok());
	}

	#[tokio::test]
	async fn get_executor_on_unknown_capability_is_a_structured_error() {
		let registry = Registry::new();
		let err = registry.get_executor("nonexistent", CancellationToken::new()).await.unwrap_err();
		assert!(matches!(err, Error::CapabilityNotFound(id) if id == "nonexistent"));
	}
}
