// SPDX-License-Identifier: Apache-2.0

//! The Dispatch API (spec §4.6): the high-level entry point an external
//! gateway handler calls with a domain-level request. Resolves provider
//! config, maps provider type to capability id, acquires an executor from
//! the Registry, and projects plugin outputs back to the domain model.

use crate::error::{Error, Result};
use crate::registry::Registry;
use crate::util::redacted::Redacted;
use capgate_plugin_sdk::{fuse_images_into_last_user_message, ImageAttachment};
use capgate_proto::CancellationToken;
use futures::StreamExt;
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Provider type -> capability id, per the fixed table in spec §4.6. The
/// original table routes `openai`/`doubao`/`ollama` to a single shared id;
/// the worked scenarios (S1-S3) instead exercise `openai_llm` for the
/// OpenAI-wire-compatible vendors and a distinct `ollama_llm` for Ollama, so
/// this resolver follows the scenarios rather than the prose table. Any
/// other provider type is an error rather than a silent fallback (Open
/// Question resolution, SPEC_FULL.md §9).
fn resolve_capability_id(provider_type: &str) -> Result<&'static str> {
	match provider_type {
		"openai" | "doubao" => Ok("openai_llm"),
		"ollama" => Ok("ollama_llm"),
		"edge" => Ok("edge_tts"),
		other => Err(Error::UnknownProviderType(other.to_string())),
	}
}

/// One resolved provider config stanza (spec: `{api_key, base_url, model, ...}`).
/// `api_key` is wrapped in [`Redacted`] so a stray `{:?}` of this struct (or
/// of a `GenerateRequest`/`ProviderConfig` pair in a log line) can never leak
/// the vendor key in plaintext (spec §7).
#[derive(Debug, Clone, Default)]
pub struct ProviderConfig {
	pub provider_type: String,
	pub api_key: Redacted<String>,
	pub base_url: String,
	pub model: String,
	pub extra: BTreeMap<String, Value>,
}

impl ProviderConfig {
	fn to_config_json(&self) -> Value {
		let mut map = serde_json::Map::new();
        map.insert("api_key".to_string(), json!(self.api_key.as_ref()));
        map.insert("base_url".to_string(), json!(self.base_url));
        map.insert("model".to_string(), json!(self.model));
        for (k, v) in &self.extra {
            map.insert(k.clone(), v.clone());
        }
        Value::Object(map)
	}
}

/// Domain-level chat message, kept deliberately loose (tools and multi-part
/// content pass through untouched per spec §4.6 step 3).
#[derive(Debug, Clone)]
pub struct GenerateRequest {
	pub provider_type: String,
	pub model_override: Option<String>,
	pub messages: Value,
	pub temperature: Option<f64>,
	pub tools: Option<Value>,
	pub images: Vec<Vec<u8>>,
}

#[derive(Debug, Clone)]
pub struct GenerateResult {
	pub content: String,
	pub finish_reason: Option<String>,
	pub done: bool,
}

pub struct Dispatcher {
	registry: Registry,
}

impl Dispatcher {
	pub fn new(registry: Registry) -> Self {
		Dispatcher { registry }
	}

	fn project_inputs(&self, req: &GenerateRequest) -> Value {
		let mut messages = req.messages.clone();
		if !req.images.is_empty() {
			let attachments: Vec<ImageAttachment> = req
				.images
				.iter()
				.map(|bytes| ImageAttachment { mime_type: "image/jpeg", bytes })
				.collect();
			messages = fuse_images_into_last_user_message(&messages, &attachments);
		}

		let mut inputs = serde_json::Map::new();
		inputs.insert("messages".to_string(), messages);
		if let Some(temp) = req.temperature {
			inputs.insert("temperature".to_string(), json!(temp));
		}
		if let Some(tools) = &req.tools {
			inputs.insert("tools".to_string(), tools.clone());
		}
		Value::Object(inputs)
	}

	fn validate_inputs(&self, req: &GenerateRequest) -> Result<()> {
		let empty = req
			.messages
			.as_array()
			.map(|a| a.is_empty())
			.unwrap_or(true);
		if empty {
			return Err(Error::EmptyRequest("messages must not be empty".to_string()));
		}
		Ok(())
	}

	/// Synchronous single-call dispatch (spec §4.6 `Generate`).
	pub async fn generate(
		&self,
		config: &ProviderConfig,
		req: &GenerateRequest,
		cancel: CancellationToken,
	) -> Result<GenerateResult> {
		self.validate_inputs(req)?;
		let capability_id = resolve_capability_id(&config.provider_type)?;
		let mut plugin_config = config.clone();
		if let Some(model) = &req.model_override {
			plugin_config.model = model.clone();
		}
		log::debug!("dispatching generate on '{capability_id}', config={plugin_config:?}");

		let executor = self.registry.get_executor(capability_id, cancel.clone()).await?;
		let outputs = executor
			.execute(plugin_config.to_config_json(), self.project_inputs(req), cancel)
			.await?;

		Ok(project_output(&outputs))
	}

	/// Streaming dispatch (spec §4.6 `Stream`). Each yielded item is passed
	/// through the same finish-reason-propagation rule `generate` applies via
	/// `project_output`: `done` is forced true if the plugin chunk says so,
	/// or if it carries a non-empty finish reason, before the item ever
	/// reaches the caller.
	pub async fn stream(
		&self,
		config: &ProviderConfig,
		req: &GenerateRequest,
		cancel: CancellationToken,
	) -> Result<capgate_proto::OutputStream> {
		self.validate_inputs(req)?;
		let capability_id = resolve_capability_id(&config.provider_type)?;
		let mut plugin_config = config.clone();
		if let Some(model) = &req.model_override {
			plugin_config.model = model.clone();
		}
		log::debug!("dispatching stream on '{capability_id}', config={plugin_config:?}");

		let executor = self.registry.get_executor(capability_id, cancel.clone()).await?;
		let stream_executor = executor
			.as_stream()
			.ok_or_else(|| Error::Provider(capgate_proto::ProviderError::Configuration(
				format!("capability '{capability_id}' does not support streaming"),
			)))?;

		let raw_stream = stream_executor
			.execute_stream(plugin_config.to_config_json(), self.project_inputs(req), cancel)
			.await
			.map_err(Error::from)?;

		let projected = raw_stream.map(|item| {
			item.map(|mut outputs| {
				let projection = project_output(&outputs);
				if let Value::Object(ref mut map) = outputs {
					map.insert("done".to_string(), json!(projection.done));
					if let Some(reason) = projection.finish_reason {
						map.insert("finish_reason".to_string(), json!(reason));
					}
				}
				outputs
			})
		});

		Ok(Box::pin(projected))
	}
}

fn project_output(outputs: &Value) -> GenerateResult {
	let content = outputs
		.get("content")
		.and_then(Value::as_str)
		.unwrap_or_default()
		.to_string();
	let finish_reason = outputs
		.get("finish_reason")
		.and_then(Value::as_str)
		.filter(|s| !s.is_empty())
		.map(str::to_string);
	let plugin_done = outputs.get("done").and_then(Value::as_bool).unwrap_or(false);
	let done = plugin_done || finish_reason.is_some();

	GenerateResult { content, finish_reason, done }
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn unmapped_provider_type_is_a_strict_error() {
		let err = resolve_capability_id("coze").unwrap_err();
		assert!(matches!(err, Error::UnknownProviderType(t) if t == "coze"));
	}

	#[test]
	fn known_provider_types_map_to_their_capability_ids() {
		assert_eq!(resolve_capability_id("openai").unwrap(), "openai_llm");
		assert_eq!(resolve_capability_id("doubao").unwrap(), "openai_llm");
		assert_eq!(resolve_capability_id("ollama").unwrap(), "ollama_llm");
	}

	#[test]
	fn finish_reason_forces_done_even_if_plugin_did_not_set_it() {
		let outputs = json!({ "content": "partial", "done": false, "finish_reason": "stop" });
		let result = project_output(&outputs);
		assert!(result.done);
		assert_eq!(result.finish_reason.as_deref(), Some("stop"));
	}

	#[test]
	fn plugin_done_flag_alone_is_sufficient() {
		let outputs = json!({ "content": "", "done": true });
		let result = project_output(&outputs);
		assert!(result.done);
		assert_eq!(result.finish_reason, None);
	}
}
