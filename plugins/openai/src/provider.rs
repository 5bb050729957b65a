// SPDX-License-Identifier: Apache-2.0

//! The OpenAI-wire-compatible LLM provider: `openai_llm` (text) and
//! `openai_vllm` (vision-capable; image fusion already happened upstream in
//! the host's dispatch preprocessor, so this executor only ever sees plain
//! `messages`). Both capabilities share one executor implementation.

use async_stream::stream;
use async_trait::async_trait;
use capgate_plugin_sdk::ThinkTagFilter;
use capgate_proto::{
	CancellationToken, CapabilityDefinition, CapabilityType, Executor, OutputStream, Property, Provider,
	ProviderError, ProviderResult, Schema, StreamExecutor,
};
use futures::StreamExt;
use serde_json::{json, Value};

fn config_schema() -> Schema {
	Schema::object()
		.with_property("api_key", Property::new("string").describe("vendor API key").secret())
		.with_property(
			"base_url",
			Property::new("string")
				.describe("override base URL; defaults to the OpenAI API")
				.with_default(json!("")),
		)
		.with_property("model", Property::new("string").describe("model identifier"))
		.require("api_key")
		.require("model")
}

fn input_schema() -> Schema {
	Schema::object()
		.with_property("messages", Property::new("array").describe("chat-style message list"))
		.with_property("temperature", Property::new("number"))
		.with_property("tools", Property::new("array"))
		.require("messages")
}

fn output_schema() -> Schema {
	Schema::object()
		.with_property("content", Property::new("string"))
		.with_property("finish_reason", Property::new("string"))
		.with_property("done", Property::new("boolean"))
}

pub fn capability_definitions() -> Vec<CapabilityDefinition> {
	vec![
		CapabilityDefinition {
			id: "openai_llm".to_string(),
			capability_type: CapabilityType::Llm,
			name: "OpenAI Chat".to_string(),
			description: "Chat completion against an OpenAI-wire-compatible endpoint".to_string(),
			config_schema: config_schema(),
			input_schema: input_schema(),
			output_schema: output_schema(),
		},
		CapabilityDefinition {
			id: "openai_vllm".to_string(),
			capability_type: CapabilityType::Llm,
			name: "OpenAI Vision Chat".to_string(),
			description: "Chat completion with image-bearing messages already fused by the host"
				.to_string(),
			config_schema: config_schema(),
			input_schema: input_schema(),
			output_schema: output_schema(),
		},
	]
}

pub struct OpenAiProvider {
	client: reqwest::Client,
}

impl OpenAiProvider {
	pub fn new() -> Self {
		OpenAiProvider { client: reqwest::Client::new() }
	}
}

impl Default for OpenAiProvider {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl Provider for OpenAiProvider {
	fn get_capabilities(&self) -> Vec<CapabilityDefinition> {
		capability_definitions()
	}

	async fn create_executor(
		&self,
		capability_id: &str,
		_cancel: CancellationToken,
	) -> ProviderResult<Box<dyn Executor>> {
		match capability_id {
			"openai_llm" | "openai_vllm" => {
				Ok(Box::new(OpenAiExecutor { client: self.client.clone() }))
			}
			other => Err(ProviderError::UnknownCapability(other.to_string())),
		}
	}
}

struct OpenAiExecutor {
	client: reqwest::Client,
}

#[derive(Debug, serde::Deserialize)]
struct ConfigShape {
	api_key: String,
	#[serde(default)]
	base_url: String,
	model: String,
}

fn endpoint(config: &ConfigShape) -> String {
	if config.base_url.is_empty() {
		"https://api.openai.com/v1/chat/completions".to_string()
	} else {
		format!("{}/chat/completions", config.base_url.trim_end_matches('/'))
	}
}

/// Models identified as qwen3 get `/no_think ` prepended to the last
/// user-role message, per the vendor-agnostic think-tag convention this
/// plugin honors regardless of which vendor is actually fronting the model.
fn apply_no_think_prefix(model: &str, messages: &mut Value) {
	if !model.to_ascii_lowercase().starts_with("qwen3") {
		return;
	}
	let Some(array) = messages.as_array_mut() else { return };
	if let Some(last_user) = array
		.iter_mut()
		.rev()
		.find(|m| m.get("role").and_then(Value::as_str) == Some("user"))
	{
		if let Some(content) = last_user.get("content").and_then(Value::as_str) {
			let prefixed = format!("/no_think {content}");
			last_user["content"] = json!(prefixed);
		}
	}
}

fn parse_config(config: &Value) -> ProviderResult<ConfigShape> {
	serde_json::from_value(config.clone())
		.map_err(|e| ProviderError::Configuration(format!("invalid config: {e}")))
}

#[async_trait]
impl Executor for OpenAiExecutor {
	async fn execute(&self, config: Value, inputs: Value, cancel: CancellationToken) -> ProviderResult<Value> {
		let config = parse_config(&config)?;
		let mut messages = inputs
			.get("messages")
			.cloned()
			.ok_or_else(|| ProviderError::Configuration("missing 'messages'".to_string()))?;
		apply_no_think_prefix(&config.model, &mut messages);

		let mut body = json!({ "model": config.model, "messages": messages, "stream": false });
		if let Some(temp) = inputs.get("temperature") {
			body["temperature"] = temp.clone();
		}
		if let Some(tools) = inputs.get("tools") {
			body["tools"] = tools.clone();
		}

		let request = self.client.post(endpoint(&config)).bearer_auth(&config.api_key).json(&body).send();
		let response = tokio::select! {
			res = request => res.map_err(|e| ProviderError::Transport(e.to_string()))?,
			_ = cancel.cancelled() => return Err(ProviderError::Cancelled),
		};

		if !response.status().is_success() {
			let status = response.status();
			let text = response.text().await.unwrap_or_default();
			return Err(ProviderError::Upstream(format!("{status}: {text}")));
		}

		let parsed: Value = response
			.json()
			.await
			.map_err(|e| ProviderError::Upstream(format!("malformed response: {e}")))?;

		let content = parsed["choices"][0]["message"]["content"].as_str().unwrap_or_default();
		let finish_reason = parsed["choices"][0]["finish_reason"].as_str().unwrap_or_default();
		Ok(json!({ "content": content, "finish_reason": finish_reason, "done": true }))
	}

	fn as_stream(&self) -> Option<&dyn StreamExecutor> {
		Some(self)
	}
}

#[async_trait]
impl StreamExecutor for OpenAiExecutor {
	async fn execute_stream(
		&self,
		config: Value,
		inputs: Value,
		cancel: CancellationToken,
	) -> ProviderResult<OutputStream> {
		let config = parse_config(&config)?;
		let mut messages = inputs
			.get("messages")
			.cloned()
			.ok_or_else(|| ProviderError::Configuration("missing 'messages'".to_string()))?;
		apply_no_think_prefix(&config.model, &mut messages);

		let mut body = json!({ "model": config.model, "messages": messages, "stream": true });
		if let Some(temp) = inputs.get("temperature") {
			body["temperature"] = temp.clone();
		}
		if let Some(tools) = inputs.get("tools") {
			body["tools"] = tools.clone();
		}

		let request = self.client.post(endpoint(&config)).bearer_auth(&config.api_key).json(&body).send();
		let response = tokio::select! {
			res = request => res.map_err(|e| ProviderError::Transport(e.to_string()))?,
			_ = cancel.cancelled() => return Err(ProviderError::Cancelled),
		};

		if !response.status().is_success() {
			let status = response.status();
			let text = response.text().await.unwrap_or_default();
			return Err(ProviderError::Upstream(format!("{status}: {text}")));
		}

		let out = stream! {
			let mut bytes_stream = response.bytes_stream();
			let mut buffer = String::new();
			let mut filter = ThinkTagFilter::new();

			loop {
				let chunk_result = tokio::select! {
					next = bytes_stream.next() => next,
					_ = cancel.cancelled() => {
						yield Err(ProviderError::Cancelled);
						return;
					}
				};
				let Some(chunk_result) = chunk_result else { break };
				let chunk = match chunk_result {
					Ok(c) => c,
					Err(e) => {
						yield Err(ProviderError::Transport(e.to_string()));
						return;
					}
				};
				buffer.push_str(&String::from_utf8_lossy(&chunk));

				while let Some(line_end) = buffer.find('\n') {
					let line = buffer[..line_end].trim().to_string();
					buffer.drain(..=line_end);

					let Some(data) = line.strip_prefix("data: ") else { continue };
					if data == "[DONE]" {
						let tail = std::mem::take(&mut filter).finish();
						if !tail.is_empty() {
							yield Ok(json!({ "content": tail, "done": false }));
						}
						yield Ok(json!({ "content": "", "done": true }));
						return;
					}

					let parsed: Value = match serde_json::from_str(data) {
						Ok(v) => v,
						Err(e) => {
							yield Err(ProviderError::Upstream(format!("malformed chunk: {e}")));
							continue;
						}
					};
					let delta = parsed["choices"][0]["delta"]["content"].as_str().unwrap_or_default();
					let finish_reason = parsed["choices"][0]["finish_reason"].as_str();

					let visible = filter.push(delta);
					if !visible.is_empty() || finish_reason.is_some() {
						yield Ok(json!({
							"content": visible,
							"done": false,
						}));
					}
					if finish_reason.is_some() {
						yield Ok(json!({ "content": "", "done": true }));
						return;
					}
				}
			}
			let tail = std::mem::take(&mut filter).finish();
			if !tail.is_empty() {
				yield Ok(json!({ "content": tail, "done": false }));
			}
			yield Ok(json!({ "content": "", "done": true }));
		};

		Ok(Box::pin(out))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn registers_exactly_two_capabilities_with_required_config() {
		let defs = capability_definitions();
		let mut ids: Vec<&str> = defs.iter().map(|d| d.id.as_str()).collect();
		ids.sort();
		assert_eq!(ids, vec!["openai_llm", "openai_vllm"]);
		for def in &defs {
			assert_eq!(def.capability_type, CapabilityType::Llm);
			assert_eq!(def.config_schema.required_set(), ["api_key", "model"].into());
		}
	}

	#[test]
	fn qwen3_model_gets_no_think_prefix_on_last_user_message() {
		let mut messages = json!([
			{ "role": "system", "content": "s" },
			{ "role": "user", "content": "hello" },
		]);
		apply_no_think_prefix("qwen3-7b", &mut messages);
		assert_eq!(messages[1]["content"], "/no_think hello");
		assert_eq!(messages[0]["content"], "s");
	}

	#[test]
	fn non_qwen3_model_is_untouched() {
		let mut messages = json!([{ "role": "user", "content": "hi" }]);
		apply_no_think_prefix("gpt-3.5-turbo", &mut messages);
		assert_eq!(messages[0]["content"], "hi");
	}

	#[test]
	fn unknown_capability_id_is_rejected() {
		let provider = OpenAiProvider::new();
		let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
		let err = rt
			.block_on(provider.create_executor("not_a_capability", CancellationToken::new()))
			.unwrap_err();
		assert!(matches!(err, ProviderError::UnknownCapability(id) if id == "not_a_capability"));
	}
}
