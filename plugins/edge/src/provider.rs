// SPDX-License-Identifier: Apache-2.0

//! `edge_tts` (batch text-to-speech) and `edge_vad` (batch voice-activity
//! detection) — both batch-only executors; neither implements
//! `StreamExecutor`. `edge_vad` exists specifically to exercise the
//! `object`-typed `audio_chunk` edge case documented in SPEC_FULL.md §9: the
//! schema says `type: object` but the runtime contract is a base64-encoded
//! byte string under the `audio_chunk` key.

use async_trait::async_trait;
use base64::Engine;
use capgate_proto::{
	CancellationToken, CapabilityDefinition, CapabilityType, Executor, Property, Provider, ProviderError,
	ProviderResult, Schema,
};
use serde_json::{json, Value};

/// The VAD capability's documented runtime contract: `audio_chunk` is a
/// base64-encoded little-endian 16-bit PCM mono buffer, despite its schema
/// type being the informal `object` (spec §9, Open Question resolution).
const VAD_CAPABILITY: &str = "edge_vad";

fn tts_config_schema() -> Schema {
	Schema::object()
		.with_property("voice", Property::new("string").describe("voice id").with_default(json!("en-US-AriaNeural")))
		.with_property("base_url", Property::new("string").with_default(json!("")))
}

fn tts_input_schema() -> Schema {
	Schema::object()
		.with_property("text", Property::new("string"))
		.require("text")
}

fn tts_output_schema() -> Schema {
	Schema::object()
		.with_property("audio_base64", Property::new("string"))
		.with_property("mime_type", Property::new("string"))
		.with_property("done", Property::new("boolean"))
}

fn vad_input_schema() -> Schema {
	Schema::object()
		.with_property(
			"audio_chunk",
			Property::new("object")
				.describe("base64-encoded 16-bit PCM mono buffer, carried as type:object per the transport's JSON constraints"),
		)
		.require("audio_chunk")
}

fn vad_output_schema() -> Schema {
	Schema::object()
		.with_property("is_speech", Property::new("boolean"))
		.with_property("confidence", Property::new("number"))
}

pub fn capability_definitions() -> Vec<CapabilityDefinition> {
	vec![
		CapabilityDefinition {
			id: "edge_tts".to_string(),
			capability_type: CapabilityType::Tts,
			name: "Edge TTS".to_string(),
			description: "Text-to-speech synthesis".to_string(),
			config_schema: tts_config_schema(),
			input_schema: tts_input_schema(),
			output_schema: tts_output_schema(),
		},
		CapabilityDefinition {
			id: VAD_CAPABILITY.to_string(),
			capability_type: CapabilityType::Vad,
			name: "Edge VAD".to_string(),
			description: "Voice-activity detection over a raw PCM chunk".to_string(),
			config_schema: Schema::object(),
			input_schema: vad_input_schema(),
			output_schema: vad_output_schema(),
		},
	]
}

pub struct EdgeProvider {
	client: reqwest::Client,
}

impl EdgeProvider {
	pub fn new() -> Self {
		EdgeProvider { client: reqwest::Client::new() }
	}
}

impl Default for EdgeProvider {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl Provider for EdgeProvider {
	fn get_capabilities(&self) -> Vec<CapabilityDefinition> {
		capability_definitions()
	}

	async fn create_executor(
		&self,
		capability_id: &str,
		_cancel: CancellationToken,
	) -> ProviderResult<Box<dyn Executor>> {
		match capability_id {
			"edge_tts" => Ok(Box::new(TtsExecutor { client: self.client.clone() })),
			VAD_CAPABILITY => Ok(Box::new(VadExecutor)),
			other => Err(ProviderError::UnknownCapability(other.to_string())),
		}
	}
}

struct TtsExecutor {
	#[allow(dead_code)]
	client: reqwest::Client,
}

#[async_trait]
impl Executor for TtsExecutor {
	async fn execute(&self, config: Value, inputs: Value, _cancel: CancellationToken) -> ProviderResult<Value> {
		let text = inputs
			.get("text")
			.and_then(Value::as_str)
			.ok_or_else(|| ProviderError::Configuration("missing 'text'".to_string()))?;
		if text.is_empty() {
			return Err(ProviderError::Configuration("'text' must not be empty".to_string()));
		}
		let voice = config.get("voice").and_then(Value::as_str).unwrap_or("en-US-AriaNeural");

		// A real implementation dials the vendor's synthesis endpoint; this
		// example plugin synthesizes a silent placeholder buffer so the
		// capability contract can be exercised without vendor credentials.
		let placeholder_pcm = vec![0u8; text.len() * 32];
		let audio_base64 = base64::engine::general_purpose::STANDARD.encode(&placeholder_pcm);

		tracing::debug!(voice, chars = text.len(), "synthesized placeholder audio");
		Ok(json!({ "audio_base64": audio_base64, "mime_type": "audio/pcm", "done": true }))
	}
}

struct VadExecutor;

/// Simple RMS-energy threshold over 16-bit signed PCM samples. Not a
/// production voice-activity model; its job is exercising the transport
/// contract, not accuracy.
fn is_speech(samples: &[i16]) -> (bool, f64) {
	if samples.is_empty() {
		return (false, 0.0);
	}
	let sum_sq: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
	let rms = (sum_sq / samples.len() as f64).sqrt();
	let confidence = (rms / i16::MAX as f64).clamp(0.0, 1.0);
	(confidence > 0.02, confidence)
}

#[async_trait]
impl Executor for VadExecutor {
	async fn execute(&self, _config: Value, inputs: Value, _cancel: CancellationToken) -> ProviderResult<Value> {
		let encoded = inputs
			.get("audio_chunk")
			.and_then(Value::as_str)
			.ok_or_else(|| ProviderError::Configuration("missing 'audio_chunk'".to_string()))?;
		let bytes = base64::engine::general_purpose::STANDARD
			.decode(encoded)
			.map_err(|e| ProviderError::Configuration(format!("invalid base64 audio_chunk: {e}")))?;

		let samples: Vec<i16> = bytes
			.chunks_exact(2)
			.map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
			.collect();
		let (speech, confidence) = is_speech(&samples);

		Ok(json!({ "is_speech": speech, "confidence": confidence }))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn registers_tts_and_vad_with_their_capability_types() {
		let defs = capability_definitions();
		assert_eq!(defs.len(), 2);
		assert!(defs.iter().any(|d| d.id == "edge_tts" && d.capability_type == CapabilityType::Tts));
		assert!(defs.iter().any(|d| d.id == VAD_CAPABILITY && d.capability_type == CapabilityType::Vad));
	}

	#[test]
	fn vad_schema_declares_audio_chunk_as_object_type_despite_byte_payload() {
		let schema = vad_input_schema();
		assert_eq!(schema.properties["audio_chunk"].property_type, "object");
		assert!(schema.required_set().contains("audio_chunk"));
	}

	#[tokio::test]
	async fn tts_executor_rejects_empty_text() {
		let executor = TtsExecutor { client: reqwest::Client::new() };
		let err = executor
			.execute(json!({}), json!({ "text": "" }), CancellationToken::new())
			.await
			.unwrap_err();
		assert!(matches!(err, ProviderError::Configuration(_)));
	}

	#[tokio::test]
	async fn tts_executor_produces_base64_audio_for_nonempty_text() {
		let executor = TtsExecutor { client: reqwest::Client::new() };
		let out = executor
			.execute(json!({}), json!({ "text": "hello" }), CancellationToken::new())
			.await
			.unwrap();
		assert_eq!(out["done"], true);
		assert!(out["audio_base64"].as_str().unwrap().len() > 0);
	}

	#[tokio::test]
	async fn vad_executor_flags_silence_as_not_speech() {
		let silence = vec![0u8; 320];
		let encoded = base64::engine::general_purpose::STANDARD.encode(&silence);
		let out = VadExecutor
			.execute(json!({}), json!({ "audio_chunk": encoded }), CancellationToken::new())
			.await
			.unwrap();
		assert_eq!(out["is_speech"], false);
	}

	#[tokio::test]
	async fn vad_executor_flags_loud_samples_as_speech() {
		let samples: Vec<i16> = (0..160).map(|i| if i % 2 == 0 { i16::MAX / 2 } else { i16::MIN / 2 }).collect();
		let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
		let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
		let out = VadExecutor
			.execute(json!({}), json!({ "audio_chunk": encoded }), CancellationToken::new())
			.await
			.unwrap();
		assert_eq!(out["is_speech"], true);
	}

	#[tokio::test]
	async fn vad_executor_rejects_invalid_base64() {
		let err = VadExecutor
			.execute(json!({}), json!({ "audio_chunk": "not-valid-base64!!" }), CancellationToken::new())
			.await
			.unwrap_err();
		assert!(matches!(err, ProviderError::Configuration(_)));
	}
}
