// SPDX-License-Identifier: Apache-2.0

//! Fuses image inputs into a chat-style message list for vendors whose wire
//! format expects multi-part user content (spec §4.2: "vision/VLLM image
//! input fusion"). Vendor-specific request builders call this once they've
//! already decided they're talking to a vision-capable model; it only
//! rewrites the message list, it doesn't know about HTTP or SSE.

use base64::Engine;
use serde_json::{json, Value};

/// One image to attach, already decoded into bytes plus its MIME type.
pub struct ImageAttachment<'a> {
	pub mime_type: &'a str,
	pub bytes: &'a [u8],
}

impl<'a> ImageAttachment<'a> {
	fn to_data_uri(&self) -> String {
		let encoded = base64::engine::general_purpose::STANDARD.encode(self.bytes);
		format!("data:{};base64,{}", self.mime_type, encoded)
	}
}

/// Rewrites the last user message in `messages` (an OpenAI-chat-style array
/// of `{role, content}` objects) into multi-part content carrying the
/// original text plus one `image_url` part per attachment. Messages are
/// otherwise left untouched. If there is no user message at all, one is
/// appended holding only the images.
///
/// `messages` must be a JSON array; anything else is returned unchanged.
pub fn fuse_images_into_last_user_message(messages: &Value, images: &[ImageAttachment]) -> Value {
	let Some(array) = messages.as_array() else {
		return messages.clone();
	};
	if images.is_empty() {
		return messages.clone();
	}

	let mut out = array.clone();
	let last_user_idx = out
		.iter()
		.rposition(|m| m.get("role").and_then(Value::as_str) == Some("user"));

	let image_parts: Vec<Value> = images
		.iter()
		.map(|img| {
			json!({
				"type": "image_url",
				"image_url": { "url": img.to_data_uri() },
			})
		})
		.collect();

	match last_user_idx {
		Some(idx) => {
			let existing_text = out[idx]
				.get("content")
				.and_then(Value::as_str)
				.map(|s| s.to_string());

			let mut parts = Vec::new();
			if let Some(text) = existing_text {
				if !text.is_empty() {
					parts.push(json!({ "type": "text", "text": text }));
				}
			} else if let Some(existing_parts) = out[idx].get("content").and_then(Value::as_array) {
				parts.extend(existing_parts.clone());
			}
			parts.extend(image_parts);

			out[idx] = json!({ "role": "user", "content": Value::Array(parts) });
		}
		None => {
			out.push(json!({ "role": "user", "content": Value::Array(image_parts) }));
		}
	}

	Value::Array(out)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn text_message(role: &str, text: &str) -> Value {
		json!({ "role": role, "content": text })
	}

	#[test]
	fn attaches_image_to_trailing_text_of_last_user_message() {
		let messages = json!([
			text_message("system", "be helpful"),
			text_message("user", "what is this?"),
		]);
		let image = ImageAttachment {
			mime_type: "image/png",
			bytes: b"fake-bytes",
		};
		let fused = fuse_images_into_last_user_message(&messages, &[image]);

		let fused = fused.as_array().unwrap();
		assert_eq!(fused.len(), 2);
		let last = &fused[1];
		assert_eq!(last["role"], "user");
		let parts = last["content"].as_array().unwrap();
		assert_eq!(parts.len(), 2);
		assert_eq!(parts[0]["type"], "text");
		assert_eq!(parts[0]["text"], "what is this?");
		assert_eq!(parts[1]["type"], "image_url");
		assert!(parts[1]["image_url"]["url"]
			.as_str()
			.unwrap()
			.starts_with("data:image/png;base64,"));
	}

	#[test]
	fn only_rewrites_the_last_user_message() {
		let messages = json!([
			text_message("user", "first question"),
			text_message("assistant", "first answer"),
			text_message("user", "second question"),
		]);
		let image = ImageAttachment {
			mime_type: "image/jpeg",
			bytes: b"x",
		};
		let fused = fuse_images_into_last_user_message(&messages, &[image]);
		let fused = fused.as_array().unwrap();

		assert_eq!(fused[0]["content"], "first question");
		assert_eq!(fused[2]["role"], "user");
		assert!(fused[2]["content"].is_array());
	}

	#[test]
	fn appends_a_user_message_when_none_exists() {
		let messages = json!([text_message("system", "be helpful")]);
		let image = ImageAttachment {
			mime_type: "image/png",
			bytes: b"x",
		};
		let fused = fuse_images_into_last_user_message(&messages, &[image]);
		let fused = fused.as_array().unwrap();

		assert_eq!(fused.len(), 2);
		assert_eq!(fused[1]["role"], "user");
	}

	#[test]
	fn no_images_leaves_messages_untouched() {
		let messages = json!([text_message("user", "hello")]);
		let fused = fuse_images_into_last_user_message(&messages, &[]);
		assert_eq!(fused, messages);
	}
}
