// SPDX-License-Identifier: Apache-2.0

//! The Capability Type/Schema/Definition data model (spec §3) plus its
//! two-way conversion to the wire form used by `GetPluginInfo` (spec §4.3).

use crate::error::{Error, Result};
use crate::proto;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Fixed, closed enumeration of capability categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityType {
	Llm,
	Asr,
	Tts,
	Vad,
	Tool,
}

impl CapabilityType {
	pub fn as_str(&self) -> &'static str {
		match self {
			CapabilityType::Llm => "llm",
			CapabilityType::Asr => "asr",
			CapabilityType::Tts => "tts",
			CapabilityType::Vad => "vad",
			CapabilityType::Tool => "tool",
		}
	}
}

impl std::str::FromStr for CapabilityType {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self> {
		match s.to_ascii_lowercase().as_str() {
			"llm" => Ok(CapabilityType::Llm),
			"asr" => Ok(CapabilityType::Asr),
			"tts" => Ok(CapabilityType::Tts),
			"vad" => Ok(CapabilityType::Vad),
			"tool" => Ok(CapabilityType::Tool),
			other => Err(Error::UnknownCapabilityType(other.to_string())),
		}
	}
}

/// A single field in a Schema. Mirrors a JSON-Schema property closely enough
/// to render through a generic UI, with one addition: `secret`, which marks
/// values (API keys, tokens) that must never be logged or echoed in
/// plaintext outside the config store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Property {
	#[serde(rename = "type")]
	pub property_type: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub default: Option<Value>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub enum_values: Vec<Value>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub items: Option<Box<Property>>,
	#[serde(default)]
	pub secret: bool,
}

impl Property {
	pub fn new(property_type: impl Into<String>) -> Self {
		Property {
			property_type: property_type.into(),
			description: None,
			default: None,
			enum_values: Vec::new(),
			items: None,
			secret: false,
		}
	}

	pub fn secret(mut self) -> Self {
		self.secret = true;
		self
	}

	pub fn describe(mut self, description: impl Into<String>) -> Self {
		self.description = Some(description.into());
		self
	}

	pub fn with_default(mut self, default: Value) -> Self {
		self.default = Some(default);
		self
	}

	pub fn items_of(mut self, items: Property) -> Self {
		self.items = Some(Box::new(items));
		self
	}
}

/// A recursive JSON-Schema-like descriptor for config, input, or output
/// shapes. `required` is conceptually a set; it's kept as a `Vec` on the
/// wire and compared as a set (spec invariant I6).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Schema {
	#[serde(rename = "type", default = "default_object_type")]
	pub schema_type: String,
	#[serde(default)]
	pub properties: BTreeMap<String, Property>,
	#[serde(default)]
	pub required: Vec<String>,
}

fn default_object_type() -> String {
	"object".to_string()
}

impl Schema {
	pub fn object() -> Self {
		Schema {
			schema_type: "object".to_string(),
			properties: BTreeMap::new(),
			required: Vec::new(),
		}
	}

	pub fn with_property(mut self, name: impl Into<String>, property: Property) -> Self {
		self.properties.insert(name.into(), property);
		self
	}

	pub fn require(mut self, name: impl Into<String>) -> Self {
		self.required.push(name.into());
		self
	}

	pub fn required_set(&self) -> BTreeSet<&str> {
		self.required.iter().map(String::as_str).collect()
	}

	/// Encode as the wire struct sent over `GetPluginInfo`. Secrets carry the
	/// `secret:true` marker but, per spec §4.3/§7, this conversion never
	/// touches actual config *values* — only the static schema, which has
	/// none.
	pub fn to_wire(&self) -> proto::SchemaWire {
		proto::SchemaWire {
			schema_type: self.schema_type.clone(),
			properties_json: serde_json::to_string(&self.properties).unwrap_or_default(),
			required: self.required.clone(),
		}
	}

	pub fn from_wire(wire: &proto::SchemaWire) -> Result<Self> {
		let properties: BTreeMap<String, Property> = if wire.properties_json.is_empty() {
			BTreeMap::new()
		} else {
			serde_json::from_str(&wire.properties_json)?
		};
		Ok(Schema {
			schema_type: wire.schema_type.clone(),
			properties,
			required: wire.required.clone(),
		})
	}
}

/// Immutable record declared once at provider construction time (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityDefinition {
	pub id: String,
	pub capability_type: CapabilityType,
	pub name: String,
	pub description: String,
	pub config_schema: Schema,
	pub input_schema: Schema,
	pub output_schema: Schema,
}

impl CapabilityDefinition {
	pub fn to_wire(&self) -> proto::CapabilityDefinition {
		proto::CapabilityDefinition {
			id: self.id.clone(),
			capability_type: self.capability_type.as_str().to_string(),
			name: self.name.clone(),
			description: self.description.clone(),
			config_schema: Some(self.config_schema.to_wire()),
			input_schema: Some(self.input_schema.to_wire()),
			output_schema: Some(self.output_schema.to_wire()),
		}
	}

	pub fn from_wire(wire: &proto::CapabilityDefinition) -> Result<Self> {
		let empty = proto::SchemaWire::default();
		Ok(CapabilityDefinition {
			id: wire.id.clone(),
			capability_type: wire.capability_type.parse()?,
			name: wire.name.clone(),
			description: wire.description.clone(),
			config_schema: Schema::from_wire(wire.config_schema.as_ref().unwrap_or(&empty))?,
			input_schema: Schema::from_wire(wire.input_schema.as_ref().unwrap_or(&empty))?,
			output_schema: Schema::from_wire(wire.output_schema.as_ref().unwrap_or(&empty))?,
		})
	}
}

/// Static, plugin-level info returned by `GetPluginInfo`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginInfo {
	pub plugin_id: String,
	pub name: String,
	pub version: String,
	pub description: String,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn schema_wire_round_trip_preserves_shape() {
		let schema = Schema::object()
			.with_property(
				"api_key",
				Property::new("string").describe("vendor API key").secret(),
			)
			.with_property("model", Property::new("string"))
			.require("api_key")
			.require("model");

		let wire = schema.to_wire();
		let back = Schema::from_wire(&wire).unwrap();

		assert_eq!(back.schema_type, schema.schema_type);
		assert_eq!(
			back.properties.keys().collect::<BTreeSet<_>>(),
			schema.properties.keys().collect::<BTreeSet<_>>()
		);
		assert_eq!(back.required_set(), schema.required_set());
		assert!(back.properties["api_key"].secret);
	}

	#[test]
	fn unknown_capability_type_is_an_error() {
		assert!("coze_chat".parse::<CapabilityType>().is_err());
		assert!("llm".parse::<CapabilityType>().is_ok());
	}
}
