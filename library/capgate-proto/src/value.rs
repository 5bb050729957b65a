// SPDX-License-Identifier: Apache-2.0

//! Config, inputs, and outputs are open-ended maps, so they cross the RPC
//! boundary as JSON-encoded strings rather than a bespoke protobuf `Value`
//! tree, carrying `serde_json::Value` as the in-process representation.

use crate::error::Result;
use serde_json::Value;

pub fn to_wire_json(value: &Value) -> String {
	// `Value` serialization is infallible for any value we construct ourselves.
	serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

pub fn from_wire_json(raw: &str) -> Result<Value> {
	if raw.is_empty() {
		return Ok(Value::Null);
	}
	Ok(serde_json::from_str(raw)?)
}
