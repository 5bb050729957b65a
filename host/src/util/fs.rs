// SPDX-License-Identifier: Apache-2.0

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

pub fn read_toml<P: AsRef<Path>, T: DeserializeOwned>(path: P) -> Result<T> {
	let path = path.as_ref();
	let contents = fs::read_to_string(path).map_err(|source| Error::ConfigRead {
		path: path.display().to_string(),
		source,
	})?;
	toml::de::from_str(&contents).map_err(Error::from)
}
