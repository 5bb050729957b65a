// SPDX-License-Identifier: Apache-2.0

/// The host's own version, as declared in `Cargo.toml`.
pub fn host_version() -> &'static str {
	env!("CARGO_PKG_VERSION")
}
