// SPDX-License-Identifier: Apache-2.0

//! Hides a value from `Debug` output. Used to wrap config values for
//! schema properties marked `secret: true` (spec §7) so a stray `{:?}` in a
//! log line can never leak an API key.

use std::fmt::{Debug, Formatter, Result as FmtResult};

#[derive(Clone, Default)]
pub struct Redacted<T>(T);

impl<T> Redacted<T> {
	pub fn new(val: T) -> Redacted<T> {
		Redacted(val)
	}
}

impl<T> AsRef<T> for Redacted<T> {
	fn as_ref(&self) -> &T {
		&self.0
	}
}

impl<T> Debug for Redacted<T> {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		write!(f, "<redacted>")
	}
}
