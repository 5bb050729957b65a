// SPDX-License-Identifier: Apache-2.0

//! Strips `<think>...</think>` reasoning spans out of a token stream before
//! it reaches the caller, without ever assuming a tag boundary lines up with
//! a chunk boundary (spec §4.2). Vendor chunks can split a tag across
//! arbitrarily many pieces, so the filter is a small buffering state
//! machine rather than a per-chunk regex.

const OPEN_TAG: &str = "<think>";
const CLOSE_TAG: &str = "</think>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
	Passthrough,
	Suppressed,
}

impl Default for Mode {
	fn default() -> Self {
		Mode::Passthrough
	}
}

/// Feed chunks in; get back only the text outside `<think>` spans. One
/// filter instance per stream — it is not `Sync` and must not be shared
/// across concurrent calls.
#[derive(Debug, Default)]
pub struct ThinkTagFilter {
	mode: Mode,
	carry: String,
}

impl ThinkTagFilter {
	pub fn new() -> Self {
		Self::default()
	}

	/// Consumes one chunk and returns the portion of it (plus any
	/// previously-buffered partial tag) that belongs in the visible output.
	/// May return an empty string if the whole chunk landed inside a think
	/// span or inside a tag that hasn't fully arrived yet.
	pub fn push(&mut self, chunk: &str) -> String {
		self.carry.push_str(chunk);
		let mut out = String::new();

		loop {
			match self.mode {
				Mode::Passthrough => {
					match self.carry.find(OPEN_TAG) {
						Some(idx) => {
							out.push_str(&self.carry[..idx]);
							self.carry.drain(..idx + OPEN_TAG.len());
							self.mode = Mode::Suppressed;
						}
						None => {
							// Keep a tail that could be the start of an
							// incoming open tag; everything before it is
							// safe to emit now.
							let keep = held_back_suffix_len(&self.carry, OPEN_TAG);
							let emit_upto = self.carry.len() - keep;
							out.push_str(&self.carry[..emit_upto]);
							self.carry.drain(..emit_upto);
							break;
						}
					}
				}
				Mode::Suppressed => match self.carry.find(CLOSE_TAG) {
					Some(idx) => {
						self.carry.drain(..idx + CLOSE_TAG.len());
						self.mode = Mode::Passthrough;
					}
					None => {
						let keep = held_back_suffix_len(&self.carry, CLOSE_TAG);
						self.carry.drain(..self.carry.len() - keep);
						break;
					}
				},
			}
		}

		out
	}

	/// Call once the upstream stream has ended. Anything still buffered in
	/// `Passthrough` mode (a suffix that looked like it might start a tag
	/// but never completed) is emitted as-is; anything buffered while
	/// `Suppressed` (an unterminated think span) is dropped.
	pub fn finish(mut self) -> String {
		match self.mode {
			Mode::Passthrough => std::mem::take(&mut self.carry),
			Mode::Suppressed => String::new(),
		}
	}
}

/// How many trailing bytes of `buf` are a prefix of `tag` and must be held
/// back in case the next chunk completes the tag. Returns 0 once it's clear
/// no suffix of `buf` can extend into `tag`.
fn held_back_suffix_len(buf: &str, tag: &str) -> usize {
	let max = buf.len().min(tag.len() - 1);
	for len in (1..=max).rev() {
		if tag.starts_with(&buf[buf.len() - len..]) {
			return len;
		}
	}
	0
}

#[cfg(test)]
mod tests {
	use super::*;

	fn run_all_at_once(input: &str) -> String {
		let mut f = ThinkTagFilter::new();
		let mut out = f.push(input);
		out.push_str(&f.finish());
		out
	}

	fn run_byte_by_byte(input: &str) -> String {
		let mut f = ThinkTagFilter::new();
		let mut out = String::new();
		for ch in input.chars() {
			out.push_str(&f.push(&ch.to_string()));
		}
		out.push_str(&f.finish());
		out
	}

	#[test]
	fn strips_a_single_complete_span() {
		let input = "hello <think>secret reasoning</think> world";
		assert_eq!(run_all_at_once(input), "hello  world");
	}

	#[test]
	fn passthrough_when_no_tags_present() {
		let input = "just plain text, nothing to see here";
		assert_eq!(run_all_at_once(input), input);
	}

	/// Invariant: filtering is independent of how the upstream chunks the
	/// text — the same logical content filtered byte-by-byte or whole must
	/// produce the same visible output.
	#[test]
	fn result_is_independent_of_chunk_boundaries() {
		let input = "before <think>reasoning spans\nmultiple\nlines</think> after <think>more</think> tail";
		assert_eq!(run_all_at_once(input), run_byte_by_byte(input));
	}

	#[test]
	fn tag_split_across_chunks_is_still_recognized() {
		let mut f = ThinkTagFilter::new();
		let mut out = f.push("hello <thi");
		out.push_str(&f.push("nk>hidden</thi"));
		out.push_str(&f.push("nk> world"));
		out.push_str(&f.finish());
		assert_eq!(out, "hello  world");
	}

	#[test]
	fn unterminated_think_span_is_dropped_not_leaked() {
		let mut f = ThinkTagFilter::new();
		let out = f.push("before <think>never closes");
		assert_eq!(out, "before ");
		assert_eq!(f.finish(), "");
	}

	#[test]
	fn multiple_spans_in_one_stream() {
		let input = "a<think>x</think>b<think>y</think>c";
		assert_eq!(run_all_at_once(input), "abc");
	}
}
