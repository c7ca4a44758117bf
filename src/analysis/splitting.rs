//! Splitting converted documents into token-bounded extraction units.
//!
//! Units are produced by semantic chunking under a hard token budget so each one
//! fits a single extraction call. Token counting prefers a real BPE encoding and
//! falls back to whitespace counting when the encoding cannot be loaded.

use std::sync::Arc;

use semchunk_rs::Chunker;
use tiktoken_rs::cl100k_base;

type TokenCounter = Arc<dyn Fn(&str) -> usize + Send + Sync>;

/// Split Markdown into extraction units of at most `capacity` tokens.
///
/// `overlap` carries a token-limited tail of each unit into the next one; the
/// final strings always respect the `capacity` budget. Returns an empty vector
/// when the input is all whitespace.
pub(crate) fn split_into_units(text: &str, capacity: usize, overlap: usize) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    split_with_counter(text, capacity, overlap, build_token_counter())
}

fn build_token_counter() -> TokenCounter {
    match cl100k_base() {
        Ok(encoding) => {
            let encoding = Arc::new(encoding);
            Arc::new(move |segment: &str| encoding.encode_ordinary(segment).len())
        }
        Err(error) => {
            tracing::warn!(
                error = %error,
                "BPE encoding unavailable; falling back to whitespace token counting"
            );
            whitespace_token_counter()
        }
    }
}

fn whitespace_token_counter() -> TokenCounter {
    Arc::new(|segment: &str| match segment.split_whitespace().count() {
        // Non-empty text with no whitespace-delimited words still costs a token.
        0 if !segment.is_empty() => 1,
        count => count,
    })
}

fn split_with_counter(
    text: &str,
    capacity: usize,
    overlap: usize,
    token_counter: TokenCounter,
) -> Vec<String> {
    let counter_for_chunker = token_counter.clone();
    let chunker = Chunker::new(
        capacity,
        Box::new(move |segment: &str| counter_for_chunker.as_ref()(segment)),
    );
    let units = chunker.chunk(text);
    apply_overlap(units, capacity, overlap, &token_counter)
}

/// Prefix each unit after the first with a token-limited tail of its predecessor,
/// re-trimming the combined text so it stays inside `capacity`.
fn apply_overlap(
    units: Vec<String>,
    capacity: usize,
    overlap: usize,
    token_counter: &TokenCounter,
) -> Vec<String> {
    let overlap = overlap.min(capacity.saturating_sub(1));
    if overlap == 0 || units.len() < 2 {
        return units;
    }

    let mut overlapped = Vec::with_capacity(units.len());
    overlapped.push(units[0].clone());
    for pair in units.windows(2) {
        let tail = longest_suffix_within(&pair[0], overlap, token_counter);
        let mut combined = String::with_capacity(tail.len() + pair[1].len() + 1);
        if !tail.is_empty() {
            combined.push_str(tail);
            if !tail.ends_with(char::is_whitespace) && !pair[1].starts_with(char::is_whitespace) {
                combined.push(' ');
            }
        }
        combined.push_str(&pair[1]);
        overlapped.push(shrink_to_budget(combined, capacity, token_counter));
    }
    overlapped
}

fn shrink_to_budget(text: String, budget: usize, token_counter: &TokenCounter) -> String {
    if token_counter.as_ref()(&text) <= budget {
        return text;
    }
    longest_suffix_within(&text, budget, token_counter).to_string()
}

/// Longest whitespace-trimmed suffix of `text` within `budget` tokens, found by
/// dropping leading characters one at a time.
fn longest_suffix_within<'a>(
    text: &'a str,
    budget: usize,
    token_counter: &TokenCounter,
) -> &'a str {
    if budget == 0 {
        return "";
    }
    let mut start = 0;
    loop {
        let candidate = text[start..].trim_start();
        if token_counter.as_ref()(candidate) <= budget {
            return candidate;
        }
        match text[start..].char_indices().nth(1) {
            Some((offset, _)) => start += offset,
            None => return "",
        }
    }
}
