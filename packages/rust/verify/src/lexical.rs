//! Character-level lexical grounding and verbatim sentence splitting.

use std::collections::HashSet;

/// Claim characters that carry content (letters, digits, CJK ideographs).
pub fn strip(text: &str) -> Vec<char> {
    text.chars().filter(|c| c.is_alphanumeric()).collect()
}

/// Fraction of the claim's stripped characters that occur anywhere in `document`.
///
/// Asymmetric on purpose: measures how much of the claim is grounded in the
/// document, not how much of the document the claim covers. Capped at 1.0.
pub fn coverage(claim: &str, document: &str, epsilon: f64) -> f64 {
    let stripped = strip(claim);
    if stripped.is_empty() {
        return 0.0;
    }

    let doc_chars: HashSet<char> = document.chars().collect();
    let hits = stripped.iter().filter(|c| doc_chars.contains(c)).count();

    (hits as f64 / (stripped.len() as f64 + epsilon)).min(1.0)
}

/// Split `text` into trimmed sentences that are literal slices of it.
///
/// Terminators (`。！？；!?;`) stay attached to their sentence; `.` only ends a
/// sentence when followed by whitespace or end of text; newlines always split.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((idx, c)) = chars.next() {
        let end = match c {
            '\n' => Some(idx),
            '。' | '！' | '？' | '；' | '!' | '?' | ';' => Some(idx + c.len_utf8()),
            '.' if chars.peek().is_none_or(|(_, next)| next.is_whitespace()) => Some(idx + 1),
            _ => None,
        };

        if let Some(end) = end {
            push_trimmed(&mut sentences, &text[start..end]);
            start = idx + c.len_utf8();
        }
    }
    push_trimmed(&mut sentences, &text[start..]);

    sentences
}

fn push_trimmed<'a>(out: &mut Vec<&'a str>, slice: &'a str) {
    let trimmed = slice.trim();
    if !trimmed.is_empty() {
        out.push(trimmed);
    }
}

/// The sentence of `text` that best supports `claim`: the first one containing
/// `focus` verbatim, else the one with the highest lexical coverage.
pub fn best_sentence<'a>(text: &'a str, claim: &str, focus: Option<&str>, epsilon: f64) -> Option<&'a str> {
    let sentences = split_sentences(text);

    if let Some(focus) = focus {
        if let Some(hit) = sentences.iter().find(|s| s.contains(focus)) {
            return Some(hit);
        }
    }

    let mut best: Option<(&str, f64)> = None;
    for sentence in sentences {
        let score = coverage(claim, sentence, epsilon);
        if best.is_none_or(|(_, b)| score > b) {
            best = Some((sentence, score));
        }
    }
    best.map(|(s, _)| s)
}
