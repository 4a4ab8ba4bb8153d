//! Sentence-aware splitting of long utterances.
//!
//! Lengths are measured in `char`s, not bytes: scripts are mostly CJK text
//! and the synthesis budget is expressed in spoken characters.

use crate::{Segment, Speaker, Utterance};

pub const DEFAULT_PUNCTUATION_MARKS: &str = "。！？.!?，,、；;:";

/// Split `text` into chunks of at most `max_length` chars.
///
/// Preference order for a split point, scanning backward from the budget:
/// a boundary mark (kept in the left chunk), then whitespace, then a forced
/// split exactly at `max_length`. A `max_length` of zero disables splitting,
/// and text that already fits is returned unchanged.
pub fn split_text(text: &str, max_length: usize, boundary_marks: &[char]) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if max_length == 0 || chars.len() <= max_length {
        return vec![text.to_string()];
    }

    tracing::debug!(len = chars.len(), max_length, "splitting_long_text");

    let mut chunks = Vec::new();
    let mut remainder: &[char] = &chars;

    while !remainder.is_empty() {
        if remainder.len() <= max_length {
            push_trimmed(&mut chunks, remainder);
            break;
        }

        let split_at = find_split_index(remainder, max_length, boundary_marks).unwrap_or(max_length);
        push_trimmed(&mut chunks, &remainder[..split_at]);
        remainder = trim_chars(&remainder[split_at..]);
    }

    chunks
}

/// Returns the exclusive end of the left chunk, or `None` when neither a
/// boundary mark nor whitespace occurs within the budget.
fn find_split_index(text: &[char], max_length: usize, boundary_marks: &[char]) -> Option<usize> {
    let limit = text.len().min(max_length);

    if !boundary_marks.is_empty()
        && let Some(idx) = (1..=limit)
            .rev()
            .find(|&idx| boundary_marks.contains(&text[idx - 1]))
    {
        return Some(idx);
    }

    (1..=limit).rev().find(|&idx| text[idx - 1].is_whitespace())
}

fn trim_chars(mut s: &[char]) -> &[char] {
    while let [first, rest @ ..] = s
        && first.is_whitespace()
    {
        s = rest;
    }
    while let [rest @ .., last] = s
        && last.is_whitespace()
    {
        s = rest;
    }
    s
}

fn push_trimmed(chunks: &mut Vec<String>, s: &[char]) {
    let trimmed = trim_chars(s);
    if !trimmed.is_empty() {
        chunks.push(trimmed.iter().collect());
    }
}

/// Flatten utterances into the ordered segment list, assigning indices
/// `0..n` in script order.
pub fn segment_script(
    utterances: &[Utterance],
    max_length: usize,
    boundary_marks: &[char],
) -> Vec<Segment> {
    let segments: Vec<Segment> = utterances
        .iter()
        .flat_map(|u| {
            split_text(&u.text, max_length, boundary_marks)
                .into_iter()
                .map(move |text| (u.speaker, text))
        })
        .enumerate()
        .map(|(index, (speaker, text))| Segment {
            index: index as u64,
            speaker,
            text,
        })
        .collect();

    let count_a = segments.iter().filter(|s| s.speaker == Speaker::A).count();
    tracing::info!(
        total = segments.len(),
        speaker_a = count_a,
        speaker_b = segments.len() - count_a,
        max_length,
        "script_segmented"
    );

    segments
}
