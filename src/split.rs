//! Deterministic two-column content splitting.
//!
//! Used by every renderer's two-column layout, so the exact split (and its
//! tie-break: the right side wins on odd counts, and splitting is by line
//! index, never by character count) must stay stable across backends.

use regex::Regex;
use std::sync::OnceLock;

fn bullet_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*[-*]\s+").expect("valid regex"))
}

/// Divides a content block into a left/right pair of column blocks.
///
/// Priority order: a `|` separator splits once on its first occurrence
/// (both sides trimmed); else bullet-marked lines split at the middle
/// bullet's line index, so every line before that bullet goes left; else a
/// plain split at the midpoint line index. Empty content yields two empty
/// strings.
pub fn split_columns(content: &str) -> (String, String) {
    if content.is_empty() {
        return (String::new(), String::new());
    }

    if let Some(pipe) = content.find('|') {
        let left = content[..pipe].trim().to_string();
        let right = content[pipe + 1..].trim().to_string();
        return (left, right);
    }

    let lines: Vec<&str> = content.split('\n').collect();
    let bullet_indices: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, line)| bullet_line().is_match(line))
        .map(|(i, _)| i)
        .collect();

    let midpoint = if bullet_indices.is_empty() {
        lines.len() / 2
    } else {
        bullet_indices[bullet_indices.len() / 2]
    };

    (lines[..midpoint].join("\n"), lines[midpoint..].join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_content_yields_two_empty_strings() {
        assert_eq!(split_columns(""), (String::new(), String::new()));
    }

    #[test]
    fn pipe_separator_wins_and_trims_both_sides() {
        assert_eq!(
            split_columns("left part|right part"),
            ("left part".to_string(), "right part".to_string())
        );
        // Only the first pipe splits.
        assert_eq!(
            split_columns("a | b | c"),
            ("a".to_string(), "b | c".to_string())
        );
    }

    #[test]
    fn four_bullets_split_two_and_two_with_lead_in_attached_left() {
        let (left, right) = split_columns("A\n- one\n- two\n- three\n- four");
        assert_eq!(left, "A\n- one\n- two");
        assert_eq!(right, "- three\n- four");
    }

    #[test]
    fn odd_bullet_count_favors_the_right_side() {
        let (left, right) = split_columns("- a\n- b\n- c");
        assert_eq!(left, "- a");
        assert_eq!(right, "- b\n- c");
    }

    #[test]
    fn split_point_is_the_middle_bullet_line_index() {
        let (left, right) = split_columns("- a\n- b\nheader\n- c\n- d");
        // Bullets sit at lines 0, 1, 3, 4; the middle bullet is line 3, so
        // everything before it, the header included, stays on the left.
        assert_eq!(left, "- a\n- b\nheader");
        assert_eq!(right, "- c\n- d");
    }

    #[test]
    fn plain_lines_split_at_midpoint_and_round_trip() {
        let content = "one\ntwo\nthree\nfour\nfive";
        let (left, right) = split_columns(content);
        assert_eq!(left, "one\ntwo");
        assert_eq!(right, "three\nfour\nfive");
        assert_eq!(format!("{left}\n{right}"), content);
    }
}
