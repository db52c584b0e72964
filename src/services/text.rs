//! Text analysis helpers shared by the validator, merger, and
//! collaboration engine.
//!
//! Everything here is pure: word sets, overlap measures, and structural
//! extraction (fenced code blocks, sentences, paragraphs, list items).

use std::collections::BTreeSet;

/// Lowercased word set of a text. Words are maximal alphanumeric runs.
pub fn word_set(text: &str) -> BTreeSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Jaccard similarity of two word sets: |∩| / |∪|.
pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    intersection as f64 / union as f64
}

/// Overlap relative to the smaller set: |∩| / min(|a|, |b|).
pub fn overlap_min(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return if a.is_empty() && b.is_empty() { 1.0 } else { 0.0 };
    }
    let intersection = a.intersection(b).count();
    intersection as f64 / a.len().min(b.len()) as f64
}

/// Jaccard similarity of two texts.
pub fn text_jaccard(a: &str, b: &str) -> f64 {
    jaccard(&word_set(a), &word_set(b))
}

/// Overlap-over-min similarity of two texts.
pub fn text_overlap_min(a: &str, b: &str) -> f64 {
    overlap_min(&word_set(a), &word_set(b))
}

/// Whether two texts are "similar": word overlap over the smaller set
/// exceeds the threshold.
pub fn similar(a: &str, b: &str, threshold: f64) -> bool {
    text_overlap_min(a, b) > threshold
}

/// Extract fenced code blocks (``` … ```), without the fences.
pub fn extract_code_blocks(text: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut in_block = false;
    let mut current = String::new();
    for line in text.lines() {
        if line.trim_start().starts_with("```") {
            if in_block {
                blocks.push(current.trim_end().to_string());
                current.clear();
            }
            in_block = !in_block;
            continue;
        }
        if in_block {
            current.push_str(line);
            current.push('\n');
        }
    }
    blocks
}

/// Strip fenced code blocks from a text, leaving the prose.
pub fn without_code_blocks(text: &str) -> String {
    let mut out = String::new();
    let mut in_block = false;
    for line in text.lines() {
        if line.trim_start().starts_with("```") {
            in_block = !in_block;
            continue;
        }
        if !in_block {
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

/// Split prose into sentences on `.`, `!`, `?`. Fragments shorter than a
/// handful of characters are dropped as noise.
pub fn split_sentences(text: &str) -> Vec<String> {
    text.split(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| s.len() >= 10)
        .map(ToString::to_string)
        .collect()
}

/// Split prose into paragraphs on blank lines.
pub fn split_paragraphs(text: &str) -> Vec<String> {
    text.split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Extract list items: lines starting with `-`, `*`, or `N.`.
pub fn list_items(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| {
            line.starts_with("- ")
                || line.starts_with("* ")
                || line
                    .split_once('.')
                    .is_some_and(|(n, rest)| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()) && rest.starts_with(' '))
        })
        .map(ToString::to_string)
        .collect()
}

/// "Key elements" of an output: its sentences plus its fenced code blocks.
pub fn key_elements(text: &str) -> Vec<String> {
    let mut elements = split_sentences(&without_code_blocks(text));
    elements.extend(extract_code_blocks(text));
    elements
}

/// Lines present in `a` but not in `b` (exact line comparison, trimmed).
pub fn unique_lines<'a>(a: &'a str, b: &str) -> Vec<&'a str> {
    let b_lines: BTreeSet<&str> = b.lines().map(str::trim).collect();
    a.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !b_lines.contains(l))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_set_lowercases() {
        let set = word_set("Rename X to Y, then rename!");
        assert!(set.contains("rename"));
        assert!(set.contains("x"));
        assert_eq!(set.iter().filter(|w| *w == "rename").count(), 1);
    }

    #[test]
    fn test_jaccard_bounds() {
        let a = word_set("one two three four");
        let b = word_set("three four five six");
        let sim = jaccard(&a, &b);
        assert!((sim - 2.0 / 6.0).abs() < 1e-9);
        assert!((jaccard(&a, &a) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_overlap_min_uses_smaller_set() {
        let a = word_set("alpha beta");
        let b = word_set("alpha beta gamma delta epsilon");
        assert!((overlap_min(&a, &b) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_extract_code_blocks() {
        let text = "Intro\n```rust\nfn main() {}\n```\nOutro\n```\nlet x = 1;\n```\n";
        let blocks = extract_code_blocks(text);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0], "fn main() {}");
        assert_eq!(blocks[1], "let x = 1;");
    }

    #[test]
    fn test_without_code_blocks() {
        let text = "Before\n```\ncode here\n```\nAfter";
        let prose = without_code_blocks(text);
        assert!(prose.contains("Before"));
        assert!(prose.contains("After"));
        assert!(!prose.contains("code here"));
    }

    #[test]
    fn test_split_sentences_filters_noise() {
        let sentences = split_sentences("This is the first sentence. Ok. And here is another one.");
        assert_eq!(sentences.len(), 2);
    }

    #[test]
    fn test_list_items() {
        let text = "- first\n* second\n3. third\nplain line\n42 not a list";
        let items = list_items(text);
        assert_eq!(items.len(), 3);
    }

    #[test]
    fn test_unique_lines() {
        let a = "shared\nonly in a\nalso only in a";
        let b = "shared\nonly in b";
        let unique = unique_lines(a, b);
        assert_eq!(unique, vec!["only in a", "also only in a"]);
    }
}
