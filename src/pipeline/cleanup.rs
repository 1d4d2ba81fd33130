//! Running header and footer removal for text-layer pages.
//!
//! Journal and conference templates repeat the venue, short title or author
//! list at the top of every page, and a page number at the bottom. Left in
//! place they land in the middle of paragraphs once pages are joined.
//!
//! Only the first and last [`EDGE_LINES`] non-empty lines of a page are
//! candidates. A candidate is dropped when
//!
//! * its normalised form (whitespace collapsed, digits masked, lowercase)
//!   occurs on at least half of the pages (minimum two, documents of three
//!   pages or more), or
//! * it is a bare page number: `12`, `Page 3`, `Page 3 of 9`, `- 4 -`.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Lines considered at each end of a page.
const EDGE_LINES: usize = 2;

/// Documents shorter than this keep their repeated lines.
const MIN_PAGES_FOR_REPEATS: usize = 3;

static RE_PAGE_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:page\s+)?\d{1,4}(?:\s+of\s+\d{1,4})?$|^[-–—]\s*\d{1,4}\s*[-–—]$").unwrap()
});

static RE_SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Remove running headers, footers and page numbers from each page.
///
/// Returns the pages in the same order; interior lines are untouched.
pub fn strip_running_lines(pages: &[String]) -> Vec<String> {
    let edges: Vec<Vec<usize>> = pages.iter().map(|p| edge_line_indices(p)).collect();

    let repeated = if pages.len() >= MIN_PAGES_FOR_REPEATS {
        repeated_keys(pages, &edges)
    } else {
        HashSet::new()
    };

    let mut removed = 0usize;
    let cleaned = pages
        .iter()
        .zip(&edges)
        .map(|(page, edge)| {
            let lines: Vec<&str> = page.lines().collect();
            let drop: HashSet<usize> = edge
                .iter()
                .copied()
                .filter(|&i| {
                    let line = lines[i].trim();
                    RE_PAGE_NUMBER.is_match(line) || repeated.contains(&normalise(line))
                })
                .collect();
            removed += drop.len();
            lines
                .iter()
                .enumerate()
                .filter(|(i, _)| !drop.contains(i))
                .map(|(_, l)| *l)
                .collect::<Vec<_>>()
                .join("\n")
        })
        .collect();

    if removed > 0 {
        debug!("Removed {} running header/footer lines", removed);
    }
    cleaned
}

/// Indices of the first and last `EDGE_LINES` non-empty lines.
fn edge_line_indices(page: &str) -> Vec<usize> {
    let non_empty: Vec<usize> = page
        .lines()
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty())
        .map(|(i, _)| i)
        .collect();

    let mut idx: Vec<usize> = non_empty.iter().take(EDGE_LINES).copied().collect();
    idx.extend(non_empty.iter().rev().take(EDGE_LINES).copied());
    idx.sort_unstable();
    idx.dedup();
    idx
}

/// Normalised edge lines that appear on enough pages to be running lines.
fn repeated_keys(pages: &[String], edges: &[Vec<usize>]) -> HashSet<String> {
    let threshold = pages.len().div_ceil(2).max(2);
    let mut counts: HashMap<String, usize> = HashMap::new();

    for (page, edge) in pages.iter().zip(edges) {
        let lines: Vec<&str> = page.lines().collect();
        // Count each key once per page.
        let keys: HashSet<String> = edge.iter().map(|&i| normalise(lines[i])).collect();
        for key in keys {
            *counts.entry(key).or_insert(0) += 1;
        }
    }

    counts
        .into_iter()
        .filter(|(_, n)| *n >= threshold)
        .map(|(k, _)| k)
        .collect()
}

fn normalise(line: &str) -> String {
    let collapsed = RE_SPACES.replace_all(line.trim(), " ");
    collapsed
        .chars()
        .map(|c| if c.is_ascii_digit() { '#' } else { c })
        .collect::<String>()
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(header: &str, body: &str, footer: &str) -> String {
        format!("{header}\n{body}\n{footer}")
    }

    const BODIES: [&str; 4] = [
        "Attention lets the model relate distant tokens.\nIt is cheap to parallelise.\nWe study it here.",
        "Prior work used recurrence.\nConvolutions came later.\nBoth have limits.",
        "Our encoder stacks six layers.\nEach has two sublayers.\nResiduals wrap both.",
        "Results improve on every benchmark.\nTraining is faster.\nCode is released.",
    ];

    #[test]
    fn removes_repeated_header_and_page_numbers() {
        let pages: Vec<String> = BODIES
            .iter()
            .enumerate()
            .map(|(i, body)| {
                page(
                    "Published as a conference paper at ICLR 2024",
                    body,
                    &(i + 1).to_string(),
                )
            })
            .collect();
        let out = strip_running_lines(&pages);
        for (i, p) in out.iter().enumerate() {
            assert!(!p.contains("Published as a conference paper"), "{p}");
            assert!(p.contains(BODIES[i]), "{p}");
            assert!(!p.lines().any(|l| l.trim() == (i + 1).to_string()));
        }
    }

    #[test]
    fn header_with_changing_numbers_is_repeated() {
        let pages: Vec<String> = (1..=3)
            .map(|n| page(&format!("Smith et al.   {n}"), "Content.", "x"))
            .collect();
        let out = strip_running_lines(&pages);
        assert!(out.iter().all(|p| !p.contains("Smith et al.")));
    }

    #[test]
    fn short_documents_keep_repeated_lines() {
        let pages = vec![
            page("Running Title", "One.", "end"),
            page("Running Title", "Two.", "end"),
        ];
        let out = strip_running_lines(&pages);
        assert!(out.iter().all(|p| p.contains("Running Title")));
    }

    #[test]
    fn interior_lines_are_never_removed() {
        let body = "a\nb\nRepeated middle line\nc\nd";
        let pages = vec![body.to_string(), body.to_string(), body.to_string()];
        let out = strip_running_lines(&pages);
        assert!(out.iter().all(|p| p.contains("Repeated middle line")));
    }

    #[test]
    fn page_number_forms() {
        for s in ["7", "Page 3", "page 3 of 12", "- 4 -", "– 10 –"] {
            assert!(RE_PAGE_NUMBER.is_match(s), "{s}");
        }
        for s in ["Table 3", "1 Introduction", "Page three", "12345"] {
            assert!(!RE_PAGE_NUMBER.is_match(s), "{s}");
        }
    }

    #[test]
    fn empty_pages_survive() {
        let pages = vec![String::new(), "only".to_string(), String::new()];
        let out = strip_running_lines(&pages);
        assert_eq!(out.len(), 3);
    }
}
