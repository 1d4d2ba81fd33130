//! Bibliographic metadata heuristics for the title page of a paper.
//!
//! Sources, in order of trust:
//!
//! 1. the PDF info dictionary (`Title`, `Author`, `CreationDate`), when it
//!    holds something plausible; LaTeX toolchains often leave it empty and
//!    Word exports fill it with the file name,
//! 2. the first-page text: the text layer, or the VLM transcription of
//!    page 1 when the text layer is empty.
//!
//! A record is returned only when both a title and at least one author were
//! found.

use crate::output::{DocumentMetadata, PaperMetadata};
use crate::pipeline::structure::is_title_line;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// How far down the page the title may appear.
const TITLE_WINDOW: usize = 15;
/// Author lines searched after the title when no abstract marker exists.
const AUTHOR_WINDOW: usize = 12;
const MAX_ABSTRACT_CHARS: usize = 4000;

const AFFILIATION_WORDS: &[&str] = &[
    "university",
    "institute",
    "department",
    "laboratory",
    "school",
    "college",
    "centre",
    "center",
    "google",
    "deepmind",
    "research",
    "brain",
    "microsoft",
    "facebook",
    "openai",
    "inc.",
    "corp",
    "labs",
];

static RE_ARXIV: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)arXiv:\s?(\d{4}\.\d{4,5})(v\d+)?").unwrap());
static RE_DOI: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b10\.\d{4,9}/[^\s<>]+").unwrap());
static RE_YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(19[5-9]\d|20\d{2})\b").unwrap());
static RE_PDF_DATE_YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?:D:)?(\d{4})").unwrap());
static RE_VENUE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:proceedings|conference|journal|workshop|transactions|symposium)\b|\b(?:NeurIPS|NIPS|ICML|ICLR|ACL|EMNLP|NAACL|CVPR|ICCV|ECCV|AAAI|IJCAI|KDD|SIGIR|SIGGRAPH)\b",
    )
    .unwrap()
});
static RE_ABSTRACT_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^abstract\b[\s.:—–-]*").unwrap());
static RE_ABSTRACT_END: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(?:(?:\d+|[IVX]+)\.?\s+)?(?:introduction|keywords|key words|index terms|ccs concepts|acm reference format|background|related work)\b",
    )
    .unwrap()
});
static RE_MARKUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#+\s*|^[*_]+|[*_]+$").unwrap());
static RE_FOOTNOTE_MARKS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[*∗†‡§¶⋆♠♣♦♥\d⁰¹²³⁴⁵⁶⁷⁸⁹]+").unwrap());
static RE_AUTHOR_SPLIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*(?:,|;|&|\band\b|\s{3,})\s*").unwrap());
static RE_NAME_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\p{Lu}[\p{L}'’-]*\.?$|^\p{Lu}\.$").unwrap());

/// Assemble a [`PaperMetadata`] record from the first page and the info
/// dictionary. Returns `None` unless a title and an author were found.
pub fn extract_paper_metadata(first_page: &str, doc: &DocumentMetadata) -> Option<PaperMetadata> {
    let lines: Vec<String> = first_page
        .lines()
        .map(strip_markup)
        .filter(|l| !l.is_empty())
        .collect();

    let abstract_idx = lines.iter().position(|l| RE_ABSTRACT_MARKER.is_match(l));

    let (title, title_idx) = find_title(&lines, doc.title.as_deref())?;

    let authors = doc
        .author
        .as_deref()
        .map(split_author_field)
        .filter(|a| !a.is_empty())
        .unwrap_or_else(|| authors_from_lines(&lines, title_idx, abstract_idx));
    if authors.is_empty() {
        debug!("No authors found for '{}'", title);
        return None;
    }

    let arxiv_id = RE_ARXIV.captures(first_page).map(|c| c[1].to_string());
    let doi = RE_DOI
        .find(first_page)
        .map(|m| m.as_str().trim_end_matches(['.', ',', ';', ')']).to_string());

    let year = arxiv_id
        .as_deref()
        .and_then(year_from_arxiv)
        .or_else(|| {
            RE_YEAR
                .captures(first_page)
                .and_then(|c| c[1].parse().ok())
        })
        .or_else(|| doc.creation_date.as_deref().and_then(year_from_pdf_date));

    let venue = lines
        .iter()
        .take(abstract_idx.unwrap_or(lines.len()).max(TITLE_WINDOW))
        .find(|l| RE_VENUE.is_match(l) && l.chars().count() < 200)
        .cloned()
        .or_else(|| {
            arxiv_id
                .as_ref()
                .map(|id| format!("arXiv preprint arXiv:{id}"))
        });

    let abstract_text = abstract_idx.and_then(|i| collect_abstract(&lines, i));

    Some(PaperMetadata {
        title,
        authors,
        year,
        venue,
        abstract_text,
        doi,
        arxiv_id,
    })
}

/// Title and the index of its line (`None` when it came from the info
/// dictionary and does not appear verbatim on the page).
fn find_title(lines: &[String], info_title: Option<&str>) -> Option<(String, Option<usize>)> {
    if let Some(t) = info_title.map(str::trim).filter(|t| plausible_info_title(t)) {
        let idx = lines.iter().position(|l| l.eq_ignore_ascii_case(t));
        return Some((t.to_string(), idx));
    }
    lines
        .iter()
        .take(TITLE_WINDOW)
        .position(|l| is_title_line(l) && !RE_VENUE.is_match(l) && !RE_ARXIV.is_match(l))
        .map(|i| (lines[i].clone(), Some(i)))
}

/// Reject file names and tool boilerplate that producers write into `Title`.
fn plausible_info_title(t: &str) -> bool {
    let lower = t.to_lowercase();
    t.chars().count() >= 8
        && t.contains(' ')
        && !lower.ends_with(".pdf")
        && !lower.ends_with(".dvi")
        && !lower.ends_with(".docx")
        && !lower.starts_with("microsoft word")
        && lower != "untitled"
}

fn split_author_field(field: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for name in RE_AUTHOR_SPLIT.split(field) {
        let name = name.trim();
        if !name.is_empty() && !out.iter().any(|n| n == name) {
            out.push(name.to_string());
        }
    }
    out
}

fn authors_from_lines(
    lines: &[String],
    title_idx: Option<usize>,
    abstract_idx: Option<usize>,
) -> Vec<String> {
    let start = title_idx.map_or(0, |i| i + 1);
    let end = abstract_idx
        .filter(|&a| a >= start)
        .unwrap_or_else(|| (start + AUTHOR_WINDOW).min(lines.len()));

    let mut authors: Vec<String> = Vec::new();
    for line in lines.get(start..end).unwrap_or_default() {
        let lower = line.to_lowercase();
        if line.contains('@')
            || RE_VENUE.is_match(line)
            || AFFILIATION_WORDS.iter().any(|w| lower.contains(w))
        {
            continue;
        }
        let cleaned = RE_FOOTNOTE_MARKS.replace_all(line, " ");
        for candidate in RE_AUTHOR_SPLIT.split(&cleaned) {
            let name = candidate.split_whitespace().collect::<Vec<_>>().join(" ");
            if is_name(&name) && !authors.contains(&name) {
                authors.push(name);
            }
        }
    }
    authors
}

/// Two to four capitalised words, shorter than 40 characters.
fn is_name(s: &str) -> bool {
    let words: Vec<&str> = s.split_whitespace().collect();
    (2..=4).contains(&words.len())
        && s.chars().count() < 40
        && words.iter().all(|w| RE_NAME_WORD.is_match(w))
}

fn year_from_arxiv(id: &str) -> Option<u16> {
    id.get(..2)?.parse::<u16>().ok().map(|yy| 2000 + yy)
}

fn year_from_pdf_date(date: &str) -> Option<u16> {
    RE_PDF_DATE_YEAR
        .captures(date)
        .and_then(|c| c[1].parse().ok())
}

/// Text after the `Abstract` marker up to the next heading, with
/// end-of-line hyphenation undone.
fn collect_abstract(lines: &[String], marker_idx: usize) -> Option<String> {
    let first = RE_ABSTRACT_MARKER.replace(&lines[marker_idx], "").trim().to_string();

    let mut text = String::new();
    let rest = lines[marker_idx + 1..]
        .iter()
        .take_while(|l| !RE_ABSTRACT_END.is_match(l));
    for line in std::iter::once(&first).chain(rest) {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if text.ends_with('-') && text[..text.len() - 1].ends_with(char::is_alphabetic) {
            text.pop();
        } else if !text.is_empty() {
            text.push(' ');
        }
        text.push_str(line);
        if text.len() >= MAX_ABSTRACT_CHARS {
            break;
        }
    }

    (!text.is_empty()).then_some(text)
}

fn strip_markup(line: &str) -> String {
    RE_MARKUP.replace_all(line.trim(), "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ATTENTION: &str = "\
Provided proper attribution is provided, Google hereby grants permission
Attention Is All You Need
Ashish Vaswani∗   Noam Shazeer∗   Niki Parmar∗
Google Brain   Google Brain   Google Research
avaswani@google.com   noam@google.com   nikip@google.com
Llion Jones∗   Aidan N. Gomez∗ †
31st Conference on Neural Information Processing Systems (NIPS 2017), Long Beach, CA, USA.
Abstract
The dominant sequence transduction models are based on complex recur-
rent or convolutional neural networks.
We propose a new simple network architecture.
1 Introduction
Recurrent neural networks have been firmly established.
arXiv:1706.03762v5 [cs.CL] 6 Dec 2017";

    #[test]
    fn attention_paper_title_page() {
        let meta = extract_paper_metadata(ATTENTION, &DocumentMetadata::default())
            .expect("metadata expected");
        assert_eq!(meta.title, "Attention Is All You Need");
        assert_eq!(
            meta.authors,
            vec![
                "Ashish Vaswani",
                "Noam Shazeer",
                "Niki Parmar",
                "Llion Jones",
                "Aidan N. Gomez"
            ]
        );
        assert_eq!(meta.year, Some(2017));
        assert_eq!(meta.arxiv_id.as_deref(), Some("1706.03762"));
        assert!(meta.venue.unwrap().contains("Conference on Neural Information"));
        let abs = meta.abstract_text.unwrap();
        assert!(abs.starts_with("The dominant sequence"), "{abs}");
        assert!(abs.contains("complex recurrent or convolutional"), "{abs}");
        assert!(abs.ends_with("simple network architecture."), "{abs}");
    }

    #[test]
    fn info_dictionary_wins_when_plausible() {
        let doc = DocumentMetadata {
            title: Some("Deep Residual Learning for Image Recognition".into()),
            author: Some("Kaiming He; Xiangyu Zhang and Shaoqing Ren".into()),
            creation_date: Some("D:20151210120000Z".into()),
            ..Default::default()
        };
        let meta = extract_paper_metadata("some body text", &doc).expect("metadata expected");
        assert_eq!(meta.title, "Deep Residual Learning for Image Recognition");
        assert_eq!(meta.authors, vec!["Kaiming He", "Xiangyu Zhang", "Shaoqing Ren"]);
        assert_eq!(meta.year, Some(2015));
        assert!(meta.venue.is_none());
    }

    #[test]
    fn file_name_titles_are_ignored() {
        assert!(!plausible_info_title("paper_final_v3.pdf"));
        assert!(!plausible_info_title("Microsoft Word - draft"));
        assert!(!plausible_info_title("untitled"));
        assert!(plausible_info_title("Language Models are Few-Shot Learners"));
    }

    #[test]
    fn missing_author_yields_none() {
        let text = "A Study Of Something Important\n\nAbstract\nWe study it.";
        assert!(extract_paper_metadata(text, &DocumentMetadata::default()).is_none());
    }

    #[test]
    fn missing_title_yields_none() {
        assert!(extract_paper_metadata("", &DocumentMetadata::default()).is_none());
    }

    #[test]
    fn vision_markdown_is_unwrapped() {
        let md = "# BERT: Pre-training of Deep Bidirectional Transformers\n\n\
**Jacob Devlin, Ming-Wei Chang, Kenton Lee**\n\n\
Google AI Language\n\n## Abstract\n\nWe introduce BERT.\n\n## 1 Introduction\n";
        let meta = extract_paper_metadata(md, &DocumentMetadata::default()).expect("metadata");
        assert_eq!(
            meta.title,
            "BERT: Pre-training of Deep Bidirectional Transformers"
        );
        assert_eq!(meta.authors, vec!["Jacob Devlin", "Ming-Wei Chang", "Kenton Lee"]);
        assert_eq!(meta.abstract_text.as_deref(), Some("We introduce BERT."));
    }

    #[test]
    fn doi_is_trimmed() {
        let text = "Some Long Paper Title Here\nJane Doe\nhttps://doi.org/10.1145/3292500.3330701.";
        let meta = extract_paper_metadata(text, &DocumentMetadata::default()).expect("metadata");
        assert_eq!(meta.doi.as_deref(), Some("10.1145/3292500.3330701"));
    }

    #[test]
    fn name_shapes() {
        assert!(is_name("Ashish Vaswani"));
        assert!(is_name("Aidan N. Gomez"));
        assert!(is_name("Ming-Wei Chang"));
        assert!(!is_name("Vaswani"));
        assert!(!is_name("the dominant sequence"));
        assert!(!is_name("One Two Three Four Five"));
    }
}
