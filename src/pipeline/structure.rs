//! Heuristic structuring of text-layer output into paper-shaped Markdown.
//!
//! A single forward pass classifies each line of the joined page text and
//! emits Markdown blocks:
//!
//! | Line kind          | Output                                  |
//! |--------------------|-----------------------------------------|
//! | title              | `# Title`                               |
//! | author/affiliation | `*line*`                                |
//! | `Abstract`         | `## Abstract`                           |
//! | table caption      | `**caption**` (table body skipped)      |
//! | equation           | `$$ … $$`, with `(Eq. N)` when numbered |
//! | section            | `## heading`                            |
//! | subsection         | `### 3.1 heading`                       |
//! | bullet             | the line itself                         |
//! | anything else      | joined into the running paragraph       |
//!
//! Rules are tried in that order and the first match wins. The title and
//! author rules only look at the start of the text.

use once_cell::sync::Lazy;
use regex::Regex;

/// The title must appear within this many lines of the start.
const TITLE_WINDOW: usize = 15;
/// Author and affiliation lines must appear within this many lines.
const AUTHOR_WINDOW: usize = 30;
/// Table bodies skipped after a caption, at most.
const TABLE_SKIP: usize = 10;

const TITLE_STOPWORDS: &[&str] = &["university", "google", "research", "brain"];
const AFFILIATION_MARKERS: &[&str] = &[
    "@",
    "university",
    "institute",
    "google",
    "deepmind",
    "research",
    "brain",
];

static RE_MATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[=+∑∫∏√_^]|[A-Z]\(|\b(?:sin|cos|tan|log|exp|max|min|softmax)\b|[₀-₉]|[⁰-⁹]")
        .unwrap()
});
static RE_EQ_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\((\d+)\)\s*$").unwrap());
static RE_SECTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+\.?\s+)?([A-Z][A-Za-z\s&-]+)$").unwrap());
static RE_NUMBERED_SECTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+\s+[A-Z]").unwrap());
static RE_SUBSECTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+\.\d+\.?\d*\.?\s+.+$").unwrap());
static RE_BULLET: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[•\-*]\s+").unwrap());

/// Convert raw text-layer output into structured Markdown.
///
/// `text` is the page texts joined with blank lines. The result has not been
/// whitespace-tidied; callers run it through
/// [`tidy_markdown`](crate::pipeline::postprocess::tidy_markdown).
pub fn structure_text(text: &str) -> String {
    Structurer::new().structure(text)
}

/// Line classifier that can be fed a document one page at a time.
///
/// The title and author windows count lines from the start of the document,
/// not the page, and only one title is ever emitted.
#[derive(Debug, Default)]
pub struct Structurer {
    title_found: bool,
    lines_seen: usize,
}

impl Structurer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Structure the next chunk of text (usually one page).
    pub fn structure(&mut self, text: &str) -> String {
        let lines: Vec<&str> = text.split('\n').collect();
        let offset = self.lines_seen;
        self.lines_seen += lines.len();

        let mut out: Vec<String> = Vec::new();
        let mut paragraph: Vec<String> = Vec::new();
        let mut skip = 0usize;

        for (i, raw) in lines.iter().enumerate() {
            if skip > 0 {
                skip -= 1;
                continue;
            }

            let line = raw.trim();
            let line_no = offset + i;

            if line.is_empty() {
                if !paragraph.is_empty() {
                    paragraph.push(String::new());
                }
                continue;
            }

            if !self.title_found && line_no < TITLE_WINDOW && is_title_line(line) {
                out.push(format!("# {line}\n"));
                self.title_found = true;
                continue;
            }

            if line_no < AUTHOR_WINDOW && line.chars().count() < 100 && is_affiliation_line(line) {
                out.push(format!("*{line}*\n"));
                continue;
            }

            if line.eq_ignore_ascii_case("abstract") {
                flush_paragraph(&mut paragraph, &mut out);
                out.push("\n## Abstract\n\n".to_string());
                continue;
            }

            if let Some(n) = table_caption_skip(&lines, i) {
                flush_paragraph(&mut paragraph, &mut out);
                out.push(format!("\n**{line}**\n\n"));
                skip = n;
                continue;
            }

            if is_equation(line) {
                flush_paragraph(&mut paragraph, &mut out);
                out.push(format!("\n{}\n\n", display_equation(line)));
                continue;
            }

            if is_section_heading(line) {
                flush_paragraph(&mut paragraph, &mut out);
                out.push(format!("\n## {line}\n\n"));
                continue;
            }

            if RE_SUBSECTION.is_match(line) {
                flush_paragraph(&mut paragraph, &mut out);
                out.push(format!("\n### {line}\n\n"));
                continue;
            }

            if RE_BULLET.is_match(line) {
                flush_paragraph(&mut paragraph, &mut out);
                out.push(format!("{line}\n"));
                continue;
            }

            paragraph.push(line.to_string());
        }

        flush_paragraph(&mut paragraph, &mut out);
        out.join("\n")
    }
}

/// A substantial, capitalised line that is not an e-mail or affiliation.
pub(crate) fn is_title_line(line: &str) -> bool {
    if line.chars().count() <= 15 {
        return false;
    }
    let starts_upper = line.chars().next().is_some_and(char::is_uppercase);
    if !(is_title_case(line) || (starts_upper && !is_all_caps(line))) {
        return false;
    }
    let lower = line.to_lowercase();
    !line.contains('@') && !TITLE_STOPWORDS.iter().any(|w| lower.contains(w))
}

fn is_affiliation_line(line: &str) -> bool {
    let lower = line.to_lowercase();
    AFFILIATION_MARKERS.iter().any(|m| lower.contains(m))
}

/// Lines to skip after a `Table N: …` caption, or `None` if `lines[i]` is
/// not a caption with at least two lines after it.
fn table_caption_skip(lines: &[&str], i: usize) -> Option<usize> {
    if i + 2 >= lines.len() {
        return None;
    }
    let line = lines[i];
    (line.contains("Table") && line.contains(':')).then(|| TABLE_SKIP.min(lines.len() - i))
}

/// Mostly symbolic lines with a math indicator, or any line ending in an
/// equation number like `(3)`.
fn is_equation(line: &str) -> bool {
    let non_space = line.chars().filter(|c| *c != ' ').count();
    let letters = line.chars().filter(|c| c.is_ascii_alphabetic()).count();

    if non_space > 0 && RE_MATH.is_match(line) && (letters as f64) / (non_space as f64) < 0.5 {
        return true;
    }
    RE_EQ_NUMBER.is_match(line)
}

/// Wrap an equation line in display math, moving a trailing `(N)` out.
fn display_equation(line: &str) -> String {
    let line = line.trim();
    match RE_EQ_NUMBER.captures(line) {
        Some(caps) => {
            let start = caps.get(0).map_or(line.len(), |m| m.start());
            let body = line[..start].trim();
            format!("$$\n{}\n$$ (Eq. {})", body, &caps[1])
        }
        None => format!("$$\n{line}\n$$"),
    }
}

fn is_section_heading(line: &str) -> bool {
    if !RE_SECTION.is_match(line) || line.chars().count() >= 80 {
        return false;
    }
    is_all_caps(line)
        || RE_NUMBERED_SECTION.is_match(line)
        || (line.chars().count() < 50 && is_title_case(line))
}

/// Emit buffered lines as paragraphs split at blank lines.
fn flush_paragraph(buf: &mut Vec<String>, out: &mut Vec<String>) {
    if buf.is_empty() {
        return;
    }
    let mut current: Vec<&str> = Vec::new();
    for line in buf.iter() {
        if line.is_empty() {
            if !current.is_empty() {
                out.push(format!("{}\n", current.join(" ")));
                current.clear();
            }
            out.push("\n".to_string());
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        out.push(format!("{}\n", current.join(" ")));
    }
    buf.clear();
}

/// Every cased run starts with an uppercase letter followed only by
/// lowercase ones, and at least one cased letter exists.
///
/// `"Attention Is All You Need"` is title case; `"BERT Pretraining"` and
/// `"Deep learning"` are not.
pub(crate) fn is_title_case(s: &str) -> bool {
    let mut prev_cased = false;
    let mut any_cased = false;
    for c in s.chars() {
        if c.is_uppercase() {
            if prev_cased {
                return false;
            }
            prev_cased = true;
            any_cased = true;
        } else if c.is_lowercase() {
            if !prev_cased {
                return false;
            }
            prev_cased = true;
            any_cased = true;
        } else {
            prev_cased = false;
        }
    }
    any_cased
}

/// At least one cased letter and no lowercase ones.
pub(crate) fn is_all_caps(s: &str) -> bool {
    s.chars().any(char::is_uppercase) && !s.chars().any(char::is_lowercase)
}
