//! Post-processing: deterministic cleanup of generated Markdown.
//!
//! A page transcription of a paper is mostly prose, display equations and
//! result tables. VLMs get the content right and the layout subtly wrong:
//! an outer ` ```markdown ` fence, a blank line inside a `$$` block (which
//! ends the block in MathJax and KaTeX), an equation number typed after the
//! closing `$$`, a `Table 2:` caption glued to the first table row, a header
//! row without its `| --- |` separator, a made-up `figure1.png` link.
//!
//! Two entry points:
//!
//! * [`clean_markdown`] for VLM pages.
//! * [`tidy_markdown`] for text-layer output, whose structure was already
//!   decided by [`structure`](crate::pipeline::structure). It only fixes
//!   glyphs and whitespace.
//!
//! Line-oriented rules classify each line as prose or display math first,
//! and never touch whitespace inside a `$$ … $$` block except to drop blank
//! lines from it.

use crate::pipeline::equations::normalize_delimiters;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Clean the raw VLM output of one page.
///
/// In order: normalise line endings, strip an outer fence, normalise glyphs,
/// rewrite `\[ \]` / `\( \)` math, move equation numbers into `\tag{}`,
/// lay out lines (math blocks kept tight, a blank line before headings,
/// at most two blank lines), repair tables, detach table captions, drop
/// invented image links, end with one newline.
pub fn clean_markdown(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = strip_markdown_fences(&s);
    let s = normalise_glyphs(&s);
    let s = normalize_delimiters(&s);
    let s = tag_equation_numbers(&s);
    let s = layout_lines(&s, true);
    let s = repair_tables(&s);
    let s = detach_table_captions(&s);
    let s = remove_hallucinated_images(&s);
    ensure_final_newline(&s)
}

/// Glyph and whitespace cleanup for text-layer output.
///
/// Ligatures are expanded and invisible characters dropped; blank lines are
/// capped at two and removed from display-math blocks. Headings, tables and
/// links are left as they are.
pub fn tidy_markdown(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = normalise_glyphs(&s);
    let s = layout_lines(&s, false);
    ensure_final_newline(&s)
}

// ── Fences and line endings ─────────────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:markdown|md)?\n(.*)\n```\s*$").unwrap());

fn strip_markdown_fences(input: &str) -> String {
    match RE_OUTER_FENCES.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Glyphs ──────────────────────────────────────────────────────────────────

/// Expand typographic ligatures that PDF fonts map to single code points
/// (`ﬁ` in "ﬁgure") and drop zero-width characters, BOMs and soft hyphens.
fn normalise_glyphs(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}' | '\u{FEFF}' | '\u{00AD}' => {}
            '\u{FB00}' => out.push_str("ff"),
            '\u{FB01}' => out.push_str("fi"),
            '\u{FB02}' => out.push_str("fl"),
            '\u{FB03}' => out.push_str("ffi"),
            '\u{FB04}' => out.push_str("ffl"),
            '\u{FB05}' | '\u{FB06}' => out.push_str("st"),
            _ => out.push(c),
        }
    }
    out
}

// ── Equation numbers ────────────────────────────────────────────────────────
//
// `$$ E = mc^2 $$ (1)` and `$$ E = mc^2 \quad (1) $$` both become
// `$$ E = mc^2 \tag{1} $$`, so the number renders beside the equation
// instead of as a stray paragraph.

static RE_NUMBER_AFTER_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)\$\$[ \t]*\([ \t]*(\d+(?:\.\d+)*[a-z]?)[ \t]*\)[ \t]*$").unwrap()
});

static RE_NUMBER_QUAD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)\\q?quad[ \t]*\([ \t]*(\d+(?:\.\d+)*[a-z]?)[ \t]*\)[ \t]*\$\$[ \t]*$")
        .unwrap()
});

fn tag_equation_numbers(input: &str) -> String {
    let tag = |caps: &Captures<'_>| format!("\\tag{{{}}} $$", &caps[1]);
    let s = RE_NUMBER_AFTER_BLOCK.replace_all(input, tag);
    RE_NUMBER_QUAD.replace_all(&s, tag).into_owned()
}

// ── Line layout ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind {
    Prose,
    Math,
}

/// Mark the lines of every `$$ … $$` display block, delimiters included.
///
/// A block that never closes is treated as prose so that one stray `$$`
/// cannot swallow the rest of the page.
fn classify_lines(lines: &[&str]) -> Vec<LineKind> {
    let mut kinds = vec![LineKind::Prose; lines.len()];
    let mut open_at: Option<usize> = None;

    for (i, line) in lines.iter().enumerate() {
        let t = line.trim();
        let odd = t.matches("$$").count() % 2 == 1;
        match open_at {
            Some(_) => {
                kinds[i] = LineKind::Math;
                if odd {
                    open_at = None;
                }
            }
            None if t.starts_with("$$") => {
                kinds[i] = LineKind::Math;
                if odd {
                    open_at = Some(i);
                }
            }
            None if odd => open_at = Some(i + 1),
            None => {}
        }
    }

    if let Some(start) = open_at {
        for kind in &mut kinds[start.min(lines.len())..] {
            *kind = LineKind::Prose;
        }
    }
    kinds
}

static RE_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#{1,6}\s+\S").unwrap());

/// Trim trailing whitespace, drop blank lines inside display math, cap
/// blank runs at two and, when `space_headings` is set, put exactly one
/// blank line before every heading that is not the first line.
fn layout_lines(input: &str, space_headings: bool) -> String {
    let lines: Vec<&str> = input.lines().map(str::trim_end).collect();
    let kinds = classify_lines(&lines);

    let mut out: Vec<&str> = Vec::with_capacity(lines.len() + 8);
    let mut blank_run = 0usize;
    for (&line, &kind) in lines.iter().zip(&kinds) {
        if line.is_empty() {
            if kind == LineKind::Prose {
                blank_run += 1;
                if blank_run <= 2 {
                    out.push("");
                }
            }
            continue;
        }
        if space_headings && kind == LineKind::Prose && RE_HEADING.is_match(line) {
            while out.last() == Some(&"") {
                out.pop();
            }
            if !out.is_empty() {
                out.push("");
            }
        }
        blank_run = 0;
        out.push(line);
    }
    out.join("\n")
}

// ── Tables ──────────────────────────────────────────────────────────────────

fn is_table_row(line: &str) -> bool {
    let t = line.trim();
    t.len() > 2 && t.starts_with('|') && t.ends_with('|')
}

fn is_separator_row(line: &str) -> bool {
    let t = line.trim();
    t.starts_with('|')
        && t.contains('-')
        && t.chars().all(|c| matches!(c, '|' | '-' | ':' | ' '))
}

fn separator_for(header: &str) -> String {
    let cols = header.trim().matches('|').count().saturating_sub(1).max(1);
    format!("|{}", " --- |".repeat(cols))
}

/// Each run of table rows gets exactly one separator, directly under its
/// header. A missing one is inserted; any later ones (models like to
/// repeat them before a "Total" or "Ours" row) are dropped.
fn repair_tables(input: &str) -> String {
    let lines: Vec<&str> = input.lines().collect();
    let mut out: Vec<String> = Vec::with_capacity(lines.len() + 4);

    let mut i = 0;
    while i < lines.len() {
        if !is_table_row(lines[i]) || is_separator_row(lines[i]) {
            out.push(lines[i].to_string());
            i += 1;
            continue;
        }

        let header = lines[i];
        out.push(header.to_string());
        out.push(separator_for(header));
        i += 1;
        if lines.get(i).is_some_and(|l| is_separator_row(l)) {
            out.pop();
            out.push(lines[i].to_string());
            i += 1;
        }
        while i < lines.len() && is_table_row(lines[i]) {
            if !is_separator_row(lines[i]) {
                out.push(lines[i].to_string());
            }
            i += 1;
        }
    }
    out.join("\n")
}

static RE_TABLE_CAPTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:\*\*|\*|_)?Table\s+[0-9IVXivx]+[.:]").unwrap());

/// Put a blank line between a `Table N:` caption and a table directly
/// above or below it; without one the rows render as caption text.
fn detach_table_captions(input: &str) -> String {
    let lines: Vec<&str> = input.lines().collect();
    let mut out: Vec<&str> = Vec::with_capacity(lines.len() + 4);
    for (i, &line) in lines.iter().enumerate() {
        let caption = RE_TABLE_CAPTION.is_match(line);
        if caption && i > 0 && is_table_row(lines[i - 1]) {
            out.push("");
        }
        out.push(line);
        if caption && lines.get(i + 1).is_some_and(|next| is_table_row(next)) {
            out.push("");
        }
    }
    out.join("\n")
}

// ── Image links ─────────────────────────────────────────────────────────────
//
// Asked to mark figures, VLMs invent paths such as `figure1.png` or
// `https://example.com/chart.png`. A link survives only when it is an
// absolute HTTP(S) URL on a real host, or a page image this crate writes
// itself (`<stem>_figures/page_N.png`). Otherwise the alt text is kept as
// an italic caption.

static RE_IMAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"!\[([^\]]*)\]\(([^)]*)\)").unwrap());

static RE_PAGE_IMAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^/\\]+_figures/page_\d+\.png$").unwrap());

const PLACEHOLDER_HOSTS: &[&str] = &[
    "example.com",
    "example.org",
    "placeholder.com",
    "placehold.it",
    "dummyimage.com",
    "picsum.photos",
];

fn is_invented_url(url: &str) -> bool {
    let u = url.trim();
    if RE_PAGE_IMAGE.is_match(u) {
        return false;
    }
    if !(u.starts_with("http://") || u.starts_with("https://")) {
        return true;
    }
    PLACEHOLDER_HOSTS.iter().any(|host| u.contains(host))
}

fn remove_hallucinated_images(input: &str) -> String {
    RE_IMAGE
        .replace_all(input, |caps: &Captures<'_>| {
            if !is_invented_url(&caps[2]) {
                return caps[0].to_string();
            }
            match caps[1].trim() {
                "" => String::new(),
                alt => format!("*{alt}*"),
            }
        })
        .into_owned()
}

fn ensure_final_newline(input: &str) -> String {
    let trimmed = input.trim_end();
    if trimmed.is_empty() {
        String::from("\n")
    } else {
        format!("{trimmed}\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_outer_fence_around_a_page() {
        let input = "```markdown\n## 3 Model Architecture\nThe encoder maps...\n```";
        assert_eq!(
            strip_markdown_fences(input),
            "## 3 Model Architecture\nThe encoder maps..."
        );
        let listing = "```python\nprint(1)\n```";
        assert_eq!(strip_markdown_fences(listing), listing);
    }

    #[test]
    fn ligatures_and_invisible_glyphs() {
        assert_eq!(
            normalise_glyphs("e\u{FB03}cient \u{FB01}gure\u{200B} of\u{00AD}f"),
            "efficient figure off"
        );
    }

    #[test]
    fn number_after_display_block_becomes_tag() {
        assert_eq!(
            tag_equation_numbers(r"$$ \mathrm{Attention}(Q, K, V) $$ (1)"),
            r"$$ \mathrm{Attention}(Q, K, V) \tag{1} $$"
        );
        assert_eq!(
            tag_equation_numbers("$$\nPE = \\sin(pos)\n$$ (3.2)"),
            "$$\nPE = \\sin(pos)\n\\tag{3.2} $$"
        );
    }

    #[test]
    fn quad_number_inside_block_becomes_tag() {
        assert_eq!(
            tag_equation_numbers(r"$$ y = Wx \qquad (2a) $$"),
            r"$$ y = Wx \tag{2a} $$"
        );
    }

    #[test]
    fn unnumbered_and_inline_math_untouched() {
        let input = "where $f(x)$ (1) is cited and $$ a + b $$";
        assert_eq!(tag_equation_numbers(input), input);
    }

    #[test]
    fn display_math_is_kept_tight() {
        let input = "The loss is\n$$\nL = -\\sum_i y_i\n\n\\log p_i\n$$\n\n\n\n\nwhere y is...";
        assert_eq!(
            layout_lines(input, true),
            "The loss is\n$$\nL = -\\sum_i y_i\n\\log p_i\n$$\n\n\nwhere y is..."
        );
    }

    #[test]
    fn hash_inside_math_is_not_a_heading() {
        let input = "$$\n# \\text{heads} = 8\n$$";
        assert_eq!(layout_lines(input, true), input);
    }

    #[test]
    fn headings_get_one_blank_line() {
        let input = "last line of abstract\n## 1 Introduction\nRecurrent models...\n\n\n### 1.1 Background";
        assert_eq!(
            layout_lines(input, true),
            "last line of abstract\n\n## 1 Introduction\nRecurrent models...\n\n### 1.1 Background"
        );
    }

    #[test]
    fn unclosed_math_does_not_swallow_the_page() {
        let input = "$$ broken\n\n## 2 Related Work\n\n\n\n\ntext";
        assert_eq!(
            layout_lines(input, true),
            "$$ broken\n\n## 2 Related Work\n\n\ntext"
        );
    }

    #[test]
    fn results_table_gets_header_separator() {
        let input = "| Model | BLEU |\n| Transformer (big) | 28.4 |";
        assert_eq!(
            repair_tables(input),
            "| Model | BLEU |\n| --- | --- |\n| Transformer (big) | 28.4 |"
        );
    }

    #[test]
    fn repeated_separator_before_our_row_is_dropped() {
        let input = "| Model | EN-DE |\n|:---|---:|\n| ByteNet | 23.75 |\n| --- | --- |\n| Ours | 28.4 |";
        assert_eq!(
            repair_tables(input),
            "| Model | EN-DE |\n|:---|---:|\n| ByteNet | 23.75 |\n| Ours | 28.4 |"
        );
    }

    #[test]
    fn table_caption_is_detached_from_rows() {
        let input = "Table 2: BLEU scores on newstest2014.\n| Model | BLEU |\n| --- | --- |\n| Base | 27.3 |\n**Table 3:** Variations.";
        assert_eq!(
            detach_table_captions(input),
            "Table 2: BLEU scores on newstest2014.\n\n| Model | BLEU |\n| --- | --- |\n| Base | 27.3 |\n\n**Table 3:** Variations."
        );
    }

    #[test]
    fn invented_figure_paths_become_captions() {
        let input = "![Figure 1: The Transformer](figure1.png) and ![](https://example.com/x.png)";
        assert_eq!(
            remove_hallucinated_images(input),
            "*Figure 1: The Transformer* and "
        );
    }

    #[test]
    fn real_and_own_image_links_survive() {
        for input in [
            "![Figure](https://arxiv.org/html/1706.03762/fig1.png)",
            "![Page 3 - Contains figure](attention_figures/page_3.png)",
        ] {
            assert_eq!(remove_hallucinated_images(input), input);
        }
        assert_eq!(
            remove_hallucinated_images("![Fig](assets/x_figures/page_1.png)"),
            "*Fig*"
        );
    }

    #[test]
    fn tidy_keeps_structure() {
        let input = "# Title\r\nthe e\u{FB00}ect\n| A | B |\n\n\n\n\n$$\n\nx\n$$ (Eq. 1)";
        assert_eq!(
            tidy_markdown(input),
            "# Title\nthe effect\n| A | B |\n\n\n$$\nx\n$$ (Eq. 1)\n"
        );
    }

    #[test]
    fn vlm_page_end_to_end() {
        let input = "```markdown\r\n## 3.2 Attention\r\nWe compute \\(QK^T\\):\r\n\\[\r\n\\mathrm{softmax}(QK^T)V\r\n\\] (1)\r\nTable 1: Complexity.\r\n| Layer | Ops |\r\n| Self-Attention | O(n^2 d) |\r\n![chart](chart.png)\r\n```";
        let out = clean_markdown(input);
        assert_eq!(
            out,
            "## 3.2 Attention\nWe compute $QK^T$:\n$$\n\\mathrm{softmax}(QK^T)V\n\\tag{1} $$\nTable 1: Complexity.\n\n| Layer | Ops |\n| --- | --- |\n| Self-Attention | O(n^2 d) |\n*chart*\n"
        );
        assert_eq!(clean_markdown(&out), out);
    }
}
