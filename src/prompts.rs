//! Prompts for VLM page transcription.
//!
//! Callers can replace the system prompt with
//! [`crate::config::ConversionConfig::system_prompt`]; the user instruction is
//! always sent alongside the page image.

/// Default system prompt for transcribing a research-paper page.
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You transcribe pages of academic research papers into Markdown.

1. TEXT
   - Preserve all body text, captions and footnotes in reading order
   - For two-column layouts, transcribe the left column before the right one
   - Do not summarise, translate or correct the authors' wording

2. STRUCTURE
   - Use # for the paper title (first page only)
   - Use ## for numbered sections and ### for subsections, keeping the numbers
   - Put the author list and affiliations on their own lines below the title

3. MATHEMATICS
   - Write inline math as $...$ and display equations as $$...$$ in LaTeX
   - Keep equation numbers as \tag{N} or a trailing (N)

4. TABLES
   - Use GFM pipe tables; keep the caption as a bold line above the table

5. FIGURES
   - Keep figure captions verbatim, e.g. "Figure 2: ..."
   - Do not invent image links or describe figure contents

6. IGNORE
   - Running headers, footers and page numbers
   - Line numbers in review copies

7. OUTPUT
   - Output only the Markdown, without ``` fences or commentary"#;

/// Instruction sent in the user turn together with the page image.
pub const PAGE_INSTRUCTION: &str = "Extract all text from this image in markdown format. \
Preserve the structure, headings, equations (in LaTeX), and tables. \
For figures/diagrams, note their location with markdown image syntax: ![Figure caption](path). \
For tables, use markdown table syntax.";

/// Context message for `maintain_format`: the previous page's Markdown.
pub fn maintain_format_context(prior_page: &str) -> String {
    format!(
        "The previous page of this paper was transcribed as follows. Continue its \
heading levels, list numbering, equation numbering and any sentence it leaves \
unfinished.\n\n\"\"\"{}\"\"\"",
        prior_page
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prior_page_is_quoted() {
        let ctx = maintain_format_context("## 3 Model");
        assert!(ctx.ends_with("\"\"\"## 3 Model\"\"\""));
    }

    #[test]
    fn instruction_asks_for_latex() {
        assert!(PAGE_INSTRUCTION.contains("LaTeX"));
        assert!(DEFAULT_SYSTEM_PROMPT.contains("$$"));
    }
}
