//! Figure references for vision-engine pages.
//!
//! Every rendered page is kept as `<stem>_figures/page_N.png`. When the
//! transcribed Markdown mentions a numbered figure caption (`Figure 3:`),
//! a link to that page image is appended so the figure stays visible in the
//! converted document.

use crate::output::FigureRef;
use once_cell::sync::Lazy;
use regex::Regex;

static RE_FIGURE_CAPTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)Figure \d+:").unwrap());

/// Directory, relative to the Markdown file, that holds the page images.
pub fn figures_dir_name(stem: &str) -> String {
    format!("{stem}_figures")
}

/// Relative path of a page image (1-indexed page number).
pub fn page_image_path(stem: &str, page_num: usize) -> String {
    format!("{}/page_{}.png", figures_dir_name(stem), page_num)
}

/// `true` if the page text carries a numbered figure caption.
pub fn has_figure_caption(markdown: &str) -> bool {
    RE_FIGURE_CAPTION.is_match(markdown)
}

/// Append a page-image link to `markdown` if it mentions a figure.
///
/// Returns the figure reference when a link was added.
pub fn attach_figure_link(markdown: &mut String, stem: &str, page_num: usize) -> Option<FigureRef> {
    if !has_figure_caption(markdown) {
        return None;
    }
    let path = page_image_path(stem, page_num);
    markdown.push_str(&format!(
        "\n\n![Page {page_num} - Contains figure]({path})\n"
    ));
    Some(FigureRef { page_num, path })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths() {
        assert_eq!(figures_dir_name("attention"), "attention_figures");
        assert_eq!(page_image_path("attention", 3), "attention_figures/page_3.png");
    }

    #[test]
    fn caption_detection_is_case_insensitive() {
        assert!(has_figure_caption("FIGURE 2: The Transformer"));
        assert!(has_figure_caption("see below.\nFigure 12: Scaled dot-product"));
        assert!(!has_figure_caption("as shown in Figure 2, the model"));
        assert!(!has_figure_caption("Figure: unnumbered"));
    }

    #[test]
    fn link_is_appended_once_per_page() {
        let mut md = "Figure 1: Architecture.".to_string();
        let fig = attach_figure_link(&mut md, "paper", 4).expect("figure expected");
        assert_eq!(fig.page_num, 4);
        assert_eq!(fig.path, "paper_figures/page_4.png");
        assert!(md.ends_with("\n\n![Page 4 - Contains figure](paper_figures/page_4.png)\n"));
    }

    #[test]
    fn no_caption_no_link() {
        let mut md = "Just text.".to_string();
        assert!(attach_figure_link(&mut md, "paper", 1).is_none());
        assert_eq!(md, "Just text.");
    }
}
