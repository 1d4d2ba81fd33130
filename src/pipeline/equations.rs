//! LaTeX delimiter normalisation.
//!
//! VLMs and some PDF producers emit math as `\[ … \]` (display) and
//! `\( … \)` (inline). Most Markdown renderers only understand dollar
//! delimiters, so both forms are rewritten to `$$ … $$` and `$ … $`.
//!
//! Matching is non-greedy and spans newlines. A single pass can pair an
//! outer opener with an inner closer (`\[ a \[ b \] c \]`), leaving a second
//! pair behind, so each kind is rewritten until nothing matches. Every
//! rewrite removes two backslash delimiters and adds none, which bounds the
//! loop and makes the whole function idempotent.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::borrow::Cow;

static RE_DISPLAY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\\\[(.*?)\\\]").unwrap());
static RE_INLINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\\\((.*?)\\\)").unwrap());

/// Rewrite `\[ … \]` to `$$ … $$` and `\( … \)` to `$ … $`.
pub fn normalize_delimiters(text: &str) -> String {
    let display = rewrite_to_fixpoint(text.to_string(), &RE_DISPLAY, "$$");
    rewrite_to_fixpoint(display, &RE_INLINE, "$")
}

fn rewrite_to_fixpoint(mut text: String, re: &Regex, dollars: &str) -> String {
    loop {
        let next = match re.replace_all(&text, |caps: &Captures<'_>| {
            format!("{dollars}{}{dollars}", &caps[1])
        }) {
            Cow::Owned(next) => Some(next),
            Cow::Borrowed(_) => None,
        };
        match next {
            Some(next) => text = next,
            None => return text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_math() {
        assert_eq!(
            normalize_delimiters(r"before \[ E = mc^2 \] after"),
            "before $$ E = mc^2 $$ after"
        );
    }

    #[test]
    fn inline_math() {
        assert_eq!(
            normalize_delimiters(r"where \(d_k\) is the key size"),
            "where $d_k$ is the key size"
        );
    }

    #[test]
    fn display_spans_lines() {
        let input = "\\[\n\\sum_i x_i\n\\]";
        assert_eq!(normalize_delimiters(input), "$$\n\\sum_i x_i\n$$");
    }

    #[test]
    fn non_greedy_pairs() {
        assert_eq!(
            normalize_delimiters(r"\(a\) and \(b\)"),
            "$a$ and $b$"
        );
    }

    #[test]
    fn unmatched_delimiters_are_left_alone() {
        assert_eq!(normalize_delimiters(r"only \[ opener"), r"only \[ opener");
        assert_eq!(normalize_delimiters(r"closer \) only"), r"closer \) only");
    }

    #[test]
    fn existing_dollar_math_untouched() {
        let input = "Already $x$ and $$y$$.";
        assert_eq!(normalize_delimiters(input), input);
    }

    #[test]
    fn repeated_openers_are_fully_rewritten() {
        assert_eq!(
            normalize_delimiters(r"\[ a \[ b \] c \]"),
            "$$ a $$ b $$ c $$"
        );
        assert_eq!(
            normalize_delimiters(r"\( x \( y \) z \)"),
            "$ x $ y $ z $"
        );
    }

    #[test]
    fn idempotent() {
        let samples = [
            r"\[ a \( b \] c \)",
            r"\( \( x \)",
            "\\[\n\\frac{1}{2}\n\\] and \\(y\\) \\]",
            r"plain text with \\ backslashes",
            r"$\alpha$ \(\beta\)",
            r"\[ a \[ b \] c \]",
            r"\( x \( y \) z \)",
            r"\[ \[ \[ x \] \] \( \( y \) \)",
        ];
        for s in samples {
            let once = normalize_delimiters(s);
            let twice = normalize_delimiters(&once);
            assert_eq!(once, twice, "not idempotent for {s:?}");
        }
    }
}
