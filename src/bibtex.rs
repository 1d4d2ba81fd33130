//! BibTeX rendering of [`PaperMetadata`].
//!
//! The entry type follows the venue: `@inproceedings` for proceedings,
//! conferences and workshops, `@article` for journals, transactions and any
//! other named venue, `@misc` when no venue is known.

use crate::output::PaperMetadata;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt::Write as _;

static RE_PROCEEDINGS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:proceedings|conference|workshop|symposium|NeurIPS|NIPS|ICML|ICLR|ACL|EMNLP|NAACL|CVPR|ICCV|ECCV|AAAI|IJCAI|KDD|SIGIR|SIGGRAPH)\b",
    )
    .unwrap()
});

/// Title words that never make a good citation key.
const KEY_STOPWORDS: &[&str] = &[
    "a", "an", "the", "on", "of", "for", "and", "in", "to", "with", "towards", "toward", "via",
    "is", "are",
];

/// BibTeX entry kinds produced by [`to_bibtex`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryType {
    InProceedings,
    Article,
    Misc,
}

impl EntryType {
    pub fn for_venue(venue: Option<&str>) -> Self {
        match venue {
            None => EntryType::Misc,
            Some(v) if v.to_lowercase().starts_with("arxiv preprint") => EntryType::Misc,
            Some(v) if RE_PROCEEDINGS.is_match(v) => EntryType::InProceedings,
            Some(_) => EntryType::Article,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            EntryType::InProceedings => "inproceedings",
            EntryType::Article => "article",
            EntryType::Misc => "misc",
        }
    }

    /// Field that carries the venue name.
    fn venue_field(self) -> &'static str {
        match self {
            EntryType::InProceedings => "booktitle",
            EntryType::Article => "journal",
            EntryType::Misc => "howpublished",
        }
    }
}

/// Render a BibTeX entry.
pub fn to_bibtex(meta: &PaperMetadata) -> String {
    let kind = EntryType::for_venue(meta.venue.as_deref());

    let mut fields: Vec<(&str, String)> = vec![
        ("title", format!("{{{}}}", escape(&meta.title))),
        ("author", escape(&meta.authors.join(" and "))),
    ];
    if let Some(year) = meta.year {
        fields.push(("year", year.to_string()));
    }
    if let Some(venue) = &meta.venue {
        fields.push((kind.venue_field(), escape(venue)));
    }
    if let Some(doi) = &meta.doi {
        fields.push(("doi", doi.clone()));
    }
    if let Some(id) = &meta.arxiv_id {
        fields.push(("eprint", id.clone()));
        fields.push(("archivePrefix", "arXiv".to_string()));
    }
    if let Some(abs) = &meta.abstract_text {
        fields.push(("abstract", escape(abs)));
    }

    let mut out = format!("@{}{{{},\n", kind.as_str(), citation_key(meta));
    for (name, value) in &fields {
        let _ = writeln!(out, "  {name} = {{{value}}},");
    }
    out.push_str("}\n");
    out
}

/// `surname` + `year` + first significant title word, lowercase ASCII.
///
/// `Vaswani et al. 2017, "Attention Is All You Need"` → `vaswani2017attention`.
pub fn citation_key(meta: &PaperMetadata) -> String {
    let surname = meta
        .authors
        .first()
        .and_then(|a| a.split_whitespace().last())
        .map(ascii_lower)
        .unwrap_or_default();
    let year = meta.year.map(|y| y.to_string()).unwrap_or_default();
    let word = meta
        .title
        .split(|c: char| !c.is_alphanumeric())
        .map(ascii_lower)
        .find(|w| !w.is_empty() && !KEY_STOPWORDS.contains(&w.as_str()))
        .unwrap_or_default();

    let key = format!("{surname}{year}{word}");
    if key.is_empty() {
        "paper".to_string()
    } else {
        key
    }
}

/// Lowercase and drop everything outside `[a-z0-9]`, folding common
/// accented Latin letters first.
fn ascii_lower(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            'à' | 'á' | 'â' | 'ä' | 'ã' | 'å' | 'À' | 'Á' | 'Â' | 'Ä' | 'Ã' | 'Å' => 'a',
            'è' | 'é' | 'ê' | 'ë' | 'È' | 'É' | 'Ê' | 'Ë' => 'e',
            'ì' | 'í' | 'î' | 'ï' | 'Ì' | 'Í' | 'Î' | 'Ï' => 'i',
            'ò' | 'ó' | 'ô' | 'ö' | 'õ' | 'ø' | 'Ò' | 'Ó' | 'Ô' | 'Ö' | 'Õ' | 'Ø' => 'o',
            'ù' | 'ú' | 'û' | 'ü' | 'Ù' | 'Ú' | 'Û' | 'Ü' => 'u',
            'ñ' | 'Ñ' => 'n',
            'ç' | 'Ç' => 'c',
            other => other.to_ascii_lowercase(),
        })
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .collect()
}

/// Escape characters with special meaning in BibTeX field values.
fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' | '%' | '$' | '#' | '_' => {
                out.push('\\');
                out.push(c);
            }
            '{' | '}' => {}
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attention() -> PaperMetadata {
        PaperMetadata {
            title: "Attention Is All You Need".into(),
            authors: vec!["Ashish Vaswani".into(), "Noam Shazeer".into()],
            year: Some(2017),
            venue: Some("31st Conference on Neural Information Processing Systems (NIPS 2017)".into()),
            abstract_text: Some("We propose the Transformer.".into()),
            doi: None,
            arxiv_id: Some("1706.03762".into()),
        }
    }

    #[test]
    fn conference_paper_is_inproceedings() {
        let bib = to_bibtex(&attention());
        assert!(bib.starts_with("@inproceedings{vaswani2017attention,\n"), "{bib}");
        assert!(bib.contains("  title = {{Attention Is All You Need}},\n"));
        assert!(bib.contains("  author = {Ashish Vaswani and Noam Shazeer},\n"));
        assert!(bib.contains("  year = {2017},\n"));
        assert!(bib.contains("  booktitle = {31st Conference"));
        assert!(bib.contains("  eprint = {1706.03762},\n"));
        assert!(bib.contains("  archivePrefix = {arXiv},\n"));
        assert!(bib.ends_with("}\n"));
    }

    #[test]
    fn entry_type_by_venue() {
        assert_eq!(EntryType::for_venue(None), EntryType::Misc);
        assert_eq!(
            EntryType::for_venue(Some("arXiv preprint arXiv:1706.03762")),
            EntryType::Misc
        );
        assert_eq!(
            EntryType::for_venue(Some("Journal of Machine Learning Research")),
            EntryType::Article
        );
        assert_eq!(
            EntryType::for_venue(Some("IEEE Transactions on Pattern Analysis")),
            EntryType::Article
        );
        assert_eq!(
            EntryType::for_venue(Some("Published as a conference paper at ICLR 2021")),
            EntryType::InProceedings
        );
    }

    #[test]
    fn preprint_uses_howpublished() {
        let meta = PaperMetadata {
            venue: Some("arXiv preprint arXiv:2005.14165".into()),
            ..attention()
        };
        let bib = to_bibtex(&meta);
        assert!(bib.starts_with("@misc{"));
        assert!(bib.contains("howpublished = {arXiv preprint arXiv:2005.14165}"));
    }

    #[test]
    fn special_characters_are_escaped() {
        let meta = PaperMetadata {
            title: "Q&A over 100% of {data}_sets".into(),
            authors: vec!["Jane Doe".into()],
            ..Default::default()
        };
        let bib = to_bibtex(&meta);
        assert!(bib.contains(r"title = {{Q\&A over 100\% of data\_sets}}"), "{bib}");
    }

    #[test]
    fn key_skips_stopwords_and_folds_accents() {
        let meta = PaperMetadata {
            title: "On the Opportunities and Risks".into(),
            authors: vec!["Rishi Bommasani".into()],
            year: Some(2021),
            ..Default::default()
        };
        assert_eq!(citation_key(&meta), "bommasani2021opportunities");

        let meta = PaperMetadata {
            title: "Étude".into(),
            authors: vec!["José Müller".into()],
            ..Default::default()
        };
        assert_eq!(citation_key(&meta), "mulleretude");
    }

    #[test]
    fn empty_record_has_fallback_key() {
        assert_eq!(citation_key(&PaperMetadata::default()), "paper");
    }
}
