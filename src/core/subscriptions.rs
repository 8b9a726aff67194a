//! Subscription list helpers: language filtering, result merging, and the
//! per-language counts that feed list-backed form sections.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::core::formulas::{self, Measure};
use crate::error::{CealError, CealResult};
use crate::types::{CatalogEntry, FormType, FormValues, Language, ListKind};

/// Parse a comma-separated language filter (`CHN,JPN` or `1,2`)
pub fn parse_languages(raw: &str) -> CealResult<Vec<Language>> {
    let mut languages = Vec::new();
    for code in raw.split(',').map(str::trim).filter(|c| !c.is_empty()) {
        let language = Language::from_code(code)
            .ok_or_else(|| CealError::BadRequest(format!("Unknown language '{code}'")))?;
        if !languages.contains(&language) {
            languages.push(language);
        }
    }
    Ok(languages)
}

/// Reject catalog records with no title or impossible counts
pub fn validate_entry(entry: &CatalogEntry) -> CealResult<()> {
    if entry.title.trim().is_empty() {
        return Err(CealError::Validation("Title is required".to_string()));
    }
    let mut counts = std::iter::once(entry.title_count).chain(entry.volume_count);
    if counts.any(|n| !n.is_finite() || n < 0.0) {
        return Err(CealError::Validation(format!(
            "'{}' has a negative or non-numeric count",
            entry.title
        )));
    }
    Ok(())
}

/// Keep entries whose language set intersects `languages`; an empty
/// selection keeps everything.
pub fn filter_by_languages<'a, I>(entries: I, languages: &[Language]) -> Vec<CatalogEntry>
where
    I: IntoIterator<Item = &'a CatalogEntry>,
{
    entries
        .into_iter()
        .filter(|entry| {
            languages.is_empty() || entry.languages.iter().any(|l| languages.contains(l))
        })
        .cloned()
        .collect()
}

/// Merge per-language result batches, dropping repeated ids
pub fn merge_unique<I>(batches: I) -> Vec<CatalogEntry>
where
    I: IntoIterator<Item = Vec<CatalogEntry>>,
{
    let mut seen = HashSet::new();
    batches
        .into_iter()
        .flatten()
        .filter(|entry| seen.insert(entry.id))
        .collect()
}

/// Title and volume counts by language over a set of subscribed entries
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LanguageCounts {
    pub titles: [f64; 4],
    pub volumes: [f64; 4],
}

impl LanguageCounts {
    /// Each entry counts once, under its primary language. Entries without a
    /// language are skipped.
    pub fn tally<'a, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = &'a CatalogEntry>,
    {
        let mut counts = LanguageCounts::default();
        for entry in entries {
            if let Some(language) = entry.primary_language() {
                counts.titles[language.index()] += entry.title_count;
                counts.volumes[language.index()] += entry.volume_count.unwrap_or(0.0);
            }
        }
        counts
    }

    pub fn get(&self, measure: Measure, language: Language) -> f64 {
        match measure {
            Measure::Titles => self.titles[language.index()],
            Measure::Volumes => self.volumes[language.index()],
        }
    }
}

/// Overwrite the parts of list-fed sections with subscription counts.
///
/// Only lists present in `counts` are applied.
pub fn apply_list_feeds(
    form: FormType,
    values: &mut FormValues,
    counts: &BTreeMap<ListKind, LanguageCounts>,
) {
    for (section, feed) in formulas::layout(form).fed_sections() {
        let Some(list_counts) = counts.get(&feed.kind) else {
            continue;
        };
        for part in &section.parts {
            if let Some(language) = part.language {
                values.insert(part.field.clone(), list_counts.get(feed.measure, language));
            }
        }
    }
}

/// Lists whose counts feed a form
pub fn feeding_lists(form: FormType) -> Vec<ListKind> {
    let mut kinds: Vec<ListKind> = formulas::layout(form)
        .fed_sections()
        .map(|(_, feed)| feed.kind)
        .collect();
    kinds.dedup();
    kinds
}

/// Forms fed by a list
pub fn forms_fed_by(kind: ListKind) -> Vec<FormType> {
    FormType::ALL
        .into_iter()
        .filter(|form| feeding_lists(*form).contains(&kind))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: u32, languages: &[Language]) -> CatalogEntry {
        let mut e = CatalogEntry::new(ListKind::Av, format!("Title {id}"));
        e.id = id;
        e.languages = languages.to_vec();
        e
    }

    #[test]
    fn test_validate_entry() {
        assert!(validate_entry(&entry(1, &[Language::Korean])).is_ok());

        let blank = CatalogEntry::new(ListKind::Ebook, "  ");
        assert!(validate_entry(&blank).is_err());

        let mut negative = entry(2, &[]);
        negative.volume_count = Some(-1.0);
        assert!(validate_entry(&negative).is_err());
    }

    #[test]
    fn test_parse_languages() {
        assert_eq!(
            parse_languages("CHN, jpn,CHN").unwrap(),
            vec![Language::Chinese, Language::Japanese]
        );
        assert_eq!(parse_languages("3,4").unwrap(), vec![Language::Korean, Language::NonCjk]);
        assert!(parse_languages("").unwrap().is_empty());
        assert!(parse_languages("CHN,XXX").is_err());
    }

    #[test]
    fn test_filter_intersects_language_set() {
        let entries = vec![
            entry(1, &[Language::Chinese]),
            entry(2, &[Language::Korean]),
            entry(3, &[Language::Korean, Language::Japanese]),
            entry(4, &[]),
        ];
        let filtered = filter_by_languages(&entries, &[Language::Chinese, Language::Japanese]);
        let ids: Vec<u32> = filtered.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 3]);

        assert_eq!(filter_by_languages(&entries, &[]).len(), 4);
    }

    #[test]
    fn test_merge_unique_keeps_first_seen() {
        let merged = merge_unique(vec![
            vec![entry(1, &[Language::Chinese]), entry(3, &[Language::Chinese])],
            vec![entry(3, &[Language::Japanese]), entry(2, &[Language::Japanese])],
        ]);
        let ids: Vec<u32> = merged.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 3, 2]);
        assert_eq!(merged[1].languages, vec![Language::Chinese]);
    }

    #[test]
    fn test_tally_counts_primary_language_only() {
        let mut a = entry(1, &[Language::Japanese, Language::Chinese]);
        a.title_count = 2.0;
        a.volume_count = Some(10.0);
        let b = entry(2, &[Language::Japanese]);
        let c = entry(3, &[]);

        let counts = LanguageCounts::tally([&a, &b, &c]);
        assert_eq!(counts.titles, [0.0, 3.0, 0.0, 0.0]);
        assert_eq!(counts.volumes, [0.0, 10.0, 0.0, 0.0]);
    }

    #[test]
    fn test_apply_list_feeds_ebooks() {
        let mut counts = BTreeMap::new();
        counts.insert(
            ListKind::Ebook,
            LanguageCounts {
                titles: [1.0, 2.0, 3.0, 4.0],
                volumes: [10.0, 0.0, 0.0, 0.0],
            },
        );
        let mut values = FormValues::new();
        apply_list_feeds(FormType::ElectronicBooks, &mut values, &counts);

        assert_eq!(values["ebooks_subscription_titles_korean"], 3.0);
        assert_eq!(values["ebooks_subscription_volumes_chinese"], 10.0);

        let mut untouched = FormValues::new();
        apply_list_feeds(FormType::Electronic, &mut untouched, &counts);
        assert!(untouched.is_empty());
    }

    #[test]
    fn test_feeding_lists() {
        assert_eq!(feeding_lists(FormType::ElectronicBooks), vec![ListKind::Ebook]);
        assert_eq!(feeding_lists(FormType::Monographic), Vec::<ListKind>::new());
        assert_eq!(forms_fed_by(ListKind::Av), vec![FormType::OtherHoldings]);
        assert_eq!(forms_fed_by(ListKind::Ejournal), vec![FormType::Electronic]);
    }
}
