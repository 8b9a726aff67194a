use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::CealError;

//==============================================================================
// Language categories
//==============================================================================

/// Language category every statistic is broken down by.
///
/// Serialized as its numeric id (1-4), the id catalog entries store in their
/// language sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Language {
    Chinese,
    Japanese,
    Korean,
    NonCjk,
}

impl Language {
    pub const ALL: [Language; 4] = [
        Language::Chinese,
        Language::Japanese,
        Language::Korean,
        Language::NonCjk,
    ];

    pub fn id(self) -> u8 {
        match self {
            Language::Chinese => 1,
            Language::Japanese => 2,
            Language::Korean => 3,
            Language::NonCjk => 4,
        }
    }

    /// Three-letter code used by list filters (`CHN`, `JPN`, `KOR`, `NON`)
    pub fn code(self) -> &'static str {
        match self {
            Language::Chinese => "CHN",
            Language::Japanese => "JPN",
            Language::Korean => "KOR",
            Language::NonCjk => "NON",
        }
    }

    /// Field-name suffix (`mapurchased_titles_chinese`)
    pub fn suffix(self) -> &'static str {
        match self {
            Language::Chinese => "chinese",
            Language::Japanese => "japanese",
            Language::Korean => "korean",
            Language::NonCjk => "noncjk",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Language::Chinese => "Chinese",
            Language::Japanese => "Japanese",
            Language::Korean => "Korean",
            Language::NonCjk => "Non-CJK",
        }
    }

    pub fn index(self) -> usize {
        self.id() as usize - 1
    }

    pub fn from_id(id: u8) -> Option<Language> {
        Language::ALL.into_iter().find(|l| l.id() == id)
    }

    /// Accepts a code (`CHN`), an id (`1`) or a suffix (`chinese`), case-insensitive
    pub fn from_code(code: &str) -> Option<Language> {
        let code = code.trim();
        if let Ok(id) = code.parse::<u8>() {
            return Language::from_id(id);
        }
        let upper = code.to_ascii_uppercase();
        Language::ALL
            .into_iter()
            .find(|l| l.code() == upper || l.suffix().eq_ignore_ascii_case(code))
    }
}

impl From<Language> for u8 {
    fn from(language: Language) -> u8 {
        language.id()
    }
}

impl TryFrom<u8> for Language {
    type Error = String;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        Language::from_id(id).ok_or_else(|| format!("unknown language id {id}"))
    }
}

//==============================================================================
// Form types
//==============================================================================

/// The ten annual survey forms a library-year may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FormType {
    Monographic,
    VolumeHoldings,
    Serials,
    OtherHoldings,
    Unprocessed,
    Fiscal,
    Personnel,
    PublicServices,
    Electronic,
    ElectronicBooks,
}

impl FormType {
    pub const ALL: [FormType; 10] = [
        FormType::Monographic,
        FormType::VolumeHoldings,
        FormType::Serials,
        FormType::OtherHoldings,
        FormType::Unprocessed,
        FormType::Fiscal,
        FormType::Personnel,
        FormType::PublicServices,
        FormType::Electronic,
        FormType::ElectronicBooks,
    ];

    /// Wire key used in query strings, routes and snapshot files
    pub fn key(self) -> &'static str {
        match self {
            FormType::Monographic => "monographic",
            FormType::VolumeHoldings => "volumeHoldings",
            FormType::Serials => "serials",
            FormType::OtherHoldings => "otherHoldings",
            FormType::Unprocessed => "unprocessed",
            FormType::Fiscal => "fiscal",
            FormType::Personnel => "personnel",
            FormType::PublicServices => "publicServices",
            FormType::Electronic => "electronic",
            FormType::ElectronicBooks => "electronicBooks",
        }
    }

    /// Human title, also the worksheet name in exports (at most 31 chars)
    pub fn title(self) -> &'static str {
        match self {
            FormType::Monographic => "Monographic Acquisitions",
            FormType::VolumeHoldings => "Volume Holdings",
            FormType::Serials => "Serials",
            FormType::OtherHoldings => "Other Holdings",
            FormType::Unprocessed => "Unprocessed Backlog",
            FormType::Fiscal => "Fiscal Support",
            FormType::Personnel => "Personnel Support",
            FormType::PublicServices => "Public Services",
            FormType::Electronic => "Electronic Resources",
            FormType::ElectronicBooks => "Electronic Books",
        }
    }
}

impl fmt::Display for FormType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for FormType {
    type Err = CealError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FormType::ALL
            .into_iter()
            .find(|f| f.key() == s)
            .ok_or_else(|| CealError::BadRequest(format!("Unknown form type '{s}'")))
    }
}

/// Which forms a year-end export covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportSelection {
    All,
    Form(FormType),
}

impl ExportSelection {
    pub fn forms(self) -> Vec<FormType> {
        match self {
            ExportSelection::All => FormType::ALL.to_vec(),
            ExportSelection::Form(form) => vec![form],
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            ExportSelection::All => "all",
            ExportSelection::Form(form) => form.key(),
        }
    }
}

impl FromStr for ExportSelection {
    type Err = CealError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "all" {
            return Ok(ExportSelection::All);
        }
        s.parse().map(ExportSelection::Form)
    }
}

//==============================================================================
// Libraries and form entries
//==============================================================================

/// Raw and derived values of one form, keyed by field name
pub type FormValues = BTreeMap<String, f64>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Library {
    pub id: u32,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// One form submission inside a library-year
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormEntry {
    #[serde(default)]
    pub values: FormValues,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Final submission rather than a draft save
    #[serde(default)]
    pub submitted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl FormEntry {
    pub fn new(values: FormValues) -> Self {
        Self {
            values,
            ..Default::default()
        }
    }

    pub fn value(&self, field: &str) -> f64 {
        self.values.get(field).copied().unwrap_or(0.0)
    }
}

/// One institution's record for one survey year
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryYear {
    pub id: u32,
    pub library_id: u32,
    pub year: i32,
    #[serde(default = "default_open")]
    pub is_open_for_editing: bool,
    #[serde(default)]
    pub forms: BTreeMap<FormType, FormEntry>,
}

fn default_open() -> bool {
    true
}

impl LibraryYear {
    pub fn new(id: u32, library_id: u32, year: i32) -> Self {
        Self {
            id,
            library_id,
            year,
            is_open_for_editing: true,
            forms: BTreeMap::new(),
        }
    }

    pub fn form(&self, form: FormType) -> Option<&FormEntry> {
        self.forms.get(&form)
    }
}

/// A library-year joined to its owning library, as the export consumes it
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstitutionYear {
    pub library: Library,
    pub library_year: LibraryYear,
}

//==============================================================================
// Subscription lists
//==============================================================================

/// The three shared catalogs libraries subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListKind {
    Av,
    Ebook,
    Ejournal,
}

impl ListKind {
    pub const ALL: [ListKind; 3] = [ListKind::Av, ListKind::Ebook, ListKind::Ejournal];

    pub fn key(self) -> &'static str {
        match self {
            ListKind::Av => "av",
            ListKind::Ebook => "ebook",
            ListKind::Ejournal => "ejournal",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ListKind::Av => "Audio/Visual",
            ListKind::Ebook => "E-Book",
            ListKind::Ejournal => "E-Journal",
        }
    }
}

impl fmt::Display for ListKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A subscribable resource in one of the shared catalogs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    #[serde(default)]
    pub id: u32,
    pub kind: ListKind,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cjk_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub romanized_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Primary language first
    #[serde(default)]
    pub languages: Vec<Language>,
    #[serde(default)]
    pub title_count: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_count: Option<f64>,
    #[serde(default)]
    pub is_global: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub library_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
}

impl CatalogEntry {
    pub fn new(kind: ListKind, title: impl Into<String>) -> Self {
        Self {
            id: 0,
            kind,
            title: title.into(),
            cjk_title: None,
            romanized_title: None,
            subtitle: None,
            publisher: None,
            description: None,
            notes: None,
            languages: Vec::new(),
            title_count: 1.0,
            volume_count: None,
            is_global: false,
            library_id: None,
            year: None,
        }
    }

    pub fn primary_language(&self) -> Option<Language> {
        self.languages.first().copied()
    }
}

/// Join row linking a catalog entry to a library-year
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub kind: ListKind,
    pub entry_id: u32,
    pub library_year_id: u32,
}

//==============================================================================
// Snapshot
//==============================================================================

/// Complete persisted state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub libraries: Vec<Library>,
    #[serde(default)]
    pub library_years: Vec<LibraryYear>,
    #[serde(default)]
    pub catalog: Vec<CatalogEntry>,
    #[serde(default)]
    pub subscriptions: Vec<Subscription>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn library(&self, id: u32) -> Option<&Library> {
        self.libraries.iter().find(|l| l.id == id)
    }

    /// Catalog records a library-year is subscribed to on one list
    pub fn subscribed_entries(&self, kind: ListKind, library_year_id: u32) -> Vec<CatalogEntry> {
        self.subscriptions
            .iter()
            .filter(|s| s.kind == kind && s.library_year_id == library_year_id)
            .filter_map(|s| {
                self.catalog
                    .iter()
                    .find(|e| e.kind == kind && e.id == s.entry_id)
                    .cloned()
            })
            .collect()
    }

    /// Library-years of `year` joined to their libraries, sorted by library name
    pub fn institution_years(&self, year: i32) -> Vec<InstitutionYear> {
        let mut records: Vec<InstitutionYear> = self
            .library_years
            .iter()
            .filter(|ly| ly.year == year)
            .filter_map(|ly| {
                self.library(ly.library_id).map(|library| InstitutionYear {
                    library: library.clone(),
                    library_year: ly.clone(),
                })
            })
            .collect();
        sort_by_library_name(&mut records);
        records
    }
}

pub fn sort_by_library_name(records: &mut [InstitutionYear]) {
    records.sort_by(|a, b| {
        a.library
            .name
            .cmp(&b.library.name)
            .then(a.library.id.cmp(&b.library.id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_codes_round_trip() {
        for language in Language::ALL {
            assert_eq!(Language::from_code(language.code()), Some(language));
            assert_eq!(Language::from_id(language.id()), Some(language));
        }
        assert_eq!(Language::from_code("chn"), Some(Language::Chinese));
        assert_eq!(Language::from_code("2"), Some(Language::Japanese));
        assert_eq!(Language::from_code("noncjk"), Some(Language::NonCjk));
        assert_eq!(Language::from_code("XYZ"), None);
    }

    #[test]
    fn test_language_serializes_as_id() {
        let json = serde_json::to_string(&vec![Language::Chinese, Language::Korean]).unwrap();
        assert_eq!(json, "[1,3]");
        let parsed: Vec<Language> = serde_json::from_str("[2,4]").unwrap();
        assert_eq!(parsed, vec![Language::Japanese, Language::NonCjk]);
        assert!(serde_json::from_str::<Vec<Language>>("[5]").is_err());
    }

    #[test]
    fn test_form_type_keys_parse() {
        for form in FormType::ALL {
            assert_eq!(form.key().parse::<FormType>().unwrap(), form);
            assert!(form.title().len() <= 31);
        }
        assert!("bogus".parse::<FormType>().is_err());
    }

    #[test]
    fn test_export_selection_parse() {
        assert_eq!("all".parse::<ExportSelection>().unwrap(), ExportSelection::All);
        assert_eq!(
            "fiscal".parse::<ExportSelection>().unwrap(),
            ExportSelection::Form(FormType::Fiscal)
        );
        assert!("ALL".parse::<ExportSelection>().is_err());
        assert_eq!(ExportSelection::All.forms().len(), 10);
    }

    #[test]
    fn test_forms_map_serializes_with_wire_keys() {
        let mut ly = LibraryYear::new(1, 1, 2024);
        ly.forms.insert(FormType::VolumeHoldings, FormEntry::default());
        let json = serde_json::to_string(&ly).unwrap();
        assert!(json.contains("\"volumeHoldings\""));
        assert!(json.contains("\"isOpenForEditing\":true"));
    }

    #[test]
    fn test_institution_years_sorted_by_name() {
        let snapshot = Snapshot {
            libraries: vec![
                Library { id: 1, name: "Yale".to_string(), code: None },
                Library { id: 2, name: "Cornell".to_string(), code: None },
                Library { id: 3, name: "Harvard".to_string(), code: None },
            ],
            library_years: vec![
                LibraryYear::new(10, 1, 2024),
                LibraryYear::new(11, 2, 2024),
                LibraryYear::new(12, 3, 2023),
            ],
            ..Default::default()
        };

        let names: Vec<String> = snapshot
            .institution_years(2024)
            .into_iter()
            .map(|r| r.library.name)
            .collect();
        assert_eq!(names, vec!["Cornell", "Yale"]);
    }
}
