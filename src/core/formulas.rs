//! Formula table for the ten survey forms
//!
//! Each form is described once: its grouped input sections, the subtotal each
//! section derives, the grand totals built from those subtotals, totals that
//! reach into another form of the same library-year, and the rounding policy.
//! The calculator, the write path and the Excel export all read this table.

use once_cell::sync::Lazy;

use crate::types::{FormType, Language, ListKind};

/// How arithmetic results of a form are rounded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    /// Exact sums
    None,
    /// Round to two decimals after every addition (fiscal and FTE figures)
    TwoDecimals,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sign {
    Plus,
    Minus,
}

/// What a subscription list contributes to a list-fed section
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Measure {
    Titles,
    Volumes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListFeed {
    pub kind: ListKind,
    pub measure: Measure,
}

/// A raw input column
#[derive(Debug, Clone)]
pub struct Part {
    pub field: String,
    pub label: String,
    pub language: Option<Language>,
}

/// A grouped header: raw parts plus an optional subtotal over them
#[derive(Debug, Clone)]
pub struct Section {
    pub label: String,
    pub parts: Vec<Part>,
    pub subtotal: Option<String>,
    pub feed: Option<ListFeed>,
}

#[derive(Debug, Clone)]
pub struct Term {
    pub sign: Sign,
    pub field: String,
}

/// A total over fields of the same form, evaluated in declaration order
#[derive(Debug, Clone)]
pub struct Total {
    pub field: String,
    pub label: String,
    pub terms: Vec<Term>,
}

/// A total that sums fields of several forms of the same library-year
#[derive(Debug, Clone)]
pub struct CrossTotal {
    pub field: String,
    pub label: String,
    pub terms: Vec<(FormType, String)>,
}

/// Field that a new year's entry pre-fills from the previous year
#[derive(Debug, Clone)]
pub struct CarryForward {
    pub target: String,
    /// Previous-year fields summed into the target
    pub sources: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct FormLayout {
    pub form_type: FormType,
    pub sections: Vec<Section>,
    pub totals: Vec<Total>,
    pub cross_totals: Vec<CrossTotal>,
    pub carry_forward: Vec<CarryForward>,
    pub rounding: Rounding,
}

impl FormLayout {
    /// Raw input fields in column order
    pub fn input_fields(&self) -> impl Iterator<Item = &str> {
        self.sections
            .iter()
            .flat_map(|s| s.parts.iter().map(|p| p.field.as_str()))
    }

    /// Subtotals, totals and cross totals in column order
    pub fn derived_fields(&self) -> impl Iterator<Item = &str> {
        self.sections
            .iter()
            .filter_map(|s| s.subtotal.as_deref())
            .chain(self.totals.iter().map(|t| t.field.as_str()))
            .chain(self.cross_totals.iter().map(|t| t.field.as_str()))
    }

    pub fn is_input(&self, field: &str) -> bool {
        self.input_fields().any(|f| f == field)
    }

    pub fn is_derived(&self, field: &str) -> bool {
        self.derived_fields().any(|f| f == field)
    }

    pub fn is_known(&self, field: &str) -> bool {
        self.is_input(field) || self.is_derived(field)
    }

    /// Sections whose parts are filled from a subscription list
    pub fn fed_sections(&self) -> impl Iterator<Item = (&Section, ListFeed)> {
        self.sections
            .iter()
            .filter_map(|s| s.feed.map(|feed| (s, feed)))
    }
}

/// Layout of one form
pub fn layout(form: FormType) -> &'static FormLayout {
    // built in FormType::ALL order, which is declaration order
    &LAYOUTS[form as usize]
}

static LAYOUTS: Lazy<Vec<FormLayout>> = Lazy::new(|| {
    FormType::ALL.into_iter().map(build_layout).collect()
});

//==============================================================================
// Builders
//==============================================================================

/// `<prefix>_chinese .. <prefix>_noncjk` with `<prefix>_subtotal`
fn by_language(prefix: &str, label: &str) -> Section {
    Section {
        label: label.to_string(),
        parts: Language::ALL
            .into_iter()
            .map(|language| Part {
                field: format!("{prefix}_{}", language.suffix()),
                label: language.label().to_string(),
                language: Some(language),
            })
            .collect(),
        subtotal: Some(format!("{prefix}_subtotal")),
        feed: None,
    }
}

fn fed(mut section: Section, kind: ListKind, measure: Measure) -> Section {
    section.feed = Some(ListFeed { kind, measure });
    section
}

/// Named parts, optionally subtotalled
fn parts(label: &str, subtotal: Option<&str>, fields: &[(&str, &str)]) -> Section {
    Section {
        label: label.to_string(),
        parts: fields
            .iter()
            .map(|(field, label)| Part {
                field: field.to_string(),
                label: label.to_string(),
                language: None,
            })
            .collect(),
        subtotal: subtotal.map(str::to_string),
        feed: None,
    }
}

fn single(field: &str, label: &str) -> Section {
    parts(label, None, &[(field, label)])
}

fn total(field: &str, label: &str, terms: &[&str]) -> Total {
    Total {
        field: field.to_string(),
        label: label.to_string(),
        terms: terms
            .iter()
            .map(|t| match t.strip_prefix('-') {
                Some(field) => Term {
                    sign: Sign::Minus,
                    field: field.to_string(),
                },
                None => Term {
                    sign: Sign::Plus,
                    field: t.to_string(),
                },
            })
            .collect(),
    }
}

fn carry(target: &str, sources: &[&str]) -> CarryForward {
    CarryForward {
        target: target.to_string(),
        sources: sources.iter().map(|s| s.to_string()).collect(),
    }
}

fn base(form_type: FormType) -> FormLayout {
    FormLayout {
        form_type,
        sections: Vec::new(),
        totals: Vec::new(),
        cross_totals: Vec::new(),
        carry_forward: Vec::new(),
        rounding: Rounding::None,
    }
}

fn build_layout(form: FormType) -> FormLayout {
    match form {
        FormType::Monographic => FormLayout {
            sections: vec![
                by_language("mapurchased_titles", "Purchased Titles"),
                by_language("mapurchased_volumes", "Purchased Volumes"),
                by_language("manonpurchased_titles", "Non-Purchased Titles"),
                by_language("manonpurchased_volumes", "Non-Purchased Volumes"),
            ],
            totals: vec![
                total(
                    "matotal_titles",
                    "Total Titles",
                    &["mapurchased_titles_subtotal", "manonpurchased_titles_subtotal"],
                ),
                total(
                    "matotal_volumes",
                    "Total Volumes",
                    &["mapurchased_volumes_subtotal", "manonpurchased_volumes_subtotal"],
                ),
            ],
            ..base(form)
        },
        FormType::VolumeHoldings => FormLayout {
            sections: vec![
                single("vhprevious_year_subtotal", "Previous Year Total"),
                by_language("vhadded_gross", "Added (Gross)"),
                by_language("vhwithdrawn", "Withdrawn"),
            ],
            totals: vec![
                total(
                    "vhadded_net",
                    "Added (Net)",
                    &["vhadded_gross_subtotal", "-vhwithdrawn_subtotal"],
                ),
                total(
                    "vhgrandtotal",
                    "Grand Total",
                    &["vhprevious_year_subtotal", "vhadded_net"],
                ),
            ],
            cross_totals: vec![CrossTotal {
                field: "vhtotal_with_ebooks".to_string(),
                label: "Physical + Electronic Volumes".to_string(),
                terms: vec![
                    (FormType::VolumeHoldings, "vhgrandtotal".to_string()),
                    (FormType::ElectronicBooks, "ebooks_total_volumes".to_string()),
                ],
            }],
            carry_forward: vec![carry("vhprevious_year_subtotal", &["vhgrandtotal"])],
            ..base(form)
        },
        FormType::Serials => FormLayout {
            sections: vec![
                by_language("spurchased", "Purchased Titles"),
                by_language("snonpurchased", "Non-Purchased Titles"),
                by_language("sfreely_accessible", "Freely Accessible Titles"),
            ],
            totals: vec![total(
                "stotal",
                "Total Serial Titles",
                &[
                    "spurchased_subtotal",
                    "snonpurchased_subtotal",
                    "sfreely_accessible_subtotal",
                ],
            )],
            ..base(form)
        },
        FormType::OtherHoldings => FormLayout {
            sections: vec![
                by_language("ohmicroform", "Microform"),
                by_language("ohcartographic", "Cartographic & Graphic"),
                by_language("ohaudio", "Audio"),
                by_language("ohfilm_video", "Film & Video"),
                by_language("ohdvd", "DVD"),
                fed(
                    by_language("ohav_subscriptions", "AV Subscriptions"),
                    ListKind::Av,
                    Measure::Titles,
                ),
            ],
            totals: vec![total(
                "ohgrandtotal",
                "Grand Total",
                &[
                    "ohmicroform_subtotal",
                    "ohcartographic_subtotal",
                    "ohaudio_subtotal",
                    "ohfilm_video_subtotal",
                    "ohdvd_subtotal",
                    "ohav_subscriptions_subtotal",
                ],
            )],
            ..base(form)
        },
        FormType::Unprocessed => FormLayout {
            sections: vec![by_language("ubvolume", "Unprocessed Volumes")],
            ..base(form)
        },
        FormType::Fiscal => FormLayout {
            sections: vec![
                by_language("fsmonographic", "Monographic Acquisitions"),
                by_language("fsserial", "Serials"),
                by_language("fsother_material", "Other Materials"),
                by_language("fselectronic", "Electronic Resources"),
                by_language("fsendowments", "Endowments"),
                by_language("fsgrants", "Grants"),
                by_language("fseast_asian_program_support", "East Asian Program Support"),
            ],
            totals: vec![
                total(
                    "fstotal_acquisitions",
                    "Total Acquisitions",
                    &[
                        "fsmonographic_subtotal",
                        "fsserial_subtotal",
                        "fsother_material_subtotal",
                        "fselectronic_subtotal",
                    ],
                ),
                total(
                    "fstotal_other_support",
                    "Total Other Support",
                    &[
                        "fsendowments_subtotal",
                        "fsgrants_subtotal",
                        "fseast_asian_program_support_subtotal",
                    ],
                ),
                total(
                    "fsgrand_total",
                    "Grand Total",
                    &["fstotal_acquisitions", "fstotal_other_support"],
                ),
            ],
            rounding: Rounding::TwoDecimals,
            ..base(form)
        },
        FormType::Personnel => FormLayout {
            sections: vec![
                by_language("psfprofessional", "Professional Staff"),
                by_language("psfsupport_staff", "Support Staff"),
                by_language("psfstudent_assistants", "Student Assistants"),
                by_language("psfothers", "Others"),
            ],
            totals: vec![total(
                "psftotal",
                "Total FTE",
                &[
                    "psfprofessional_subtotal",
                    "psfsupport_staff_subtotal",
                    "psfstudent_assistants_subtotal",
                    "psfothers_subtotal",
                ],
            )],
            rounding: Rounding::TwoDecimals,
            ..base(form)
        },
        FormType::PublicServices => FormLayout {
            sections: vec![
                parts(
                    "Presentations",
                    None,
                    &[
                        ("pspresentations", "Sessions"),
                        ("pspresentation_participants", "Participants"),
                    ],
                ),
                single("psreference_transactions", "Reference Transactions"),
                single("pscirculations", "Circulations"),
                parts(
                    "ILL Lending",
                    Some("pslending_subtotal"),
                    &[
                        ("pslending_returnable", "Returnable"),
                        ("pslending_nonreturnable", "Non-Returnable"),
                    ],
                ),
                parts(
                    "ILL Borrowing",
                    Some("psborrowing_subtotal"),
                    &[
                        ("psborrowing_returnable", "Returnable"),
                        ("psborrowing_nonreturnable", "Non-Returnable"),
                    ],
                ),
            ],
            totals: vec![total(
                "psill_total",
                "Total ILL",
                &["pslending_subtotal", "psborrowing_subtotal"],
            )],
            ..base(form)
        },
        FormType::Electronic => FormLayout {
            sections: vec![
                by_language("ecomputer_files_onetime", "Computer Files (One-Time)"),
                by_language("ecomputer_files_accompanied", "Computer Files (Accompanied)"),
                by_language("eindex_databases", "Index & Reference Databases"),
                by_language("efulltext_databases", "Full-Text Databases"),
                fed(
                    by_language("ejournals_subscription_titles", "E-Journal Subscriptions"),
                    ListKind::Ejournal,
                    Measure::Titles,
                ),
            ],
            totals: vec![
                total(
                    "ecomputer_files_total",
                    "Total Computer Files",
                    &[
                        "ecomputer_files_onetime_subtotal",
                        "ecomputer_files_accompanied_subtotal",
                    ],
                ),
                total(
                    "edatabases_total",
                    "Total Databases",
                    &["eindex_databases_subtotal", "efulltext_databases_subtotal"],
                ),
                total(
                    "etotal",
                    "Grand Total",
                    &[
                        "ecomputer_files_total",
                        "edatabases_total",
                        "ejournals_subscription_titles_subtotal",
                    ],
                ),
            ],
            ..base(form)
        },
        FormType::ElectronicBooks => {
            let mut carry_forward = Vec::new();
            for measure in ["titles", "volumes"] {
                for language in Language::ALL {
                    let suffix = language.suffix();
                    let prior = format!("ebooks_purchased_prev_{measure}_{suffix}");
                    let this_year = format!("ebooks_purchased_{measure}_{suffix}");
                    carry_forward.push(carry(&prior, &[prior.as_str(), this_year.as_str()]));
                }
            }

            FormLayout {
                sections: vec![
                    by_language("ebooks_purchased_prev_titles", "Purchased Titles (Prior Years)"),
                    by_language("ebooks_purchased_prev_volumes", "Purchased Volumes (Prior Years)"),
                    by_language("ebooks_purchased_titles", "Purchased Titles (This Year)"),
                    by_language("ebooks_purchased_volumes", "Purchased Volumes (This Year)"),
                    by_language("ebooks_nonpurchased_titles", "Non-Purchased Titles"),
                    by_language("ebooks_nonpurchased_volumes", "Non-Purchased Volumes"),
                    fed(
                        by_language("ebooks_subscription_titles", "Subscription Titles"),
                        ListKind::Ebook,
                        Measure::Titles,
                    ),
                    fed(
                        by_language("ebooks_subscription_volumes", "Subscription Volumes"),
                        ListKind::Ebook,
                        Measure::Volumes,
                    ),
                ],
                totals: vec![
                    total(
                        "ebooks_purchased_total_titles",
                        "Purchased Titles Total",
                        &[
                            "ebooks_purchased_prev_titles_subtotal",
                            "ebooks_purchased_titles_subtotal",
                        ],
                    ),
                    total(
                        "ebooks_purchased_total_volumes",
                        "Purchased Volumes Total",
                        &[
                            "ebooks_purchased_prev_volumes_subtotal",
                            "ebooks_purchased_volumes_subtotal",
                        ],
                    ),
                    total(
                        "ebooks_total_titles",
                        "Total Titles",
                        &[
                            "ebooks_purchased_total_titles",
                            "ebooks_nonpurchased_titles_subtotal",
                            "ebooks_subscription_titles_subtotal",
                        ],
                    ),
                    total(
                        "ebooks_total_volumes",
                        "Total Volumes",
                        &[
                            "ebooks_purchased_total_volumes",
                            "ebooks_nonpurchased_volumes_subtotal",
                            "ebooks_subscription_volumes_subtotal",
                        ],
                    ),
                ],
                carry_forward,
                ..base(form)
            }
        }
    }
}
