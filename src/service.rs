//! Form workflows shared by the HTTP handlers and the CLI
//!
//! Every write recomputes derived fields server-side from the formula table
//! before it reaches the store; values a client sends for subtotals and totals
//! never persist.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::calculator::{
    apply_cross_totals, carry_forward, recalculate, recalculate_library_year, validate_values,
};
use crate::core::subscriptions::{
    apply_list_feeds, feeding_lists, forms_fed_by, validate_entry, LanguageCounts,
};
use crate::error::CealResult;
use crate::store::Store;
use crate::types::{
    CatalogEntry, FormEntry, FormType, FormValues, LibraryYear, ListKind, Snapshot,
};

/// A draft save or final submission of one form
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSubmission {
    #[serde(default)]
    pub values: FormValues,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub submit: bool,
}

/// What the form editor loads: the stored entry, or a pre-filled starting point
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormView {
    pub form_type: FormType,
    pub library_year_id: u32,
    pub is_open_for_editing: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry: Option<FormEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefill: Option<FormValues>,
}

fn tally_feeds(
    form: FormType,
    entries: impl Fn(ListKind) -> Vec<CatalogEntry>,
) -> BTreeMap<ListKind, LanguageCounts> {
    feeding_lists(form)
        .into_iter()
        .map(|kind| (kind, LanguageCounts::tally(&entries(kind))))
        .collect()
}

/// Per-language counts of every list that feeds `form`
pub fn list_counts(
    store: &dyn Store,
    form: FormType,
    library_year_id: u32,
) -> BTreeMap<ListKind, LanguageCounts> {
    tally_feeds(form, |kind| store.subscribed_entries(kind, library_year_id))
}

fn snapshot_list_counts(
    data: &Snapshot,
    form: FormType,
    library_year_id: u32,
) -> BTreeMap<ListKind, LanguageCounts> {
    tally_feeds(form, |kind| data.subscribed_entries(kind, library_year_id))
}

/// Upsert one form of a library-year.
///
/// Other forms of the year are left as stored; two saves of the same form
/// are last-write-wins.
pub fn save_form(
    store: &dyn Store,
    library_year_id: u32,
    form: FormType,
    submission: FormSubmission,
) -> CealResult<LibraryYear> {
    validate_values(form, &submission.values)?;

    let notes = submission
        .notes
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());
    let submitted = submission.submit;
    let submitted_values = submission.values;

    let library_year = store.update_library_year(library_year_id, &mut |library_year, data| {
        let mut values = submitted_values.clone();
        apply_list_feeds(
            form,
            &mut values,
            &snapshot_list_counts(data, form, library_year.id),
        );

        let entry = FormEntry {
            values: recalculate(form, &values),
            notes: notes.clone(),
            submitted,
            updated_at: Some(Utc::now()),
        };
        library_year.forms.insert(form, entry);
        apply_cross_totals(library_year);
        Ok(())
    })?;

    info!(
        library_year_id,
        form = %form,
        submitted,
        "form saved"
    );
    Ok(library_year)
}

/// Load a form for editing, pre-filling from the previous year when empty
pub fn form_view(
    store: &dyn Store,
    library_id: u32,
    year: i32,
    form: FormType,
) -> CealResult<FormView> {
    let library_year = store.library_year(library_id, year)?;

    let (entry, prefill) = match library_year.form(form) {
        Some(entry) => (Some(entry.clone()), None),
        None => {
            let previous = store.library_year(library_id, year - 1).ok();
            let mut values = carry_forward(form, previous.as_ref());
            apply_list_feeds(form, &mut values, &list_counts(store, form, library_year.id));
            (None, Some(recalculate(form, &values)))
        }
    };

    Ok(FormView {
        form_type: form,
        library_year_id: library_year.id,
        is_open_for_editing: library_year.is_open_for_editing,
        entry,
        prefill,
    })
}

/// Re-derive list-fed sections of every stored form a list feeds
pub fn refresh_list_feeds(store: &dyn Store, kind: ListKind, library_year_id: u32) -> CealResult<()> {
    let mut touched = false;

    store.update_library_year(library_year_id, &mut |library_year, data| {
        touched = false;
        for form in forms_fed_by(kind) {
            if !library_year.forms.contains_key(&form) {
                continue;
            }
            let counts = snapshot_list_counts(data, form, library_year_id);
            if let Some(entry) = library_year.forms.get_mut(&form) {
                apply_list_feeds(form, &mut entry.values, &counts);
                entry.values = recalculate(form, &entry.values);
                touched = true;
            }
        }
        if touched {
            apply_cross_totals(library_year);
        }
        Ok(())
    })?;

    if touched {
        debug!(library_year_id, list = %kind, "list-fed sections refreshed");
    }
    Ok(())
}

/// Add or remove a list membership; returns whether anything changed
pub fn toggle_subscription(
    store: &dyn Store,
    kind: ListKind,
    entry_id: u32,
    library_year_id: u32,
    subscribe: bool,
) -> CealResult<bool> {
    let changed = if subscribe {
        store.subscribe(kind, entry_id, library_year_id)?
    } else {
        store.unsubscribe(kind, entry_id, library_year_id)?
    };

    if changed {
        refresh_list_feeds(store, kind, library_year_id)?;
    }
    Ok(changed)
}

/// Validate and store a new catalog record
pub fn create_entry(store: &dyn Store, entry: CatalogEntry) -> CealResult<CatalogEntry> {
    validate_entry(&entry)?;
    let created = store.insert_catalog_entry(entry)?;
    info!(list = %created.kind, id = created.id, "catalog entry created");
    Ok(created)
}

/// Replace a catalog record and re-derive every form it feeds
pub fn update_entry(store: &dyn Store, entry: CatalogEntry) -> CealResult<CatalogEntry> {
    validate_entry(&entry)?;
    let updated = store.update_catalog_entry(entry)?;
    for library_year_id in store.subscribers(updated.kind, updated.id) {
        refresh_list_feeds(store, updated.kind, library_year_id)?;
    }
    info!(list = %updated.kind, id = updated.id, "catalog entry updated");
    Ok(updated)
}

/// Remove a catalog record with its subscriptions and re-derive affected forms
pub fn delete_entry(store: &dyn Store, kind: ListKind, id: u32) -> CealResult<()> {
    let subscribers = store.subscribers(kind, id);
    store.delete_catalog_entry(kind, id)?;
    for library_year_id in subscribers {
        refresh_list_feeds(store, kind, library_year_id)?;
    }
    info!(list = %kind, id, "catalog entry deleted");
    Ok(())
}

/// Recompute every stored derived field; returns the number of library-years changed
pub fn recalculate_snapshot(snapshot: &mut Snapshot) -> usize {
    let mut changed = 0;
    for library_year in snapshot.library_years.iter_mut() {
        let recalculated = recalculate_library_year(library_year);
        if recalculated != *library_year {
            *library_year = recalculated;
            changed += 1;
        }
    }
    changed
}
