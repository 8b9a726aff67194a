use crate::core::formulas::{self, Rounding, Sign};
use crate::error::{CealError, CealResult};
use crate::types::{FormEntry, FormType, FormValues, LibraryYear};
use serde::Serialize;

/// Round half away from zero to two decimals
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Running sum honoring a form's rounding policy
struct Accumulator {
    rounding: Rounding,
    total: f64,
}

impl Accumulator {
    fn new(rounding: Rounding) -> Self {
        Self {
            rounding,
            total: 0.0,
        }
    }

    fn add(&mut self, sign: Sign, value: f64) {
        let value = match self.rounding {
            Rounding::None => value,
            Rounding::TwoDecimals => round2(value),
        };
        self.total = match sign {
            Sign::Plus => self.total + value,
            Sign::Minus => self.total - value,
        };
        if self.rounding == Rounding::TwoDecimals {
            self.total = round2(self.total);
        }
    }
}

/// Recompute every derived field of one form from its raw inputs.
///
/// Client-supplied derived values and unknown keys are dropped; missing raw
/// inputs count as zero. Cross-form totals are left to
/// [`apply_cross_totals`].
pub fn recalculate(form: FormType, raw: &FormValues) -> FormValues {
    let layout = formulas::layout(form);

    let mut values: FormValues = raw
        .iter()
        .filter(|(field, _)| layout.is_input(field))
        .map(|(field, value)| (field.clone(), *value))
        .collect();

    for section in &layout.sections {
        if let Some(subtotal) = &section.subtotal {
            let mut acc = Accumulator::new(layout.rounding);
            for part in &section.parts {
                acc.add(Sign::Plus, values.get(&part.field).copied().unwrap_or(0.0));
            }
            values.insert(subtotal.clone(), acc.total);
        }
    }

    for total in &layout.totals {
        let mut acc = Accumulator::new(layout.rounding);
        for term in &total.terms {
            acc.add(term.sign, values.get(&term.field).copied().unwrap_or(0.0));
        }
        values.insert(total.field.clone(), acc.total);
    }

    values
}

/// Recompute an entry's values, keeping its notes and status
pub fn recalculate_entry(form: FormType, entry: &FormEntry) -> FormEntry {
    FormEntry {
        values: recalculate(form, &entry.values),
        ..entry.clone()
    }
}

/// Fill totals that combine several forms of the same library-year.
///
/// A cross total lives on its owning form and is only written when that form
/// exists; contributing forms that are absent count as zero.
pub fn apply_cross_totals(library_year: &mut LibraryYear) {
    let mut updates = Vec::new();

    for form in library_year.forms.keys() {
        let layout = formulas::layout(*form);
        for cross in &layout.cross_totals {
            let mut acc = Accumulator::new(layout.rounding);
            for (other, field) in &cross.terms {
                let value = library_year
                    .form(*other)
                    .map(|entry| entry.value(field))
                    .unwrap_or(0.0);
                acc.add(Sign::Plus, value);
            }
            updates.push((*form, cross.field.clone(), acc.total));
        }
    }

    for (form, field, value) in updates {
        if let Some(entry) = library_year.forms.get_mut(&form) {
            entry.values.insert(field, value);
        }
    }
}

/// Recompute every form of a library-year, then its cross-form totals
pub fn recalculate_library_year(library_year: &LibraryYear) -> LibraryYear {
    let mut result = library_year.clone();
    for (form, entry) in result.forms.iter_mut() {
        entry.values = recalculate(*form, &entry.values);
    }
    apply_cross_totals(&mut result);
    result
}

/// Reject unknown fields and values that are negative or not finite
pub fn validate_values(form: FormType, raw: &FormValues) -> CealResult<()> {
    let layout = formulas::layout(form);

    for (field, value) in raw {
        if !layout.is_known(field) {
            return Err(CealError::Validation(format!(
                "Unknown field '{}' for form '{}'",
                field, form
            )));
        }
        if !value.is_finite() {
            return Err(CealError::Validation(format!(
                "Field '{}' must be a finite number",
                field
            )));
        }
        if *value < 0.0 && layout.is_input(field) {
            return Err(CealError::Validation(format!(
                "Field '{}' must not be negative (got {})",
                field, value
            )));
        }
    }

    Ok(())
}

/// Starting values for a new year's form, carried from the previous year.
///
/// Returns recomputed values so derived fields are present; forms that carry
/// nothing forward yield all-zero derived fields.
pub fn carry_forward(form: FormType, previous: Option<&LibraryYear>) -> FormValues {
    let layout = formulas::layout(form);
    let mut prefill = FormValues::new();

    if let Some(entry) = previous.and_then(|ly| ly.form(form)) {
        let previous_values = recalculate(form, &entry.values);
        for rule in &layout.carry_forward {
            let mut acc = Accumulator::new(layout.rounding);
            for source in &rule.sources {
                acc.add(
                    Sign::Plus,
                    previous_values.get(source).copied().unwrap_or(0.0),
                );
            }
            prefill.insert(rule.target.clone(), acc.total);
        }
    }

    recalculate(form, &prefill)
}

/// A persisted derived value that disagrees with the formula table
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Inconsistency {
    pub library_year_id: u32,
    pub form_type: FormType,
    pub field: String,
    pub stored: Option<f64>,
    pub expected: f64,
}

/// Compare stored derived fields against a fresh recomputation
pub fn audit_consistency(library_year: &LibraryYear) -> Vec<Inconsistency> {
    let expected = recalculate_library_year(library_year);
    let mut found = Vec::new();

    for (form, entry) in &library_year.forms {
        let layout = formulas::layout(*form);
        let tolerance = match layout.rounding {
            Rounding::None => 1e-9,
            Rounding::TwoDecimals => 0.005,
        };
        let Some(recomputed) = expected.form(*form) else {
            continue;
        };

        for field in layout.derived_fields() {
            let want = recomputed.value(field);
            let stored = entry.values.get(field).copied();
            let consistent = stored.is_some_and(|v| (v - want).abs() <= tolerance);
            if !consistent {
                found.push(Inconsistency {
                    library_year_id: library_year.id,
                    form_type: *form,
                    field: field.to_string(),
                    stored,
                    expected: want,
                });
            }
        }
    }

    found
}
