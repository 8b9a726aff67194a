//! Formula table and calculator integration tests

use ceal_stats::core::calculator::{
    audit_consistency, carry_forward, recalculate, recalculate_library_year, round2,
    validate_values,
};
use ceal_stats::core::formulas::{layout, Rounding, Sign};
use ceal_stats::types::{FormEntry, FormType, FormValues, LibraryYear};
use pretty_assertions::assert_eq;

fn values(pairs: &[(&str, f64)]) -> FormValues {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

// ═══════════════════════════════════════════════════════════════════════════
// SUBTOTALS AND TOTALS
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_monographic_purchased_titles_subtotal() {
    let raw = values(&[
        ("mapurchased_titles_chinese", 10.0),
        ("mapurchased_titles_japanese", 5.0),
        ("mapurchased_titles_korean", 3.0),
        ("mapurchased_titles_noncjk", 2.0),
    ]);
    let result = recalculate(FormType::Monographic, &raw);
    assert_eq!(result["mapurchased_titles_subtotal"], 20.0);
    assert_eq!(result["matotal_titles"], 20.0);
    assert_eq!(result["matotal_volumes"], 0.0);
}

#[test]
fn test_subtotal_equals_sum_of_language_fields_for_every_form() {
    for form in FormType::ALL {
        let form_layout = layout(form);
        let raw: FormValues = form_layout
            .input_fields()
            .enumerate()
            .map(|(i, field)| (field.to_string(), (i + 1) as f64))
            .collect();
        let result = recalculate(form, &raw);

        for section in &form_layout.sections {
            let Some(subtotal) = &section.subtotal else {
                continue;
            };
            let expected: f64 = section.parts.iter().map(|p| raw[&p.field]).sum();
            assert_eq!(result[subtotal], expected, "{form} {subtotal}");
        }
    }
}

#[test]
fn test_client_supplied_derived_fields_are_ignored() {
    let raw = values(&[
        ("ubvolume_chinese", 7.0),
        ("ubvolume_subtotal", 1_000.0),
        ("not_a_field", 3.0),
    ]);
    let result = recalculate(FormType::Unprocessed, &raw);
    assert_eq!(result["ubvolume_subtotal"], 7.0);
    assert!(!result.contains_key("not_a_field"));
}

#[test]
fn test_volume_holdings_net_and_grand_total() {
    let raw = values(&[
        ("vhprevious_year_subtotal", 1_000.0),
        ("vhadded_gross_chinese", 50.0),
        ("vhadded_gross_korean", 25.0),
        ("vhwithdrawn_japanese", 5.0),
    ]);
    let result = recalculate(FormType::VolumeHoldings, &raw);
    assert_eq!(result["vhadded_net"], 70.0);
    assert_eq!(result["vhgrandtotal"], 1_070.0);
}

#[test]
fn test_public_services_ill_total() {
    let raw = values(&[
        ("pslending_returnable", 12.0),
        ("pslending_nonreturnable", 3.0),
        ("psborrowing_returnable", 9.0),
        ("pspresentations", 40.0),
    ]);
    let result = recalculate(FormType::PublicServices, &raw);
    assert_eq!(result["pslending_subtotal"], 15.0);
    assert_eq!(result["psborrowing_subtotal"], 9.0);
    assert_eq!(result["psill_total"], 24.0);
}

// ═══════════════════════════════════════════════════════════════════════════
// ROUNDING
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_fiscal_totals_are_two_decimal() {
    let raw = values(&[
        ("fsmonographic_chinese", 0.1),
        ("fsmonographic_japanese", 0.2),
        ("fsserial_korean", 1234.567),
        ("fsgrants_noncjk", 99.994),
    ]);
    let result = recalculate(FormType::Fiscal, &raw);

    for field in layout(FormType::Fiscal).derived_fields() {
        let v = result[field];
        assert_eq!(v, round2(v), "{field} not rounded: {v}");
    }
    assert_eq!(result["fsmonographic_subtotal"], 0.3);
    assert_eq!(result["fsserial_subtotal"], 1234.57);
    assert_eq!(result["fsgrand_total"], 1334.86);
}

fn fractional_inputs(form: FormType, seed: usize) -> FormValues {
    layout(form)
        .input_fields()
        .enumerate()
        .map(|(i, field)| {
            let n = (i + 1) * (seed + 3);
            let value = (n as f64) * 1.005 + (n % 7) as f64 * 0.3333 + 0.125 * seed as f64;
            (field.to_string(), value)
        })
        .collect()
}

#[test]
fn test_rounded_totals_match_sum_of_rounded_parts() {
    for form in [FormType::Fiscal, FormType::Personnel] {
        let form_layout = layout(form);
        assert_eq!(form_layout.rounding, Rounding::TwoDecimals, "{form}");

        for seed in 0..12 {
            let raw = fractional_inputs(form, seed);
            let result = recalculate(form, &raw);

            for section in &form_layout.sections {
                let Some(subtotal) = &section.subtotal else {
                    continue;
                };
                let expected = round2(section.parts.iter().map(|p| round2(raw[&p.field])).sum());
                assert!(
                    (result[subtotal] - expected).abs() < 0.005,
                    "{form} {subtotal} seed {seed}: {} vs {expected}",
                    result[subtotal]
                );
            }

            for total in &form_layout.totals {
                let expected = round2(
                    total
                        .terms
                        .iter()
                        .map(|t| {
                            let v = round2(result[&t.field]);
                            match t.sign {
                                Sign::Plus => v,
                                Sign::Minus => -v,
                            }
                        })
                        .sum(),
                );
                assert!(
                    (result[&total.field] - expected).abs() < 0.005,
                    "{form} {} seed {seed}",
                    total.field
                );
            }
        }
    }
}

#[test]
fn test_unrounded_forms_sum_parts_exactly() {
    for form in FormType::ALL {
        let form_layout = layout(form);
        if form_layout.rounding != Rounding::None {
            continue;
        }
        for seed in 0..4 {
            let raw = fractional_inputs(form, seed);
            let result = recalculate(form, &raw);
            for section in &form_layout.sections {
                let Some(subtotal) = &section.subtotal else {
                    continue;
                };
                let mut expected = 0.0;
                for part in &section.parts {
                    expected += raw[&part.field];
                }
                assert_eq!(result[subtotal], expected, "{form} {subtotal} seed {seed}");
            }
        }
    }
}

#[test]
fn test_count_forms_sum_exactly() {
    assert_eq!(layout(FormType::Serials).rounding, Rounding::None);
    let raw = values(&[("spurchased_chinese", 0.1), ("spurchased_japanese", 0.2)]);
    let result = recalculate(FormType::Serials, &raw);
    assert_eq!(result["spurchased_subtotal"], 0.1 + 0.2);
}

// ═══════════════════════════════════════════════════════════════════════════
// VALIDATION, CARRY-FORWARD AND AUDIT
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_validate_values() {
    assert!(validate_values(FormType::Serials, &values(&[("spurchased_chinese", 3.0)])).is_ok());
    // Derived fields may be sent back; they are simply recomputed
    assert!(validate_values(FormType::Serials, &values(&[("stotal", 3.0)])).is_ok());
    assert!(validate_values(FormType::Serials, &values(&[("bogus", 3.0)])).is_err());
    assert!(
        validate_values(FormType::Serials, &values(&[("spurchased_chinese", -1.0)])).is_err()
    );
    assert!(
        validate_values(FormType::Serials, &values(&[("spurchased_chinese", f64::NAN)])).is_err()
    );
}

#[test]
fn test_carry_forward_previous_grand_total() {
    let mut previous = LibraryYear::new(1, 1, 2023);
    previous.forms.insert(
        FormType::VolumeHoldings,
        FormEntry::new(values(&[
            ("vhprevious_year_subtotal", 500.0),
            ("vhadded_gross_chinese", 20.0),
            ("vhwithdrawn_chinese", 4.0),
        ])),
    );

    let prefill = carry_forward(FormType::VolumeHoldings, Some(&previous));
    assert_eq!(prefill["vhprevious_year_subtotal"], 516.0);
    assert_eq!(prefill["vhgrandtotal"], 516.0);

    let empty = carry_forward(FormType::VolumeHoldings, None);
    assert_eq!(empty.get("vhprevious_year_subtotal"), None);
    assert_eq!(empty["vhgrandtotal"], 0.0);
}

#[test]
fn test_cross_total_with_ebooks() {
    let mut ly = LibraryYear::new(1, 1, 2024);
    ly.forms.insert(
        FormType::VolumeHoldings,
        FormEntry::new(values(&[("vhprevious_year_subtotal", 100.0)])),
    );
    ly.forms.insert(
        FormType::ElectronicBooks,
        FormEntry::new(values(&[("ebooks_purchased_volumes_chinese", 30.0)])),
    );

    let result = recalculate_library_year(&ly);
    let vh = result.form(FormType::VolumeHoldings).unwrap();
    assert_eq!(vh.value("vhtotal_with_ebooks"), 130.0);
    assert!(audit_consistency(&result).is_empty());
}

#[test]
fn test_audit_reports_tampered_total() {
    let mut ly = LibraryYear::new(9, 1, 2024);
    ly.forms.insert(
        FormType::Serials,
        FormEntry::new(values(&[("spurchased_chinese", 2.0)])),
    );
    let mut ly = recalculate_library_year(&ly);
    ly.forms
        .get_mut(&FormType::Serials)
        .unwrap()
        .values
        .insert("stotal".to_string(), 5.0);

    let issues = audit_consistency(&ly);
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].field, "stotal");
    assert_eq!(issues[0].stored, Some(5.0));
    assert_eq!(issues[0].expected, 2.0);
    assert_eq!(issues[0].library_year_id, 9);
}
