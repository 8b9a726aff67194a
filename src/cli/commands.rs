use crate::core::calculator::{audit_consistency, Inconsistency};
use crate::error::{CealError, CealResult};
use crate::excel::YearEndExporter;
use crate::service::recalculate_snapshot;
use crate::store::{load_snapshot, save_snapshot};
use crate::types::ExportSelection;
use colored::Colorize;
use std::path::{Path, PathBuf};

fn format_value(value: Option<f64>) -> String {
    match value {
        Some(v) if v.fract() == 0.0 => format!("{v:.0}"),
        Some(v) => format!("{v:.2}"),
        None => "(missing)".to_string(),
    }
}

/// Execute the export command
pub fn export(
    input: PathBuf,
    year: i32,
    form: String,
    output: Option<PathBuf>,
    verbose: bool,
) -> CealResult<()> {
    println!("{}", "📊 CEAL - Year-End Export".bold().green());
    println!("   Snapshot: {}", input.display());

    let selection: ExportSelection = form.parse()?;
    let exporter = YearEndExporter::new(year, selection);
    let output = output.unwrap_or_else(|| PathBuf::from(exporter.file_name()));
    println!("   Output:   {}\n", output.display());

    if verbose {
        println!("{}", "📖 Loading snapshot...".cyan());
    }
    let snapshot = load_snapshot(&input)?;
    let records = snapshot.institution_years(year);

    if verbose {
        println!(
            "   {} institutions reporting for {}, exporting {}\n",
            records.len(),
            year,
            selection.key().bright_blue()
        );
    }

    exporter.export(&records, &output)?;

    println!("{}", "✅ Export Complete!".bold().green());
    println!("   Excel file: {}\n", output.display());
    Ok(())
}

/// Execute the recalc command
pub fn recalc(input: PathBuf, dry_run: bool) -> CealResult<()> {
    println!("{}", "🧮 CEAL - Recalculating derived fields".bold().green());
    println!("   Snapshot: {}\n", input.display());

    let mut snapshot = load_snapshot(&input)?;
    let changed = recalculate_snapshot(&mut snapshot);

    if changed == 0 {
        println!("{}", "✅ All derived fields already consistent".green());
        return Ok(());
    }

    println!(
        "   {} of {} library-years updated",
        changed.to_string().bold(),
        snapshot.library_years.len()
    );

    if dry_run {
        println!("{}", "📋 Dry run complete - no changes written".yellow());
    } else {
        save_snapshot(&input, &snapshot)?;
        println!("{}", "✅ Snapshot rewritten".bold().green());
    }
    Ok(())
}

fn print_inconsistency(library_name: &str, year: i32, issue: &Inconsistency) {
    println!(
        "   {} {} {} {}: stored {}, expected {}",
        "⚠️".yellow(),
        library_name.bright_blue(),
        year,
        format!("{}.{}", issue.form_type, issue.field).cyan(),
        format_value(issue.stored).red(),
        format_value(Some(issue.expected)).green()
    );
}

/// Execute the audit command; fails when any derived field is stale
pub fn audit(input: PathBuf, year: Option<i32>) -> CealResult<()> {
    println!("{}", "🔍 CEAL - Consistency Audit".bold().green());
    println!("   Snapshot: {}", input.display());
    if let Some(y) = year {
        println!("   Year: {}", y.to_string().bright_yellow());
    }
    println!();

    let found = audit_snapshot(&input, year)?;
    if found == 0 {
        println!("{}", "✅ All derived fields match the formula table".bold().green());
        return Ok(());
    }

    println!(
        "\n{}",
        format!("❌ {found} inconsistent derived fields").bold().red()
    );
    println!("   Run 'ceal recalc' to repair them");
    Err(CealError::Validation(format!(
        "{found} derived fields disagree with the formula table"
    )))
}

fn audit_snapshot(input: &Path, year: Option<i32>) -> CealResult<usize> {
    let snapshot = load_snapshot(input)?;
    let mut found = 0;

    for library_year in &snapshot.library_years {
        if year.is_some_and(|y| y != library_year.year) {
            continue;
        }
        let name = snapshot
            .library(library_year.library_id)
            .map(|l| l.name.as_str())
            .unwrap_or("(unknown library)");
        for issue in audit_consistency(library_year) {
            print_inconsistency(name, library_year.year, &issue);
            found += 1;
        }
    }
    Ok(found)
}
