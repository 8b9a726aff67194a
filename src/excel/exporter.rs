//! Year-end report exporter

use crate::core::calculator::recalculate_library_year;
use crate::core::formulas::{self, FormLayout, Rounding};
use crate::error::{CealError, CealResult};
use crate::types::{sort_by_library_name, ExportSelection, FormType, InstitutionYear};
use rust_xlsxwriter::{Format, FormatAlign, FormatBorder, Workbook, Worksheet};
use std::path::Path;
use tracing::info;

/// First worksheet row holding institution data
pub const FIRST_DATA_ROW: u32 = 3;

/// One worksheet column under a grouped header
#[derive(Debug, Clone, PartialEq)]
pub struct ReportColumn {
    pub field: String,
    /// Second header row label; empty for single-column groups
    pub label: String,
    pub derived: bool,
}

/// First header row label spanning one or more columns
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderGroup {
    pub label: String,
    pub columns: Vec<ReportColumn>,
}

/// Grouped header layout of a form's worksheet, excluding the leading
/// institution column and the trailing notes column
pub fn header_groups(layout: &FormLayout) -> Vec<HeaderGroup> {
    let mut groups = Vec::new();

    for section in &layout.sections {
        let single = section.parts.len() == 1 && section.subtotal.is_none();
        let mut columns: Vec<ReportColumn> = section
            .parts
            .iter()
            .map(|part| ReportColumn {
                field: part.field.clone(),
                label: if single { String::new() } else { part.label.clone() },
                derived: false,
            })
            .collect();
        if let Some(subtotal) = &section.subtotal {
            columns.push(ReportColumn {
                field: subtotal.clone(),
                label: "Subtotal".to_string(),
                derived: true,
            });
        }
        groups.push(HeaderGroup {
            label: section.label.clone(),
            columns,
        });
    }

    let totals = layout
        .totals
        .iter()
        .map(|t| (&t.field, &t.label))
        .chain(layout.cross_totals.iter().map(|t| (&t.field, &t.label)));
    for (field, label) in totals {
        groups.push(HeaderGroup {
            label: label.clone(),
            columns: vec![ReportColumn {
                field: field.clone(),
                label: String::new(),
                derived: true,
            }],
        });
    }

    groups
}

struct ReportFormats {
    title: Format,
    header: Format,
    sub_header: Format,
    text: Format,
    number: Format,
    decimal: Format,
    subtotal_number: Format,
    subtotal_decimal: Format,
}

impl ReportFormats {
    fn new() -> Self {
        let header = Format::new()
            .set_bold()
            .set_align(FormatAlign::Center)
            .set_align(FormatAlign::VerticalCenter)
            .set_text_wrap()
            .set_background_color(0x4472C4)
            .set_font_color(0xFFFFFF)
            .set_border(FormatBorder::Thin);

        let sub_header = Format::new()
            .set_bold()
            .set_align(FormatAlign::Center)
            .set_background_color(0xD9E1F2)
            .set_border(FormatBorder::Thin);

        let number = Format::new()
            .set_num_format("#,##0")
            .set_border(FormatBorder::Thin);
        let decimal = Format::new()
            .set_num_format("#,##0.00")
            .set_border(FormatBorder::Thin);

        Self {
            title: Format::new()
                .set_bold()
                .set_font_size(14)
                .set_align(FormatAlign::Center),
            header,
            sub_header,
            text: Format::new().set_border(FormatBorder::Thin).set_text_wrap(),
            subtotal_number: number.clone().set_bold().set_background_color(0xE2EFDA),
            subtotal_decimal: decimal.clone().set_bold().set_background_color(0xE2EFDA),
            number,
            decimal,
        }
    }
}

/// Writes one worksheet per form type for a survey year
pub struct YearEndExporter {
    year: i32,
    selection: ExportSelection,
}

impl YearEndExporter {
    pub fn new(year: i32, selection: ExportSelection) -> Self {
        Self { year, selection }
    }

    /// Suggested attachment name, e.g. `CEAL_2024_all.xlsx`
    pub fn file_name(&self) -> String {
        format!("CEAL_{}_{}.xlsx", self.year, self.selection.key())
    }

    /// Render the workbook into an in-memory `.xlsx` buffer
    pub fn render_to_bytes(&self, records: &[InstitutionYear]) -> CealResult<Vec<u8>> {
        let mut workbook = self.build_workbook(records)?;
        workbook
            .save_to_buffer()
            .map_err(|e| CealError::Export(format!("Failed to create Excel buffer: {}", e)))
    }

    /// Write the workbook to an `.xlsx` file
    pub fn export(&self, records: &[InstitutionYear], output_path: &Path) -> CealResult<()> {
        let mut workbook = self.build_workbook(records)?;
        workbook
            .save(output_path)
            .map_err(|e| CealError::Export(format!("Failed to save Excel file: {}", e)))
    }

    fn build_workbook(&self, records: &[InstitutionYear]) -> CealResult<Workbook> {
        // Stored derived fields are not trusted; every row is recomputed.
        let mut rows: Vec<InstitutionYear> = records
            .iter()
            .filter(|r| r.library_year.year == self.year)
            .map(|r| InstitutionYear {
                library: r.library.clone(),
                library_year: recalculate_library_year(&r.library_year),
            })
            .collect();
        sort_by_library_name(&mut rows);

        let formats = ReportFormats::new();
        let mut workbook = Workbook::new();
        let mut sheets = 0;

        for form in self.selection.forms() {
            let form_rows: Vec<&InstitutionYear> = rows
                .iter()
                .filter(|r| r.library_year.form(form).is_some())
                .collect();
            if form_rows.is_empty() {
                continue;
            }

            let worksheet = workbook.add_worksheet();
            self.write_form_sheet(worksheet, form, &form_rows, &formats)?;
            sheets += 1;
        }

        if sheets == 0 {
            return Err(CealError::NotFound(format!(
                "No {} data found for {}",
                self.selection.key(),
                self.year
            )));
        }

        info!(
            year = self.year,
            selection = self.selection.key(),
            sheets,
            institutions = rows.len(),
            "year-end workbook built"
        );
        Ok(workbook)
    }

    fn write_form_sheet(
        &self,
        worksheet: &mut Worksheet,
        form: FormType,
        rows: &[&InstitutionYear],
        formats: &ReportFormats,
    ) -> CealResult<()> {
        worksheet
            .set_name(form.title())
            .map_err(|e| CealError::Export(format!("Failed to set worksheet name: {}", e)))?;

        let layout = formulas::layout(form);
        let groups = header_groups(layout);
        let columns: Vec<&ReportColumn> = groups.iter().flat_map(|g| g.columns.iter()).collect();
        let notes_col = columns.len() as u16 + 1;

        worksheet.merge_range(
            0,
            0,
            0,
            notes_col,
            &format!("{} {}", self.year, form.title()),
            &formats.title,
        )?;

        // Grouped two-level header
        worksheet.merge_range(1, 0, 2, 0, "Institution", &formats.header)?;
        let mut col: u16 = 1;
        for group in &groups {
            let span = group.columns.len() as u16;
            if span == 1 {
                worksheet.merge_range(1, col, 2, col, &group.label, &formats.header)?;
            } else {
                worksheet.merge_range(1, col, 1, col + span - 1, &group.label, &formats.header)?;
                for (offset, column) in group.columns.iter().enumerate() {
                    worksheet.write_string_with_format(
                        2,
                        col + offset as u16,
                        &column.label,
                        &formats.sub_header,
                    )?;
                }
            }
            col += span;
        }
        worksheet.merge_range(1, notes_col, 2, notes_col, "Notes", &formats.header)?;

        let (plain, emphasized) = match layout.rounding {
            Rounding::None => (&formats.number, &formats.subtotal_number),
            Rounding::TwoDecimals => (&formats.decimal, &formats.subtotal_decimal),
        };

        for (idx, record) in rows.iter().enumerate() {
            let row = FIRST_DATA_ROW + idx as u32;
            let Some(entry) = record.library_year.form(form) else {
                continue;
            };

            worksheet.write_string_with_format(row, 0, &record.library.name, &formats.text)?;
            for (offset, column) in columns.iter().enumerate() {
                let col = offset as u16 + 1;
                match entry.values.get(&column.field) {
                    Some(value) => {
                        let format = if column.derived { emphasized } else { plain };
                        worksheet.write_number_with_format(row, col, *value, format)?;
                    }
                    None if column.derived => {
                        worksheet.write_number_with_format(row, col, 0.0, emphasized)?;
                    }
                    None => {
                        worksheet.write_blank(row, col, plain)?;
                    }
                }
            }
            worksheet.write_string_with_format(
                row,
                notes_col,
                entry.notes.as_deref().unwrap_or(""),
                &formats.text,
            )?;
        }

        worksheet.set_column_width(0, 32)?;
        for col in 1..notes_col {
            worksheet.set_column_width(col, 12)?;
        }
        worksheet.set_column_width(notes_col, 40)?;
        worksheet.set_row_height(1, 30)?;
        worksheet.set_freeze_panes(FIRST_DATA_ROW, 1)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FormEntry, Library, LibraryYear};

    fn record(id: u32, name: &str, forms: &[FormType]) -> InstitutionYear {
        let mut ly = LibraryYear::new(id, id, 2024);
        for form in forms {
            ly.forms.insert(*form, FormEntry::default());
        }
        InstitutionYear {
            library: Library {
                id,
                name: name.to_string(),
                code: None,
            },
            library_year: ly,
        }
    }

    #[test]
    fn test_header_groups_language_section() {
        let groups = header_groups(formulas::layout(FormType::Monographic));
        assert_eq!(groups.len(), 6);
        assert_eq!(groups[0].label, "Purchased Titles");
        let labels: Vec<&str> = groups[0].columns.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, vec!["Chinese", "Japanese", "Korean", "Non-CJK", "Subtotal"]);
        assert!(groups[0].columns[4].derived);
        assert_eq!(groups[4].label, "Total Titles");
        assert_eq!(groups[4].columns.len(), 1);
    }

    #[test]
    fn test_header_groups_single_inputs_and_cross_totals() {
        let groups = header_groups(formulas::layout(FormType::VolumeHoldings));
        assert_eq!(groups[0].label, "Previous Year Total");
        assert_eq!(groups[0].columns.len(), 1);
        assert!(!groups[0].columns[0].derived);
        assert_eq!(groups.last().unwrap().columns[0].field, "vhtotal_with_ebooks");
    }

    #[test]
    fn test_file_name() {
        assert_eq!(
            YearEndExporter::new(2024, ExportSelection::All).file_name(),
            "CEAL_2024_all.xlsx"
        );
        assert_eq!(
            YearEndExporter::new(2023, ExportSelection::Form(FormType::Fiscal)).file_name(),
            "CEAL_2023_fiscal.xlsx"
        );
    }

    #[test]
    fn test_no_rows_is_not_found() {
        let exporter = YearEndExporter::new(2024, ExportSelection::All);
        assert!(matches!(
            exporter.render_to_bytes(&[]),
            Err(CealError::NotFound(_))
        ));

        let records = vec![record(1, "Yale", &[FormType::Serials])];
        let fiscal = YearEndExporter::new(2024, ExportSelection::Form(FormType::Fiscal));
        assert!(matches!(
            fiscal.render_to_bytes(&records),
            Err(CealError::NotFound(_))
        ));

        let other_year = YearEndExporter::new(2025, ExportSelection::All);
        assert!(other_year.render_to_bytes(&records).is_err());
    }

    #[test]
    fn test_render_produces_xlsx_bytes() {
        let records = vec![
            record(1, "Yale", &[FormType::Serials, FormType::Fiscal]),
            record(2, "Cornell", &[FormType::Serials]),
        ];
        let bytes = YearEndExporter::new(2024, ExportSelection::All)
            .render_to_bytes(&records)
            .unwrap();
        // xlsx is a zip container
        assert_eq!(&bytes[..2], b"PK");
    }
}
