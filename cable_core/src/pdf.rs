//! # PDF Reports
//!
//! Renders calculation reports to PDF with Typst.
//!
//! - One embedded Typst template, filled by `{{PLACEHOLDER}}` replacement
//! - Fonts come from `typst-assets`, nothing is read from disk
//! - Output is raw PDF bytes (`Vec<u8>`)
//!
//! ## Example
//!
//! ```rust,no_run
//! use cable_core::calculations::{calculate, CableSizingInput, LoadSpec};
//! use cable_core::pdf::render_sizing_pdf;
//! use cable_core::report::SizingReport;
//! use cable_core::tables::reference_database;
//!
//! let input = CableSizingInput {
//!     label: "Kitchen ring".to_string(),
//!     load: LoadSpec::Current { amps: 16.0 },
//!     length_m: 50.0,
//!     ..CableSizingInput::default()
//! };
//! let request = input.design_request().unwrap();
//! let result = calculate(&input, reference_database().unwrap()).unwrap();
//! let report = SizingReport::from_calculation(&input, &request, &result);
//!
//! let pdf = render_sizing_pdf(&report, "Via Roma 12").unwrap();
//! std::fs::write("sizing.pdf", pdf).unwrap();
//! ```

use chrono::{DateTime, Datelike, Utc};
use typst::diag::{FileError, FileResult};
use typst::foundations::{Bytes, Datetime};
use typst::syntax::{FileId, Source};
use typst::text::{Font, FontBook};
use typst::utils::LazyHash;
use typst::{Library, LibraryExt, World};
use typst_pdf::PdfOptions;

use crate::archive::ArchiveEntry;
use crate::calculations::{CalculationItem, CalculationOutcome};
use crate::errors::{CalcError, CalcResult};
use crate::report::{Report, ReportRow, SizingReport, VoltageDropReport};

/// Typst world holding one in-memory document and the bundled fonts.
struct PdfWorld {
    main: Source,
    book: LazyHash<FontBook>,
    fonts: Vec<Font>,
    library: LazyHash<Library>,
    now: DateTime<Utc>,
}

impl PdfWorld {
    fn new(source: String) -> Self {
        let fonts: Vec<Font> = typst_assets::fonts()
            .flat_map(|data| Font::iter(Bytes::new(data.to_vec())))
            .collect();
        let book = FontBook::from_fonts(&fonts);

        PdfWorld {
            main: Source::detached(source),
            book: LazyHash::new(book),
            fonts,
            library: LazyHash::new(Library::default()),
            now: Utc::now(),
        }
    }
}

impl World for PdfWorld {
    fn library(&self) -> &LazyHash<Library> {
        &self.library
    }

    fn book(&self) -> &LazyHash<FontBook> {
        &self.book
    }

    fn main(&self) -> FileId {
        self.main.id()
    }

    fn source(&self, id: FileId) -> FileResult<Source> {
        if id == self.main.id() {
            Ok(self.main.clone())
        } else {
            Err(FileError::NotFound(id.vpath().as_rootless_path().into()))
        }
    }

    fn file(&self, id: FileId) -> FileResult<Bytes> {
        Err(FileError::NotFound(id.vpath().as_rootless_path().into()))
    }

    fn font(&self, index: usize) -> Option<Font> {
        self.fonts.get(index).cloned()
    }

    fn today(&self, _offset: Option<i64>) -> Option<Datetime> {
        let date = self.now.date_naive();
        Datetime::from_ymd(date.year(), date.month() as u8, date.day() as u8)
    }
}

const REPORT_TEMPLATE: &str = r##"
#set page(
  paper: "a4",
  margin: (top: 2cm, bottom: 2cm, left: 2cm, right: 2cm),
  header: align(right)[
    #text(size: 9pt, fill: gray)[Cablesizer report]
  ],
  footer: context [
    #line(length: 100%, stroke: 0.5pt + gray)
    #v(4pt)
    #grid(
      columns: (1fr, 1fr, 1fr),
      align(left)[#text(size: 9pt)[{{PROJECT}}]],
      align(center)[#text(size: 9pt)[Page #counter(page).display()]],
      align(right)[#text(size: 9pt)[{{DATE}}]],
    )
  ]
)

#set text(font: "Libertinus Serif", size: 11pt)

#align(center)[
  #block(width: 100%, fill: rgb("#f0f0f0"), inset: 12pt, radius: 4pt)[
    #text(size: 18pt, weight: "bold")[{{TITLE}}]
    #v(4pt)
    #text(size: 13pt)[{{PROJECT}}]
  ]
]

#v(12pt)

== Input

#table(
  columns: (1fr, 2fr),
  inset: 7pt,
  stroke: 0.5pt,
  align: (left, left),
  table.header([*Parameter*], [*Value*]),
{{INPUT_ROWS}}
)

#v(12pt)

== Result

#table(
  columns: (1fr, 2fr),
  inset: 7pt,
  stroke: 0.5pt,
  align: (left, left),
  table.header([*Quantity*], [*Value*]),
{{RESULT_ROWS}}
)

#v(16pt)

#align(center)[
  #block(inset: 10pt, radius: 4pt, stroke: 1pt + {{STATUS_COLOR}})[
    #text(size: 14pt, weight: "bold", fill: {{STATUS_COLOR}})[{{STATUS}}]
  ]
]

#v(16pt)
#text(size: 9pt, fill: gray)[
  Voltage drop: $Delta V = k dot L dot I_b dot (R cos phi + X sin phi) dot 10^(-3)$,
  $k = 2$ single-phase, $k = sqrt(3)$ three-phase.
  Permissible current: $I_z = I_0 dot k_1 k_2 k_3 k_4 dot N$.
]
"##;

/// Render any report to PDF.
///
/// # Returns
///
/// * `Ok(Vec<u8>)` - PDF file as bytes
/// * `Err(CalcError::Internal)` - Typst compilation or PDF export failed
pub fn render_report_pdf(report: &impl Report, project_name: &str) -> CalcResult<Vec<u8>> {
    let status_color = if report.passes() { "rgb(\"#1b7f3b\")" } else { "rgb(\"#b3261e\")" };
    let source = REPORT_TEMPLATE
        .replace("{{TITLE}}", &escape_typst(&report.title()))
        .replace("{{PROJECT}}", &escape_typst(project_name))
        .replace("{{DATE}}", &Utc::now().format("%Y-%m-%d").to_string())
        .replace("{{INPUT_ROWS}}", &table_rows(&report.input_rows()))
        .replace("{{RESULT_ROWS}}", &table_rows(&report.result_rows()))
        .replace("{{STATUS}}", &escape_typst(&report.status_text()))
        .replace("{{STATUS_COLOR}}", status_color);

    compile_pdf(source)
}

/// Render a sizing report to PDF.
pub fn render_sizing_pdf(report: &SizingReport, project_name: &str) -> CalcResult<Vec<u8>> {
    render_report_pdf(report, project_name)
}

/// Render the report of an archived calculation from its saved outcome.
///
/// The entry name is used as the project name on the page.
pub fn render_entry_pdf(entry: &ArchiveEntry) -> CalcResult<Vec<u8>> {
    match (&entry.item, &entry.outcome) {
        (CalculationItem::CableSizing(input), CalculationOutcome::CableSizing(result)) => {
            let request = input.design_request()?;
            let report = SizingReport::from_calculation(input, &request, result);
            render_report_pdf(&report, &entry.name)
        }
        (CalculationItem::VoltageDrop(input), CalculationOutcome::VoltageDrop(result)) => {
            let report = VoltageDropReport::from_check(input, result);
            render_report_pdf(&report, &entry.name)
        }
        _ => Err(CalcError::Internal {
            message: "calculation outcome does not match its input".to_string(),
        }),
    }
}

fn compile_pdf(source: String) -> CalcResult<Vec<u8>> {
    let world = PdfWorld::new(source);

    let document = typst::compile(&world).output.map_err(|errors| {
        let messages: Vec<String> = errors.iter().map(|e| e.message.to_string()).collect();
        CalcError::Internal {
            message: format!("Typst compilation failed: {}", messages.join("; ")),
        }
    })?;

    typst_pdf::pdf(&document, &PdfOptions::default()).map_err(|errors| {
        let messages: Vec<String> = errors.iter().map(|e| e.message.to_string()).collect();
        CalcError::Internal {
            message: format!("PDF rendering failed: {}", messages.join("; ")),
        }
    })
}

fn table_rows(rows: &[ReportRow]) -> String {
    rows.iter()
        .map(|(label, value)| format!("  [{}], [{}],", escape_typst(label), escape_typst(value)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Escape Typst markup characters in user-provided text
fn escape_typst(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '*' | '_' | '#' | '$' | '@' | '<' | '>' | '\\' | '`' | '[' | ']' | '/' | '~') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::Archive;
    use crate::calculations::{calculate, check_voltage_drop, CableSizingInput, LoadSpec, VoltageDropInput};
    use crate::conductors::{Material, PhaseSystem};
    use crate::tables::reference_database;

    fn assert_pdf(bytes: &[u8]) {
        assert!(bytes.starts_with(b"%PDF"), "Output is not a valid PDF");
        assert!(bytes.len() > 1000, "PDF seems too small");
    }

    #[test]
    fn test_escape_typst() {
        assert_eq!(escape_typst("a*b_c#"), "a\\*b\\_c\\#");
        assert_eq!(escape_typst("[x]"), "\\[x\\]");
        assert_eq!(escape_typst("4 mm²"), "4 mm²");
    }

    #[test]
    fn test_sizing_pdf_generation() {
        let input = CableSizingInput {
            label: "Kitchen_ring #1".to_string(),
            load: LoadSpec::Current { amps: 16.0 },
            length_m: 50.0,
            ..CableSizingInput::default()
        };
        let request = input.design_request().unwrap();
        let result = calculate(&input, reference_database().unwrap()).unwrap();
        let report = SizingReport::from_calculation(&input, &request, &result);

        let pdf = render_sizing_pdf(&report, "Via Roma 12");
        assert!(pdf.is_ok(), "PDF generation failed: {:?}", pdf.err());
        assert_pdf(&pdf.unwrap());
    }

    #[test]
    fn test_entry_pdf_generation() {
        let mut archive = Archive::new();
        let item = CalculationItem::VoltageDrop(VoltageDropInput {
            label: "Lighting".to_string(),
            voltage_v: 230.0,
            phase: PhaseSystem::SinglePhase,
            current_a: 10.0,
            length_m: 30.0,
            material: Material::Copper,
            section_mm2: 1.5,
            power_factor: 0.9,
            parallel_runs: 1,
            max_voltage_drop_percent: Some(4.0),
        });
        archive
            .save_evaluated("Quick check", item, reference_database().unwrap())
            .unwrap();
        let pdf = render_entry_pdf(&archive.entries[0]).unwrap();
        assert_pdf(&pdf);
    }

    #[test]
    fn test_entry_pdf_rejects_mismatched_outcome() {
        let mut archive = Archive::new();
        let input = CableSizingInput {
            load: LoadSpec::Current { amps: 16.0 },
            length_m: 50.0,
            ..CableSizingInput::default()
        };
        let drop = check_voltage_drop(
            &VoltageDropInput {
                label: String::new(),
                voltage_v: 230.0,
                phase: PhaseSystem::SinglePhase,
                current_a: 16.0,
                length_m: 50.0,
                material: Material::Copper,
                section_mm2: 4.0,
                power_factor: 0.9,
                parallel_runs: 1,
                max_voltage_drop_percent: None,
            },
            reference_database().unwrap(),
        )
        .unwrap();
        archive.save("Broken", CalculationItem::CableSizing(input), CalculationOutcome::VoltageDrop(drop));
        let err = render_entry_pdf(&archive.entries[0]).unwrap_err();
        assert!(matches!(err, CalcError::Internal { .. }));
    }
}
