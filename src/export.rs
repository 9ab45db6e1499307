//! Export of the current table view.
//!
//! CSV and HTML are built from the same text extraction: column titles and
//! cell contents are flattened to plain text. "PDF" is the HTML document with
//! a print call that runs once the viewer has loaded it, "XLSX" is the HTML
//! document saved under a spreadsheet MIME type. Neither produces a binary
//! format.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use derive_setters::Setters;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::domain::TableError;
use crate::prefs::sanitize_title;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
    Html,
    Pdf,
    Xlsx,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 5] = [
        ExportFormat::Csv,
        ExportFormat::Json,
        ExportFormat::Html,
        ExportFormat::Pdf,
        ExportFormat::Xlsx,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "CSV",
            ExportFormat::Json => "JSON",
            ExportFormat::Html => "HTML",
            ExportFormat::Pdf => "PDF (print)",
            ExportFormat::Xlsx => "Excel",
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv;charset=utf-8",
            ExportFormat::Json => "application/json",
            ExportFormat::Html | ExportFormat::Pdf => "text/html;charset=utf-8",
            ExportFormat::Xlsx => "application/vnd.ms-excel",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
            ExportFormat::Html | ExportFormat::Pdf => "html",
            ExportFormat::Xlsx => "xls",
        }
    }
}

/// Plain-text snapshot of the rows and columns being exported.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExportView {
    pub title: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Branding printed in the HTML header and footer.
#[derive(Debug, Clone, PartialEq, Setters)]
#[setters(prefix = "with_", strip_option)]
pub struct ExportBrand {
    pub name: String,
    pub logo_url: Option<String>,
    pub tagline: Option<String>,
    pub footer: Option<String>,
    /// CSS color of the header rule and table head.
    pub accent: String,
}

impl Default for ExportBrand {
    fn default() -> Self {
        Self {
            name: "Fleet Control".to_string(),
            logo_url: None,
            tagline: Some("Vehicle & administration dashboard".to_string()),
            footer: Some("Generated by Fleet Control. Confidential.".to_string()),
            accent: "#1f4e79".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageLayout {
    pub landscape: bool,
    pub font_scale: f32,
}

/// Wide tables print landscape and shrink their font.
pub fn page_layout(visible_columns: usize) -> PageLayout {
    let font_scale = if visible_columns >= 9 {
        0.85
    } else if visible_columns >= 7 {
        0.92
    } else {
        1.0
    };
    PageLayout {
        landscape: visible_columns > 5,
        font_scale,
    }
}

fn csv_field(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

/// Every field quoted, fields joined by `,`, rows by `\n`.
pub fn to_csv(view: &ExportView) -> String {
    std::iter::once(&view.columns)
        .chain(view.rows.iter())
        .map(|row| row.iter().map(|v| csv_field(v)).collect::<Vec<_>>().join(","))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Two-space indented JSON.
pub fn to_json<S: Serialize + ?Sized>(rows: &S) -> Result<String, TableError> {
    Ok(serde_json::to_string_pretty(rows)?)
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Self contained HTML document with inline styles.
pub fn to_html(view: &ExportView, brand: Option<&ExportBrand>, generated_at: NaiveDateTime) -> String {
    let layout = page_layout(view.columns.len());
    let accent = brand.map(|b| b.accent.as_str()).unwrap_or("#333333");
    let generated = generated_at.format("%Y-%m-%d %H:%M").to_string();
    let mut html = String::new();

    // Writing into a String cannot fail.
    let _ = write!(
        html,
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n<style>\n\
         @page {{ size: A4 {orientation}; margin: 12mm; }}\n\
         body {{ font-family: Helvetica, Arial, sans-serif; font-size: {font:.2}em; color: #222; margin: 0; }}\n\
         header {{ display: flex; align-items: center; gap: 12px; border-bottom: 3px solid {accent}; padding-bottom: 8px; margin-bottom: 12px; }}\n\
         header img {{ height: 40px; }}\n\
         header .meta {{ margin-left: auto; text-align: right; color: #666; font-size: 0.85em; }}\n\
         table {{ width: 100%; border-collapse: collapse; }}\n\
         th {{ background: {accent}; color: #fff; text-align: left; padding: 6px 8px; }}\n\
         td {{ border-bottom: 1px solid #ddd; padding: 5px 8px; vertical-align: top; }}\n\
         tr:nth-child(even) td {{ background: #f6f8fa; }}\n\
         footer {{ margin-top: 16px; color: #888; font-size: 0.8em; text-align: center; }}\n\
         </style>\n</head>\n<body>\n",
        title = escape_html(&view.title),
        orientation = if layout.landscape { "landscape" } else { "portrait" },
        font = layout.font_scale,
    );

    if let Some(brand) = brand {
        html.push_str("<header>\n");
        if let Some(logo) = &brand.logo_url {
            let _ = writeln!(html, "<img src=\"{}\" alt=\"logo\">", escape_html(logo));
        }
        let _ = write!(html, "<div><strong>{}</strong>", escape_html(&brand.name));
        if let Some(tagline) = &brand.tagline {
            let _ = write!(html, "<br><small>{}</small>", escape_html(tagline));
        }
        let _ = writeln!(
            html,
            "</div>\n<div class=\"meta\">{}<br>Generated {}</div>\n</header>",
            escape_html(&view.title),
            generated
        );
    } else {
        let _ = writeln!(html, "<h2>{}</h2>", escape_html(&view.title));
    }

    html.push_str("<table>\n<thead><tr>");
    for column in &view.columns {
        let _ = write!(html, "<th>{}</th>", escape_html(column));
    }
    html.push_str("</tr></thead>\n<tbody>\n");
    for row in &view.rows {
        html.push_str("<tr>");
        for cell in row {
            let _ = write!(html, "<td>{}</td>", escape_html(cell));
        }
        html.push_str("</tr>\n");
    }
    html.push_str("</tbody>\n</table>\n");

    if let Some(footer) = brand.and_then(|b| b.footer.as_ref()) {
        let _ = writeln!(
            html,
            "<footer>{} · {} rows</footer>",
            escape_html(footer),
            view.rows.len()
        );
    }
    html.push_str("</body>\n</html>\n");
    html
}

/// HTML document that opens the print dialog once loaded.
pub fn to_print_html(view: &ExportView, brand: Option<&ExportBrand>, generated_at: NaiveDateTime) -> String {
    to_html(view, brand, generated_at).replacen(
        "</body>",
        "<script>window.onload = function () { window.focus(); window.print(); };</script>\n</body>",
        1,
    )
}

/// Finished export, ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportDocument {
    pub format: ExportFormat,
    pub file_name: String,
    pub mime: &'static str,
    pub body: String,
}

impl ExportDocument {
    pub fn new(title: &str, format: ExportFormat, body: String, generated_at: NaiveDateTime) -> Self {
        let stem = sanitize_title(title);
        let stem = stem.trim_matches('_');
        let stem = if stem.is_empty() { "export" } else { stem };
        Self {
            format,
            file_name: format!(
                "{stem}_{}.{}",
                generated_at.format("%Y%m%d-%H%M%S"),
                format.extension()
            ),
            mime: format.mime(),
            body,
        }
    }

    /// Builds the document for any format but JSON, which needs the typed
    /// rows and is produced by [`to_json`].
    pub fn from_view(
        view: &ExportView,
        format: ExportFormat,
        brand: Option<&ExportBrand>,
        generated_at: NaiveDateTime,
    ) -> Result<Self, TableError> {
        let body = match format {
            ExportFormat::Csv => to_csv(view),
            ExportFormat::Html | ExportFormat::Xlsx => to_html(view, brand, generated_at),
            ExportFormat::Pdf => to_print_html(view, brand, generated_at),
            ExportFormat::Json => {
                return Err(TableError::Export(
                    "json export needs the typed rows".to_string(),
                ));
            }
        };
        Ok(Self::new(&view.title, format, body, generated_at))
    }

    /// Writes the document into `dir`, creating it if needed.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf, TableError> {
        fs::create_dir_all(dir)?;
        let path = dir.join(&self.file_name);
        fs::write(&path, &self.body)?;
        info!("Exported {} ({}) to {}", self.file_name, self.mime, path.display());
        Ok(path)
    }
}

/// Hands the document to the desktop's default viewer. A missing viewer is
/// not an error the user hears about.
pub fn open_for_print(path: &Path) {
    match open::that_detached(path) {
        Ok(()) => debug!("Opened {} for printing", path.display()),
        Err(e) => warn!("Could not open {} for printing: {e}", path.display()),
    }
}
