use crate::category::Market;
use crate::error::ExportResult;
use crate::filter::View;
use crate::types::{Align, CrossTab, DossierContent};
use serde::Serialize;
use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tabled::builder::Builder;
use tabled::settings::object::Columns;
use tabled::settings::{Alignment, Modify, Style};
use tabled::{Table, Tabled};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> ExportResult<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> ExportResult<()> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    Ok(())
}

/// Write the filtered view unranked: the source header row, then each
/// entity's source row as read. Short rows are padded to the header width.
pub fn write_view_csv<W: Write>(
    mut writer: W,
    headers: &[String],
    view: &View<'_>,
    bom: bool,
) -> ExportResult<()> {
    if bom {
        writer.write_all(UTF8_BOM)?;
    }
    let mut wtr = csv::WriterBuilder::new().flexible(true).from_writer(writer);
    if !headers.is_empty() {
        wtr.write_record(headers)?;
    }
    for e in view.iter() {
        let width = headers.len().max(e.source.len());
        let row = e
            .source
            .iter()
            .map(String::as_str)
            .chain(std::iter::repeat(""))
            .take(width);
        wtr.write_record(row)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn export_view(path: &Path, headers: &[String], view: &View<'_>, market: Market) -> ExportResult<()> {
    let file = BufWriter::new(File::create(path)?);
    write_view_csv(file, headers, view, market.export_with_bom())
}

/// Markdown table of the first `max_rows` rows, or a "(no rows)" marker.
pub fn render_table<T>(rows: &[T], max_rows: usize) -> String
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().take(max_rows).cloned().collect();
    if slice.is_empty() {
        return "(no rows)".to_string();
    }
    Table::new(slice).with(Style::markdown()).to_string()
}

pub fn preview_table<T>(title: &str, note: Option<&str>, rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    println!("\n{}", title);
    if let Some(n) = note {
        println!("({})", n);
    }
    println!();
    println!("{}\n", render_table(rows, max_rows));
}

pub fn render_cross_tab(tab: &CrossTab) -> String {
    if tab.is_empty() {
        return "(no rows)".to_string();
    }
    let mut builder = Builder::default();
    let mut header = vec![tab.geo_key.to_string()];
    header.extend(tab.columns.iter().cloned());
    header.push("Total".to_string());
    builder.push_record(header);
    for row in &tab.rows {
        let mut record = vec![row.unit.label().to_string()];
        record.extend(row.counts.iter().map(|c| c.to_string()));
        record.push(row.total.to_string());
        builder.push_record(record);
    }
    builder.build().with(Style::markdown()).to_string()
}

/// Plain-text rendition of the dossier layout.
pub fn render_dossier(content: &DossierContent) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# {}", content.title);
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", content.subtitle);
    let _ = writeln!(out);
    let _ = writeln!(out, "## {}", content.section_heading);
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", content.summary_text);
    let _ = writeln!(out);

    if content.ranked_rows.is_empty() {
        let _ = writeln!(out, "{}", content.empty_message);
        return out;
    }

    let mut builder = Builder::default();
    builder.push_record(content.columns.iter().map(|c| c.header.clone()));
    for row in &content.ranked_rows {
        builder.push_record(row.cells().iter().map(|c| c.to_string()));
    }
    let mut table = builder.build();
    table.with(Style::markdown());
    for (i, column) in content.columns.iter().enumerate() {
        let alignment = match column.align {
            Align::Left => Alignment::left(),
            Align::Center => Alignment::center(),
            Align::Right => Alignment::right(),
        };
        table.with(Modify::new(Columns::single(i)).with(alignment));
    }
    let _ = writeln!(out, "{}", table);
    out
}

pub fn write_dossier(path: &Path, content: &DossierContent) -> ExportResult<()> {
    std::fs::write(path, render_dossier(content))?;
    Ok(())
}
