//! Output formatting for CLI commands

use chrono::{DateTime, Utc};
use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, Color, ContentArrangement, Table};
use dyntables_schema::{ConsistencyReport, FieldDef, TableSchemaRecord};
use serde::Serialize;

/// Build a table with the standard preset and a cyan header row
pub fn build_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic);

    let header_cells: Vec<Cell> = headers
        .iter()
        .map(|h| Cell::new(h).fg(Color::Cyan))
        .collect();
    table.set_header(header_cells);
    table
}

/// Print a value as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Ordered field list, with the implicit primary key shown first.
pub fn fields_table(fields: &[FieldDef]) -> Table {
    let mut table = build_table(&["#", "FIELD", "TYPE", "COLUMN TYPE"]);
    table.add_row(vec![
        Cell::new("-"),
        Cell::new("id").fg(Color::DarkGrey),
        Cell::new("(primary key)").fg(Color::DarkGrey),
        Cell::new("INTEGER").fg(Color::DarkGrey),
    ]);
    for (i, field) in fields.iter().enumerate() {
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(&field.name),
            Cell::new(field.field_type.as_str()),
            Cell::new(field.field_type.physical_type()),
        ]);
    }
    table
}

/// One catalog record: a summary line plus its fields.
pub fn print_record(record: &TableSchemaRecord) {
    println!(
        "Table '{}' (id {}), {} field(s), updated {}",
        record.table_name,
        record.id,
        record.fields.len(),
        format_timestamp(&record.updated_at)
    );
    println!("{}", fields_table(&record.fields));
}

pub fn print_records(records: &[TableSchemaRecord]) {
    if records.is_empty() {
        println!("No managed tables.");
        return;
    }

    let mut table = build_table(&["ID", "TABLE", "FIELDS", "CREATED", "UPDATED"]);
    for record in records {
        let names: Vec<&str> = record.fields.iter().map(|f| f.name.as_str()).collect();
        table.add_row(vec![
            Cell::new(record.id),
            Cell::new(&record.table_name),
            Cell::new(names.join(", ")),
            Cell::new(format_timestamp(&record.created_at)),
            Cell::new(format_timestamp(&record.updated_at)),
        ]);
    }
    println!("{}", table);
    println!("{} table(s)", records.len());
}

pub fn print_consistency(report: &ConsistencyReport) {
    if report.is_consistent() {
        println!(
            "Table '{}' (id {}) matches its catalog record.",
            report.table_name, report.id
        );
        return;
    }

    println!(
        "Table '{}' (id {}) differs from its catalog record:",
        report.table_name, report.id
    );
    if !report.table_exists {
        println!("  live table is missing");
        return;
    }

    let mut table = build_table(&["COLUMN", "PROBLEM", "CATALOG", "LIVE"]);
    for column in &report.missing_columns {
        table.add_row(vec![
            Cell::new(column),
            Cell::new("missing from live table").fg(Color::Red),
            Cell::new("present"),
            Cell::new("-"),
        ]);
    }
    for column in &report.extra_columns {
        table.add_row(vec![
            Cell::new(column),
            Cell::new("not in catalog").fg(Color::Yellow),
            Cell::new("-"),
            Cell::new("present"),
        ]);
    }
    for mismatch in &report.type_mismatches {
        table.add_row(vec![
            Cell::new(&mismatch.column),
            Cell::new("type differs").fg(Color::Yellow),
            Cell::new(&mismatch.expected),
            Cell::new(&mismatch.actual),
        ]);
    }
    println!("{}", table);
}

#[cfg(test)]
mod tests {
    use super::*;
    use dyntables_schema::FieldType;

    #[test]
    fn test_fields_table_lists_primary_key_then_fields_in_order() {
        let rendered = fields_table(&[
            FieldDef::new("email", FieldType::String),
            FieldDef::new("active", FieldType::Boolean),
        ])
        .to_string();

        let id = rendered.find("(primary key)").unwrap();
        let email = rendered.find("email").unwrap();
        let active = rendered.find("active").unwrap();
        assert!(id < email && email < active);
        assert!(rendered.contains("varchar(255)"));
    }

    #[test]
    fn test_format_timestamp() {
        let ts = DateTime::parse_from_rfc3339("2024-03-01T12:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(format_timestamp(&ts), "2024-03-01 12:30:00");
    }
}
