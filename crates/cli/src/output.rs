//! Output formatting for CLI

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};
use serde::Serialize;

/// Output format
#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
    /// Plain text format
    Plain,
}

/// Trait for items that can be displayed in a table
pub trait TableDisplay {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;

    /// Colour for the row's status cell, if it has one
    fn status(&self) -> Option<(usize, Color)> {
        None
    }
}

/// Render items as a table
pub fn table<T: TableDisplay>(items: &[T]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(T::headers());
    for item in items {
        let status = item.status();
        let cells = item.row().into_iter().enumerate().map(|(i, value)| match status {
            Some((column, color)) if column == i => Cell::new(value).fg(color),
            _ => Cell::new(value),
        });
        table.add_row(cells);
    }
    table
}

/// Print a list of items
pub fn print_list<T: Serialize + TableDisplay>(items: &[T], format: OutputFormat) {
    if items.is_empty() && format != OutputFormat::Json {
        println!("No items found.");
        return;
    }

    match format {
        OutputFormat::Table => println!("{}", table(items)),
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(items).unwrap_or_default());
        }
        OutputFormat::Yaml => {
            println!("{}", serde_yaml::to_string(items).unwrap_or_default());
        }
        OutputFormat::Plain => {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    println!("---");
                }
                let row = item.row();
                for (header, value) in T::headers().iter().zip(row.iter()) {
                    println!("{}: {}", header, value);
                }
            }
        }
    }
}

/// Print success message
pub fn print_success(message: &str) {
    println!("✅ {}", message);
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("❌ {}", message);
}

/// Print warning message
pub fn print_warning(message: &str) {
    println!("⚠️  {}", message);
}

/// Print info message
pub fn print_info(message: &str) {
    println!("ℹ️  {}", message);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Row {
        name: &'static str,
        ok: bool,
    }

    impl TableDisplay for Row {
        fn headers() -> Vec<&'static str> {
            vec!["Name", "Status"]
        }

        fn row(&self) -> Vec<String> {
            vec![self.name.to_string(), if self.ok { "ok" } else { "failed" }.to_string()]
        }

        fn status(&self) -> Option<(usize, Color)> {
            Some((1, if self.ok { Color::Green } else { Color::Red }))
        }
    }

    #[test]
    fn test_table_contains_rows() {
        let rendered = table(&[
            Row { name: "login", ok: true },
            Row { name: "add todo", ok: false },
        ])
        .to_string();
        assert!(rendered.contains("Name"));
        assert!(rendered.contains("login"));
        assert!(rendered.contains("add todo"));
        assert!(rendered.contains("failed"));
    }
}
