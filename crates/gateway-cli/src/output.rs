//! CLI output formatting.
//!
//! The JSON envelope mirrors `gateway-server`'s `ErrorBody` shape
//! (`{"error": "...", "status": n}`) rather than a generic
//! `{"success": bool, ...}` wrapper, so scripts that already parse the HTTP
//! API's error bodies can parse the CLI's `--json` output the same way.
//! `table` is a trait method, not a free function, because listing drives,
//! tasks, and audit entries in two aligned columns is the one output shape
//! every multi-row subcommand needs.

/// Output format selector
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Human,
    Json,
}

/// Trait for formatting CLI output
pub trait OutputFormatter {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
    fn warn(&self, message: &str);
    fn info(&self, message: &str);
    fn print_json(&self, value: &serde_json::Value);
    /// Renders a two-column table with a header row.
    fn table(&self, header: (&str, &str), rows: &[(String, String)]);
}

/// Human-readable output formatter with checkmarks and indentation
pub struct HumanFormatter;

const TABLE_COL_WIDTH: usize = 28;

impl OutputFormatter for HumanFormatter {
    fn success(&self, message: &str) {
        println!("\u{2713} {message}");
    }
    fn error(&self, message: &str) {
        eprintln!("\u{2717} Error: {message}");
    }
    fn warn(&self, message: &str) {
        eprintln!("\u{26a0} Warning: {message}");
    }
    fn info(&self, message: &str) {
        println!("  {message}");
    }
    fn print_json(&self, _value: &serde_json::Value) {
        // Human formatter doesn't print JSON
    }
    fn table(&self, header: (&str, &str), rows: &[(String, String)]) {
        println!("  {:<TABLE_COL_WIDTH$} {}", header.0, header.1);
        println!("  {}", "-".repeat(TABLE_COL_WIDTH + 1 + header.1.len().max(10)));
        for (left, right) in rows {
            println!("  {left:<TABLE_COL_WIDTH$} {right}");
        }
    }
}

/// JSON output formatter
///
/// Success/error bodies are `{"ok": bool, ...}` to match the gateway's own
/// vocabulary for a completed operation, and errors carry the same `error`
/// key as the HTTP API's error responses.
pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn success(&self, message: &str) {
        println!("{}", serde_json::json!({"ok": true, "message": message}));
    }
    fn error(&self, message: &str) {
        eprintln!("{}", serde_json::json!({"ok": false, "error": message}));
    }
    fn warn(&self, message: &str) {
        eprintln!("{}", serde_json::json!({"ok": true, "warning": message}));
    }
    fn info(&self, _message: &str) {}
    fn print_json(&self, value: &serde_json::Value) {
        println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
    }
    fn table(&self, header: (&str, &str), rows: &[(String, String)]) {
        let (key_name, value_name) = (header.0, header.1);
        let rows: Vec<_> = rows.iter().map(|(k, v)| serde_json::json!({key_name: k, value_name: v})).collect();
        println!("{}", serde_json::to_string_pretty(&serde_json::Value::Array(rows)).unwrap_or_default());
    }
}

pub fn get_formatter(json: bool) -> Box<dyn OutputFormatter> {
    if json {
        Box::new(JsonFormatter)
    } else {
        Box::new(HumanFormatter)
    }
}
