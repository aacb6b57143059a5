//! Output formatter
//!
//! Every command prints through a [`Formatter`]. In JSON mode stdout
//! carries exactly one JSON document and nothing is colored; errors go to
//! stderr in every mode, as JSON when `--json` is set.

use std::io::Write;

use comfy_table::{ContentArrangement, Table, presets};
use console::Style;
use jiff::Timestamp;
use serde::Serialize;

use super::OutputConfig;

/// What a piece of human output denotes; each tone has its own color
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    /// Resource identities: bucket names, instance ids
    Name,
    /// Object keys and names
    Key,
    /// Lifecycle states such as `running` or `available`
    State,
    Success,
    Failure,
    Caution,
}

impl Tone {
    fn style(self) -> Style {
        match self {
            Tone::Name => Style::new().bold(),
            Tone::Key => Style::new().cyan(),
            Tone::State => Style::new().magenta(),
            Tone::Success => Style::new().green(),
            Tone::Failure => Style::new().red().bold(),
            Tone::Caution => Style::new().yellow(),
        }
    }
}

/// Binary-unit size, e.g. `1.50 KiB`
pub fn format_size(bytes: i64) -> String {
    humansize::format_size(bytes.max(0) as u64, humansize::BINARY)
}

/// Second-precision UTC time, or `-` when unknown
pub fn format_time(time: Option<Timestamp>) -> String {
    time.map(|t| t.strftime("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}

#[derive(Debug, Clone, Default)]
pub struct Formatter {
    config: OutputConfig,
}

impl Formatter {
    pub fn new(config: OutputConfig) -> Self {
        Self { config }
    }

    pub fn is_json(&self) -> bool {
        self.config.json
    }

    pub fn colors_enabled(&self) -> bool {
        !(self.config.no_color || self.config.json)
    }

    /// `text` in the color of `tone`, or unchanged without colors
    pub fn paint(&self, tone: Tone, text: &str) -> String {
        if self.colors_enabled() {
            tone.style().force_styling(true).apply_to(text).to_string()
        } else {
            text.to_string()
        }
    }

    pub fn style_name(&self, text: &str) -> String {
        self.paint(Tone::Name, text)
    }

    pub fn style_key(&self, text: &str) -> String {
        self.paint(Tone::Key, text)
    }

    pub fn style_state(&self, text: &str) -> String {
        self.paint(Tone::State, text)
    }

    /// Write `value` to stdout as pretty JSON
    pub fn json<T: Serialize>(&self, value: &T) {
        let mut stdout = std::io::stdout().lock();
        let written = serde_json::to_writer_pretty(&mut stdout, value)
            .map_err(std::io::Error::from)
            .and_then(|()| writeln!(stdout));
        if let Err(e) = written {
            tracing::error!(error = %e, "Failed to write JSON output");
        }
    }

    /// Human-only status line; silent in quiet and JSON modes
    fn notice(&self, tone: Tone, icon: &str, message: &str, to_stderr: bool) {
        if self.config.quiet || self.config.json {
            return;
        }
        let line = format!("{} {message}", self.paint(tone, icon));
        if to_stderr {
            eprintln!("{line}");
        } else {
            println!("{line}");
        }
    }

    pub fn success(&self, message: &str) {
        self.notice(Tone::Success, "✓", message, false);
    }

    pub fn warning(&self, message: &str) {
        self.notice(Tone::Caution, "!", message, true);
    }

    /// Report a failure; printed even in quiet mode
    pub fn error(&self, message: &str) {
        if !self.config.json {
            eprintln!("{} {message}", self.paint(Tone::Failure, "error:"));
            return;
        }
        match serde_json::to_string_pretty(&serde_json::json!({ "error": message })) {
            Ok(json) => eprintln!("{json}"),
            Err(_) => eprintln!("{message}"),
        }
    }

    pub fn println(&self, message: &str) {
        if !self.config.quiet {
            println!("{message}");
        }
    }

    /// Rows under `headers` as a borderless table
    pub fn render_table(&self, headers: &[&str], rows: Vec<Vec<String>>) -> String {
        let mut table = Table::new();
        table
            .load_preset(presets::NOTHING)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(headers.to_vec())
            .add_rows(rows);
        if !self.colors_enabled() {
            table.force_no_tty();
        }
        table.to_string()
    }

    /// Print a table, or `(none)` when there is nothing to show
    pub fn table(&self, headers: &[&str], rows: Vec<Vec<String>>) {
        if self.config.quiet {
            return;
        }
        if rows.is_empty() {
            println!("(none)");
        } else {
            println!("{}", self.render_table(headers, rows));
        }
    }
}
