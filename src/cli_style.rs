/*!
 * CLI style system
 *
 * Themed text, tables and status lines for the `dp2` command output.
 */

use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};
use console::{style, StyledObject};
use dp2_core_interface::{Job, JobStatus, Message, MessageLevel, QueueEntry, Script};

// ============================================================================
// THEME COLORS
// ============================================================================

pub struct Theme;

impl Theme {
    pub fn primary<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).cyan()
    }

    pub fn success<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).green()
    }

    pub fn warning<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).yellow()
    }

    pub fn error<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).red()
    }

    /// Muted/secondary text (dim)
    pub fn muted<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).dim()
    }

    /// Header style (bold cyan)
    pub fn header<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).cyan().bold()
    }
}

// ============================================================================
// ICONS
// ============================================================================

pub struct Icons;

impl Icons {
    pub const SUCCESS: &'static str = "✓";
    pub const ERROR: &'static str = "✗";
    pub const WARNING: &'static str = "⚠";
    pub const INFO: &'static str = "ℹ";
    pub const PENDING: &'static str = "○";
    pub const RUNNING: &'static str = "◐";
    pub const ARROW_RIGHT: &'static str = "→";
}

/// Icon and colour for a job status
fn status_cell(status: JobStatus) -> Cell {
    let (icon, color) = match status {
        JobStatus::Idle => (Icons::PENDING, Color::DarkGrey),
        JobStatus::Running => (Icons::RUNNING, Color::Cyan),
        JobStatus::Done => (Icons::SUCCESS, Color::Green),
        JobStatus::Error => (Icons::ERROR, Color::Red),
    };
    Cell::new(format!("{} {}", icon, status)).fg(color)
}

fn header_cell(title: &str) -> Cell {
    Cell::new(title)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

// ============================================================================
// TABLES
// ============================================================================

/// Create a styled data table
pub fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Create a minimal table (no outer borders)
pub fn create_minimal_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_NO_BORDERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

pub fn jobs_table(jobs: &[Job]) -> Table {
    let mut table = create_table();
    table.set_header(vec![
        header_cell("Job Id"),
        header_cell("Nicename"),
        header_cell("Status"),
        header_cell("Priority"),
    ]);

    for job in jobs {
        table.add_row(vec![
            Cell::new(&job.id),
            Cell::new(&job.nicename),
            status_cell(job.status),
            Cell::new(job.priority),
        ]);
    }
    table
}

/// Key-value summary of a single job
pub fn job_table(job: &Job) -> Table {
    let mut table = create_minimal_table();
    let rows = [
        ("Job Id", Cell::new(&job.id)),
        ("Nicename", Cell::new(&job.nicename)),
        ("Status", status_cell(job.status)),
        ("Priority", Cell::new(job.priority)),
    ];
    for (key, value) in rows {
        table.add_row(vec![Cell::new(key).fg(Color::Cyan), value]);
    }
    table
}

pub fn queue_table(queue: &[QueueEntry]) -> Table {
    let mut table = create_table();
    table.set_header(vec![
        header_cell("Job Id"),
        header_cell("Priority"),
        header_cell("Job Priority"),
        header_cell("Client Priority"),
        header_cell("Rel. Time"),
        header_cell("Since"),
    ]);

    for entry in queue {
        let since = entry
            .since()
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();
        table.add_row(vec![
            Cell::new(&entry.id),
            Cell::new(format!("{:.2}", entry.computed_priority)),
            Cell::new(entry.job_priority),
            Cell::new(entry.client_priority),
            Cell::new(format!("{:.2}", entry.relative_time)),
            Cell::new(since).fg(Color::DarkGrey),
        ]);
    }
    table
}

pub fn scripts_table(scripts: &[Script]) -> Table {
    let mut table = create_table();
    table.set_header(vec![
        header_cell("Script"),
        header_cell("Inputs"),
        header_cell("Options"),
        header_cell("Description"),
    ]);

    for script in scripts {
        let slots = |slots: &[dp2_core_interface::Slot]| {
            slots
                .iter()
                .map(|s| if s.sequence { format!("{}…", s.name) } else { s.name.clone() })
                .collect::<Vec<_>>()
                .join(", ")
        };
        table.add_row(vec![
            Cell::new(&script.id).add_attribute(Attribute::Bold),
            Cell::new(slots(&script.inputs)),
            Cell::new(slots(&script.options)),
            Cell::new(&script.description).fg(Color::DarkGrey),
        ]);
    }
    table
}

// ============================================================================
// MESSAGES
// ============================================================================

/// One job message as a single styled line
pub fn format_message(message: &Message) -> String {
    let level = format!("[{}]", message.level);
    let level = match message.level {
        MessageLevel::Error => Theme::error(level).to_string(),
        MessageLevel::Warning => Theme::warning(level).to_string(),
        MessageLevel::Info => Theme::primary(level).to_string(),
        MessageLevel::Debug | MessageLevel::Trace => Theme::muted(level).to_string(),
    };
    format!(
        "{} {} {}",
        Theme::muted(format!("({})", message.sequence)),
        level,
        message.content
    )
}

/// Print a styled error message with optional suggestion
pub fn print_error(message: &str, suggestion: Option<&str>) {
    eprintln!(
        "\n{} {}",
        Theme::error(format!("{} Error:", Icons::ERROR)),
        message
    );

    if let Some(hint) = suggestion {
        eprintln!(
            "  {} {}",
            Theme::muted(Icons::ARROW_RIGHT),
            Theme::muted(hint)
        );
    }
    eprintln!();
}

pub fn print_warning(message: &str) {
    eprintln!(
        "{} {}",
        Theme::warning(Icons::WARNING.to_string()),
        Theme::warning(message)
    );
}

pub fn print_success(message: &str) {
    println!(
        "{} {}",
        Theme::success(Icons::SUCCESS.to_string()),
        Theme::success(message)
    );
}

pub fn print_info(message: &str) {
    println!("{} {}", Theme::primary(Icons::INFO.to_string()), message);
}
