//! Terminal styling utilities

use vidya_catalog::models::{Severity, Status};

pub fn style_cyan(s: &str) -> String {
    format!("\x1b[36m{}\x1b[0m", s)
}

pub fn style_green(s: &str) -> String {
    format!("\x1b[32m{}\x1b[0m", s)
}

pub fn style_red(s: &str) -> String {
    format!("\x1b[31m{}\x1b[0m", s)
}

pub fn style_yellow(s: &str) -> String {
    format!("\x1b[33m{}\x1b[0m", s)
}

pub fn style_dim(s: &str) -> String {
    format!("\x1b[2m{}\x1b[0m", s)
}

pub fn style_bold(s: &str) -> String {
    format!("\x1b[1m{}\x1b[0m", s)
}

pub fn print_success(msg: &str) {
    println!("{} {}", style_green("✓"), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", style_red("✗"), msg);
}

pub fn print_warning(msg: &str) {
    println!("{} {}", style_yellow("⚠"), msg);
}

pub fn print_info(msg: &str) {
    println!("{} {}", style_cyan("ℹ"), msg);
}

/// Header underlined to the title's display width
pub fn print_header(title: &str) {
    println!();
    println!("{}", style_bold(title));
    println!("{}", "─".repeat(title.chars().count()));
}

/// Severity label padded to a fixed column, colored by rank
pub fn style_severity(severity: Severity) -> String {
    let label = format!("{:<8}", severity.to_string());
    match severity {
        Severity::Critical => style_red(&label),
        Severity::High => style_yellow(&label),
        Severity::Medium => style_cyan(&label),
        Severity::Low => style_dim(&label),
    }
}

pub fn style_status(status: Status) -> String {
    let label = status.to_string();
    match status {
        Status::Approved => style_green(&label),
        Status::Rejected => style_red(&label),
        Status::Pending => style_yellow(&label),
    }
}
