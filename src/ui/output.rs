use crate::import::{ImportReport, ImportWarning};
use crate::ui::{theme, Icons};
use owo_colors::OwoColorize;

pub fn header(text: &str) {
    println!("{} {}", Icons::BOOK, text.style(theme().header.clone()));
}

pub fn success(label: &str) {
    println!("{} {}", Icons::CHECK, label.style(theme().success.clone()));
}

pub fn error(label: &str) {
    eprintln!("{} {}", Icons::CROSS, label.style(theme().error.clone()));
}

pub fn warn(label: &str) {
    eprintln!("{} {}", Icons::WARN, label.style(theme().warn.clone()));
}

pub fn info(label: &str, value: &str) {
    println!(
        "{} {}: {}",
        Icons::INFO.style(theme().info.clone()),
        label.style(theme().dim.clone()),
        value
    );
}

pub fn section(title: &str) {
    println!();
    println!("━{}━", title.style(theme().header.clone()));
}

pub fn dim(text: &str) -> String {
    text.style(theme().dim.clone()).to_string()
}

pub fn muted(text: &str) -> String {
    text.style(theme().muted.clone()).to_string()
}

pub fn timing(elapsed: &str) {
    println!("{} {}", Icons::CLOCK.style(theme().dim.clone()), elapsed);
}

pub fn summary_row(label: &str, value: &str) {
    println!("  {} {}", label.style(theme().dim.clone()), value);
}

/// One line per imported file
pub fn import_report(report: &ImportReport) {
    let name = report
        .source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| report.source.display().to_string());
    let icon = if report.has_warnings() { Icons::WARN } else { Icons::FILE };
    println!(
        "{} {} {} {}",
        icon,
        name.style(theme().key.clone()),
        report.summary(),
        muted(&format!(
            "({} inserted, {} skipped, {} warning(s))",
            report.inserted,
            report.skipped,
            report.warnings.len()
        ))
    );
}

/// Print at most `max` warnings, then how many were left out
pub fn warning_list(warnings: &[ImportWarning], max: usize) {
    if warnings.is_empty() {
        return;
    }
    warn(&format!(
        "{} warning(s) reported, {} first below:",
        warnings.len(),
        max.min(warnings.len())
    ));
    for warning in warnings.iter().take(max) {
        eprintln!("  {}", dim(&warning.to_string()));
    }
    if warnings.len() > max {
        eprintln!("  {}", muted(&format!("... {} more", warnings.len() - max)));
    }
}
