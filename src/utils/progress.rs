//! Progress indicators built on indicatif

use indicatif::{ProgressBar, ProgressStyle};

/// Spinner for steps with no known length (loading, preprocessing)
pub fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("    {spinner:.cyan} {msg}")
            .unwrap()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Bar that advances once per unit of work, labelled with `unit`
/// (e.g. "models", "combinations")
pub fn create_progress_bar(len: u64, unit: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    let template = format!(
        "    {{msg}} [{{bar:40.cyan/blue}}] {{pos}}/{{len}} {} ({{eta}})",
        unit
    );
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&template)
            .unwrap()
            .progress_chars("=>-"),
    );
    pb
}

/// Hidden bar for library callers that don't want terminal output
pub fn hidden_progress_bar() -> ProgressBar {
    ProgressBar::hidden()
}

pub fn finish_with_success(pb: &ProgressBar, message: &str) {
    pb.finish_with_message(format!("✅ {}", message));
}

pub fn finish_with_warning(pb: &ProgressBar, message: &str) {
    pb.finish_with_message(format!("⚠️  {}", message));
}
