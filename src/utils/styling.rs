//! Terminal styling for step headers, banners and the configuration card

use console::{style, Emoji};
use std::path::Path;
use std::time::Duration;

use crate::cli::BenchConfig;

pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "[*] ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "[!] ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", ">> ");
pub static FOLDER: Emoji<'_, '_> = Emoji("📂 ", "");
pub static TARGET: Emoji<'_, '_> = Emoji("🎯 ", "");
pub static GEAR: Emoji<'_, '_> = Emoji("🔧 ", "");
pub static DICE: Emoji<'_, '_> = Emoji("🎲 ", "");

pub fn print_banner(version: &str) {
    println!();
    println!(
        "    {} {}",
        style("respbench").cyan().bold(),
        style(format!("v{}", version)).dim()
    );
    println!(
        "    {}",
        style("Cross-validated classifier bench for response data").dim()
    );
    println!("    {}", style("━".repeat(50)).dim());
    println!();
}

/// Print the resolved run configuration as a boxed card
pub fn print_config(config: &BenchConfig) {
    let box_width = 56;
    let line = "─".repeat(box_width - 2);

    let scaling = match (config.preprocess.scale, config.preprocess.scaler) {
        (true, Some(kind)) => kind.to_string(),
        (true, None) => "missing".to_string(),
        (false, _) => "none".to_string(),
    };

    println!("    ┌{}┐", line);
    println!("    │ {:<width$}│", style("Configuration").cyan().bold(), width = box_width - 3);
    println!("    ├{}┤", line);
    println!("    │  {}Input:   {:<40}│", FOLDER, truncate_path(&config.input, 40));
    println!("    │  {}Target:  {:<40}│", TARGET, truncate_string(&config.preprocess.target, 40));
    println!("    ├{}┤", line);
    println!(
        "    │  {}Encoding: {:<12} Scaling: {:<15}│",
        GEAR,
        config.preprocess.encoding.to_string(),
        scaling
    );
    println!(
        "    │  {}Folds: {:<4} Test fraction: {:<5} Seed: {:<6}│",
        DICE, config.folds, config.test_fraction, config.seed
    );
    println!("    └{}┘", line);
    println!();
}

pub fn print_step_header(step_num: u8, title: &str) {
    println!();
    println!(
        "    {} {} {}",
        style(format!("STEP {}", step_num)).cyan().bold(),
        style("│").dim(),
        style(title).white().bold()
    );
    println!("    {}", style("─".repeat(50)).dim());
}

pub fn print_success(message: &str) {
    println!("    {} {}", style("✓").green().bold(), style(message).green());
}

pub fn print_info(message: &str) {
    println!("    {}{}", INFO, message);
}

pub fn print_warning(message: &str) {
    println!("    {}{}", WARN, style(message).yellow());
}

pub fn print_step_time(elapsed: Duration) {
    println!("      {}", style(format!("({:.2?})", elapsed)).dim());
}

/// Print a labelled key/value line, e.g. `Rows: 1000`
pub fn print_stat(label: &str, value: impl std::fmt::Display) {
    println!("      {}: {}", label, style(value).yellow());
}

pub fn print_completion() {
    println!();
    println!("    {}{}", ROCKET, style("Bench complete!").green().bold());
    println!();
}

fn truncate_path(path: &Path, max_len: usize) -> String {
    truncate_string(&path.display().to_string(), max_len)
}

fn truncate_string(s: &str, max_len: usize) -> String {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= max_len {
        s.to_string()
    } else {
        let tail: String = chars[chars.len() - (max_len - 3)..].iter().collect();
        format!("...{}", tail)
    }
}
