//! Console tables for bench results

use comfy_table::{presets::UTF8_FULL_CONDENSED, Attribute, Cell, Color, Table};
use console::style;

use super::describe::ColumnSummary;
use crate::evaluation::{
    EarlyStoppingRun, GridSearchResult, ModelScores, SinglePassResult,
};
use crate::pipeline::ClassBalance;

fn print_section(icon: &str, title: &str) {
    println!();
    println!(
        "    {} {}",
        style(icon).cyan(),
        style(title).white().bold()
    );
    println!("    {}", style("─".repeat(50)).dim());
    println!();
}

fn print_indented(table: &Table) {
    for line in table.to_string().lines() {
        println!("    {}", line);
    }
}

fn header(names: &[&str]) -> Vec<Cell> {
    names
        .iter()
        .map(|n| Cell::new(n).add_attribute(Attribute::Bold))
        .collect()
}

fn score_color(score: f64) -> Color {
    if score >= 0.75 {
        Color::Green
    } else if score > 0.55 {
        Color::Yellow
    } else {
        Color::Red
    }
}

/// Per-model cross-validation scores; the best mean is highlighted
pub fn display_scores(title: &str, scores: &[ModelScores]) {
    print_section("📋", title);

    let folds = scores.first().map_or(0, |s| s.cv.scores.len());
    let mut names = vec!["Model".to_string()];
    names.extend((1..=folds).map(|k| format!("Fold {}", k)));
    names.extend(["Mean".to_string(), "Std".to_string()]);

    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(header(&names.iter().map(String::as_str).collect::<Vec<_>>()));

    let best = scores
        .iter()
        .map(|s| s.cv.mean)
        .fold(f64::NEG_INFINITY, f64::max);

    for s in scores {
        let mut row = vec![Cell::new(&s.name)];
        row.extend(s.cv.scores.iter().map(|v| Cell::new(format!("{:.4}", v))));
        let mut mean = Cell::new(format!("{:.4}", s.cv.mean)).fg(score_color(s.cv.mean));
        if s.cv.mean == best {
            mean = mean.add_attribute(Attribute::Bold);
        }
        row.push(mean);
        row.push(Cell::new(format!("{:.4}", s.cv.std)));
        table.add_row(row);
    }

    print_indented(&table);
}

/// Test-split AUC of every model from the single train/evaluate pass
pub fn display_single_pass(results: &[SinglePassResult]) {
    print_section("🎯", "HOLD-OUT EVALUATION");

    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(header(&["Model", "Test AUC"]));
    for r in results {
        table.add_row(vec![
            Cell::new(&r.name),
            Cell::new(format!("{:.4}", r.auc)).fg(score_color(r.auc)),
        ]);
    }
    print_indented(&table);
}

/// Feature importances of one fitted model, largest first
pub fn display_importances(result: &SinglePassResult, limit: usize) {
    let Some(importances) = &result.importances else {
        return;
    };
    print_section("🌲", &format!("FEATURE IMPORTANCE ({})", result.name.to_uppercase()));

    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(header(&["#", "Feature", "Importance"]));
    for (rank, (feature, value)) in importances.iter().take(limit).enumerate() {
        table.add_row(vec![
            Cell::new(rank + 1),
            Cell::new(feature),
            Cell::new(format!("{:.4}", value)),
        ]);
    }
    print_indented(&table);
}

/// Every grid combination with its mean score; the best row is marked
pub fn display_grid(result: &GridSearchResult) {
    print_section(
        "🔍",
        &format!("GRID SEARCH ({}, {} combinations)", result.model, result.points.len()),
    );

    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(header(&["Parameters", "Mean", "Std", ""]));
    for (i, point) in result.points.iter().enumerate() {
        let is_best = i == result.best_index;
        let mut mean = Cell::new(format!("{:.4}", point.cv.mean));
        if is_best {
            mean = mean.fg(Color::Green).add_attribute(Attribute::Bold);
        }
        table.add_row(vec![
            Cell::new(point.describe()),
            mean,
            Cell::new(format!("{:.4}", point.cv.std)),
            Cell::new(if is_best { "★" } else { "" }).fg(Color::Yellow),
        ]);
    }
    print_indented(&table);
}

pub fn display_early_stopping(run: &EarlyStoppingRun) {
    print_section("⏱️", "EARLY STOPPING");

    let stopping = &run.stopping;
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(header(&["Metric", "Value"]));
    table.add_row(vec![Cell::new("Patience (rounds)"), Cell::new(stopping.rounds)]);
    table.add_row(vec![Cell::new("Stopped at round"), Cell::new(stopping.stopped_at)]);
    table.add_row(vec![
        Cell::new("Best iteration"),
        Cell::new(stopping.best_iteration).fg(Color::Green),
    ]);
    table.add_row(vec![
        Cell::new("Best eval log-loss"),
        Cell::new(format!("{:.5}", stopping.best_score)),
    ]);
    table.add_row(vec![
        Cell::new("Eval AUC"),
        Cell::new(format!("{:.4}", run.eval_auc))
            .fg(score_color(run.eval_auc))
            .add_attribute(Attribute::Bold),
    ]);
    print_indented(&table);
}

/// Mean CV score on the base feature set against the engineered set
pub fn display_stage_comparison(base: &[ModelScores], engineered: &[ModelScores]) {
    print_section("🧪", "BASE vs ENGINEERED FEATURES");

    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(header(&["Model", "Base", "Engineered", "Δ"]));
    for b in base {
        let Some(e) = engineered.iter().find(|e| e.kind == b.kind) else {
            continue;
        };
        let delta = e.cv.mean - b.cv.mean;
        table.add_row(vec![
            Cell::new(&b.name),
            Cell::new(format!("{:.4}", b.cv.mean)),
            Cell::new(format!("{:.4}", e.cv.mean)),
            Cell::new(format!("{:+.4}", delta)).fg(if delta > 0.0 {
                Color::Green
            } else if delta < 0.0 {
                Color::Red
            } else {
                Color::White
            }),
        ]);
    }
    print_indented(&table);
}

pub fn display_class_balance(balance: &ClassBalance) {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(header(&["Class", "Rows", "Share"]));
    let total = balance.total().max(1) as f64;
    for (label, count) in [("0", balance.negatives), ("1", balance.positives)] {
        table.add_row(vec![
            Cell::new(label),
            Cell::new(count),
            Cell::new(format!("{:.1}%", count as f64 / total * 100.0)),
        ]);
    }
    print_indented(&table);
}

/// Numeric statistics table followed by level counts of each categorical
/// column
pub fn display_description(summaries: &[ColumnSummary]) {
    let fmt = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |x| format!("{:.3}", x));

    print_section("📊", "NUMERIC COLUMNS");
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(header(&[
        "Column", "Count", "Missing", "Mean", "Std", "Min", "25%", "50%", "75%", "Max",
    ]));
    for summary in summaries {
        if let ColumnSummary::Numeric(s) = summary {
            table.add_row(vec![
                Cell::new(&s.name),
                Cell::new(s.count),
                Cell::new(s.missing).fg(if s.missing > 0 { Color::Yellow } else { Color::White }),
                Cell::new(fmt(s.mean)),
                Cell::new(fmt(s.std)),
                Cell::new(fmt(s.min)),
                Cell::new(fmt(s.q25)),
                Cell::new(fmt(s.median)),
                Cell::new(fmt(s.q75)),
                Cell::new(fmt(s.max)),
            ]);
        }
    }
    print_indented(&table);

    for summary in summaries {
        let ColumnSummary::Categorical(c) = summary else {
            continue;
        };
        print_section("🏷️", &format!("{} ({} missing)", c.name, c.missing));
        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_header(header(&["Level", "Rows"]));
        for (level, count) in &c.levels {
            table.add_row(vec![Cell::new(level), Cell::new(count)]);
        }
        print_indented(&table);
    }
}
