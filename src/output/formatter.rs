//! Human-readable plan rendering (spec §4.8 `[ADDED]`), grounded on
//! `output/formatter.rs`'s `print_resource_plan`/`print_resource_change`:
//! a colored CREATE/UPDATE/DELETE/EXTERNAL_TOOL legend, one line per
//! change, and the summary/warnings trailer.

use colored::Colorize;

use crate::planner::types::{Action, Plan, PlannedChange};

/// Print a success message.
pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green().bold(), msg.green());
}

/// Print an error message.
pub fn print_error(msg: &str) {
    println!("{} {}", "✗".red().bold(), msg.red());
}

/// Print the full plan in a Terraform-plan-like format.
pub fn print_plan(plan: &Plan) {
    println!();
    if plan.changes.is_empty() {
        println!("{}", "No changes. Konnect resources are up-to-date.".green());
        return;
    }

    println!("kongplan will perform the following actions:");
    println!();
    for change in &plan.changes {
        print_change(change);
    }

    print_legend(plan);
    print_summary_line(plan);

    if !plan.warnings.is_empty() {
        println!();
        println!("{}", "Warnings:".yellow().bold());
        for warning in &plan.warnings {
            println!("  {} [{}] {}", "!".yellow(), warning.change_id, warning.message);
        }
    }
    println!();
}

fn print_legend(plan: &Plan) {
    let has = |action: Action| plan.changes.iter().any(|c| c.action == action);
    println!();
    println!("Change legend:");
    if has(Action::Create) {
        println!("  {} create", "+".green().bold());
    }
    if has(Action::Update) {
        println!("  {} update in-place", "~".yellow().bold());
    }
    if has(Action::Delete) {
        println!("  {} destroy", "-".red().bold());
    }
    if has(Action::ExternalTool) {
        println!("  {} external diff (deck)", "=>".cyan().bold());
    }
}

fn print_change(change: &PlannedChange) {
    let (symbol, colored_symbol) = match change.action {
        Action::Create => ("+", "+".green().bold()),
        Action::Update => ("~", "~".yellow().bold()),
        Action::Delete => ("-", "-".red().bold()),
        Action::ExternalTool => ("=>", "=>".cyan().bold()),
    };
    let _ = symbol;
    let label = if change.resource_ref == "[unknown]" {
        change
            .resource_monikers
            .get("slug")
            .cloned()
            .unwrap_or_else(|| change.resource_ref.clone())
    } else {
        change.resource_ref.clone()
    };
    println!(
        "  {} {} \"{}\" [{}]",
        colored_symbol,
        change.resource_type,
        label,
        change.id
    );
    for (key, value) in &change.fields {
        println!("      {key} = {value}");
    }
}

fn print_summary_line(plan: &Plan) {
    let summary = &plan.summary;
    let create = summary.by_action.get("CREATE").copied().unwrap_or(0);
    let update = summary.by_action.get("UPDATE").copied().unwrap_or(0);
    let delete = summary.by_action.get("DELETE").copied().unwrap_or(0);
    let external = summary.by_action.get("EXTERNAL_TOOL").copied().unwrap_or(0);
    println!();
    println!(
        "Plan: {} to create, {} to update, {} to destroy, {} external-tool step(s).",
        create.to_string().green(),
        update.to_string().yellow(),
        delete.to_string().red(),
        external.to_string().cyan(),
    );
    if let Some(protection) = &summary.protection_changes {
        println!(
            "Protection: {} resource(s) becoming protected, {} becoming unprotected.",
            protection.protecting, protection.unprotecting
        );
    }
}
