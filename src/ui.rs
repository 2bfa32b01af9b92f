//! Terminal output for the user-facing steps of a run.

use colored::Colorize;

/// `==> Installing rust-beta 1.0.0-beta.2`
pub fn action(message: &str) {
    println!("{} {}", "==>".blue().bold(), message.bold());
}

/// Indented detail under the current action.
pub fn detail(message: &str) {
    println!("    {}", message.dimmed());
}

pub fn success(message: &str) {
    println!("{} {}", "==>".green().bold(), message.green());
}

pub fn warning(message: &str) {
    eprintln!("{} {}", "warning:".yellow().bold(), message.yellow());
}
