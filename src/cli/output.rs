use std::time::Duration;

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use crate::cli::context;

/// Print a success message.
pub fn success(msg: &str) {
    if !context::quiet() {
        println!("  {} {}", "✓".green(), msg);
    }
}

/// Print a warning message.
pub fn warning(msg: &str) {
    if !context::quiet() {
        println!("  {} {}", "⚠".yellow(), msg);
    }
}

/// Print an error message.
pub fn error(msg: &str) {
    eprintln!("  {} {}", "✗".red(), msg);
}

/// Print a header line.
pub fn header(msg: &str) {
    if !context::quiet() {
        println!("\n{}", msg.bold());
    }
}

/// Print an indented continuation line under the previous message.
pub fn detail(msg: &str) {
    if !context::quiet() {
        for line in msg.lines() {
            println!("    {}", line.dimmed());
        }
    }
}

/// A spinner shown while tasks are running. Hidden in quiet mode.
pub fn spinner(msg: &str) -> ProgressBar {
    if context::quiet() {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("  {spinner:.cyan} {msg}")
            .expect("spinner template is always valid"),
    );
    bar.set_message(msg.to_string());
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}
