// src/utils/log.rs

//! Console report helpers with server-style formatting.
//!
//! Diagnostics go through the `log` facade; these helpers print the
//! human-facing report of a run (headers, progress, summaries) to stdout.

use std::io::Write;

use chrono::Local;

const RULE_WIDTH: usize = 60;

/// Print a header block.
pub fn header(title: &str) {
    println!();
    println!("{}", "═".repeat(RULE_WIDTH));
    println!("  {}", title);
    println!("{}", "═".repeat(RULE_WIDTH));
}

/// Print a separator line.
pub fn separator() {
    println!("{}", "─".repeat(RULE_WIDTH));
}

/// Print an indented line.
pub fn sub_item(message: &str) {
    println!("    {}", message);
}

/// Print a success line.
pub fn success(message: &str) {
    println!(
        "[{}] [INFO] ✓ {}",
        Local::now().format("%Y-%m-%d %H:%M:%S"),
        message
    );
}

/// Overwrite the current line with a progress message.
pub fn progress(message: &str) {
    print!("\r[{}] [PROG] {}", Local::now().format("%H:%M:%S"), message);
    let _ = std::io::stdout().flush();
}

/// Finish a run of progress lines.
pub fn progress_done() {
    println!();
}

/// Print a titled key/value section.
pub fn summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("[{}] [SUMMARY] {}", Local::now().format("%H:%M:%S"), title);
    let width = items.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
    for (key, value) in items {
        println!("    {:<width$} : {}", key, value, width = width);
    }
}

/// Render a completed/total bar, e.g. `[#####-----] 50/100`.
pub fn progress_bar(completed: usize, total: usize, width: usize) -> String {
    let filled = if total == 0 {
        width
    } else {
        (completed.min(total) * width) / total
    };
    format!(
        "[{}{}] {}/{}",
        "#".repeat(filled),
        "-".repeat(width - filled),
        completed,
        total
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_bar() {
        assert_eq!(progress_bar(5, 10, 10), "[#####-----] 5/10");
        assert_eq!(progress_bar(0, 0, 4), "[####] 0/0");
        assert_eq!(progress_bar(12, 10, 4), "[####] 12/10");
    }
}
