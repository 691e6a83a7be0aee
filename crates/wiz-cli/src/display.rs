//! Progress lines for CLI output

use console::style;

/// `→ <verb> <subject>`
pub fn action(verb: &str, subject: &str) {
    println!("{} {} {}", style("→").blue().bold(), verb, style(subject).cyan());
}

pub fn success(message: &str) {
    println!("{} {}", style("✓").green().bold(), message);
}

pub fn failure(message: &str) {
    println!("{} {}", style("✗").red().bold(), message);
}

pub fn skipped(message: &str) {
    println!("{} {}", style("-").dim(), style(message).dim());
}

/// Aligned `key: value` line
pub fn field(key: &str, value: &str) {
    println!("{:>13} {}", style(format!("{}:", key)).bold(), value);
}
