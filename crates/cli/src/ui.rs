//! User interface helpers: the banner and tagged status lines.

use colored::Colorize;
use std::env;

pub fn print_header() {
    let version = env!("CARGO_PKG_VERSION");
    let spaces = " ".repeat(24usize.saturating_sub(version.len()));
    eprintln!(
        r#"
    ╭──────────────────────────────────────╮
    │                                      │
    │          U N D I S P O S E D         │
    │                                      │
    │     Disposable field analysis        │
    │     Version: {version}{spaces}│
    │                                      │
    ╰──────────────────────────────────────╯
"#
    );
}

/// Colors are off for `NO_COLOR`, dumb terminals and CI.
pub fn use_colored_output() -> bool {
    if env::var("NO_COLOR").is_ok() {
        return false;
    }
    if let Ok(term) = env::var("TERM") {
        if term == "dumb" || term == "unknown" {
            return false;
        }
    }
    env::var("CI").is_err() && env::var("CONTINUOUS_INTEGRATION").is_err()
}

fn tagged(tag: &str, color: fn(&str) -> colored::ColoredString) -> String {
    if use_colored_output() {
        format!("[{}]", color(tag))
    } else {
        format!("[{tag}]")
    }
}

pub fn print_success(tag: &str, message: &str) {
    println!("{} {message}", tagged(tag, |t| t.bright_green().bold()));
}
