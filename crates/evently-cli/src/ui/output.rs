//! Formatted output utilities.

use console::style;

/// Print a success message with checkmark.
pub fn success(msg: &str) {
    println!("{} {}", style("✓").green().bold(), msg);
}

/// Print an error message with X.
pub fn error(msg: &str) {
    eprintln!("{} {}", style("✗").red().bold(), msg);
}

/// Print a warning message.
pub fn warning(msg: &str) {
    println!("{} {}", style("⚠").yellow().bold(), msg);
}

/// Print an info message.
pub fn info(msg: &str) {
    println!("{} {}", style("ℹ").blue().bold(), msg);
}

/// Print a header/section title.
pub fn header(msg: &str) {
    println!("\n{}", style(msg).bold().underlined());
}

/// Print the Evently banner.
pub fn banner() {
    println!(
        "{}",
        style(
            r"
  _____                 _   _
 | ____|_   _____ _ __ | |_| |_   _
 |  _| \ \ / / _ \ '_ \| __| | | | |
 | |___ \ V /  __/ | | | |_| | |_| |
 |_____| \_/ \___|_| |_|\__|_|\__, |
                              |___/
"
        )
        .cyan()
    );
}

/// Print a key-value pair.
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", style(key).bold(), value);
}
