//! Terminal output for build progress.
//!
//! ```ignore
//! log!("posts"; "rendered {} posts", count);
//! ```

use colored::{ColoredString, Colorize};
use std::io::{stdout, Write};

/// Log a message with a colored module prefix, e.g. `[posts] read 12 posts`.
#[macro_export]
macro_rules! log {
    ($module:expr; $($arg:tt)*) => {{
        $crate::logger::log($module, &format!($($arg)*))
    }};
}

/// Writes `[module] message` to stdout. Write failures are ignored; progress
/// output is never worth aborting a build over.
pub fn log(module: &str, message: &str) {
    let prefix = colorize_prefix(module);
    let stdout = stdout();
    let mut stdout = stdout.lock();
    writeln!(stdout, "{} {}", prefix, message).ok();
}

fn colorize_prefix(module: &str) -> ColoredString {
    let prefix = format!("[{}]", module);
    match module.to_ascii_lowercase().as_str() {
        "error" => prefix.bright_red().bold(),
        "done" => prefix.bright_green().bold(),
        _ => prefix.bright_yellow().bold(),
    }
}
