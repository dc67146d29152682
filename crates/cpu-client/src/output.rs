//! Status messages printed to stderr
//!
//! Messages go to stderr so they never mix with remote command output.

use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

/// Print an error message with a red marker
pub fn print_error(msg: &str) {
    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Red),
        Print("✗ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print a warning message with a yellow marker
pub fn print_warning(msg: &str) {
    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Yellow),
        Print("! "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}
