//! Terminal output for build summaries.
//!
//! Status lines go to stdout, errors to stderr. Color is applied only when the
//! stream supports it.

use std::time::Duration;

use owo_colors::{OwoColorize, Stream};

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const ERROR: &str = "✗";
  pub const INFO: &str = "•";
  pub const ARROW: &str = "→";
}

/// Width of the label column in [`print_stat`].
const LABEL_WIDTH: usize = 16;

/// `850ms`, `4.25s`, `2m 7s`
pub fn format_duration(duration: Duration) -> String {
  match duration.as_secs() {
    0 => format!("{}ms", duration.subsec_millis()),
    secs @ 1..60 => format!("{secs}.{:02}s", duration.subsec_millis() / 10),
    secs => format!("{}m {}s", secs / 60, secs % 60),
  }
}

pub fn print_success(message: &str) {
  let mark = symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green());
  let message = message.if_supports_color(Stream::Stdout, |s| s.bold());
  println!("{mark} {message}");
}

pub fn print_error(message: &str) {
  let mark = symbols::ERROR.if_supports_color(Stream::Stderr, |s| s.red());
  let message = message.if_supports_color(Stream::Stderr, |s| s.red());
  eprintln!("{mark} {message}");
}

pub fn print_info(message: &str) {
  let mark = symbols::INFO.if_supports_color(Stream::Stdout, |s| s.blue());
  println!("{mark} {message}");
}

/// An indented `label  value` line with the labels aligned.
pub fn print_stat(label: &str, value: &str) {
  let label = format!("{label}:");
  let label = format!("{label:<LABEL_WIDTH$}");
  println!("  {} {value}", label.if_supports_color(Stream::Stdout, |s| s.dimmed()));
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn format_duration_picks_unit() {
    assert_eq!(format_duration(Duration::from_millis(50)), "50ms");
    assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
    assert_eq!(format_duration(Duration::from_secs(59)), "59.00s");
    assert_eq!(format_duration(Duration::from_secs(65)), "1m 5s");
    assert_eq!(format_duration(Duration::from_secs(3600)), "60m 0s");
  }
}
