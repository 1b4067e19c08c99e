//! Shared CLI output helpers.
//!
//! Global flags are exported as environment variables by `main` so every
//! command module can check them without threading state around.

/// Whether `--json` was passed.
pub fn is_json() -> bool {
    std::env::var("DCMR_JSON").is_ok()
}

/// Whether `--quiet` was passed.
pub fn is_quiet() -> bool {
    std::env::var("DCMR_QUIET").is_ok()
}

/// Whether `--no-color` was passed.
pub fn is_no_color() -> bool {
    std::env::var("DCMR_NO_COLOR").is_ok()
}

/// Print a machine-readable JSON value to stdout.
pub fn print_json(value: &serde_json::Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
    );
}

/// Minimal ANSI styling for human output.
pub struct Styled {
    color: bool,
}

impl Styled {
    pub fn new() -> Self {
        Self { color: !is_no_color() }
    }

    pub fn ok_sym(&self) -> &'static str {
        if self.color {
            "\x1b[32m✓\x1b[0m"
        } else {
            "✓"
        }
    }

    pub fn warn_sym(&self) -> &'static str {
        if self.color {
            "\x1b[33m!\x1b[0m"
        } else {
            "!"
        }
    }
}

impl Default for Styled {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbols_drop_ansi_without_color() {
        let plain = Styled { color: false };
        assert_eq!(plain.ok_sym(), "✓");
        assert_eq!(plain.warn_sym(), "!");

        let colored = Styled { color: true };
        assert!(colored.ok_sym().contains('✓'));
        assert!(colored.warn_sym().contains('!'));
    }
}
