//! ANSI styling for terminal diagnostics.
//!
//! Colors are disabled when `NO_COLOR` is set or stderr is not a terminal.

use std::io::IsTerminal;
use std::sync::OnceLock;

pub struct Style;

fn enabled() -> bool {
    static ENABLED: OnceLock<bool> = OnceLock::new();
    *ENABLED.get_or_init(|| {
        std::env::var_os("NO_COLOR").is_none() && std::io::stderr().is_terminal()
    })
}

fn wrap(code: &str, s: &str) -> String {
    if enabled() {
        format!("\x1b[{}m{}\x1b[0m", code, s)
    } else {
        s.to_string()
    }
}

impl Style {
    pub fn bold_red(s: &str) -> String {
        wrap("1;31", s)
    }

    pub fn red(s: &str) -> String {
        wrap("31", s)
    }

    pub fn green(s: &str) -> String {
        wrap("32", s)
    }

    pub fn blue(s: &str) -> String {
        wrap("34", s)
    }

    pub fn cyan(s: &str) -> String {
        wrap("36", s)
    }
}
