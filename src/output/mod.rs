pub mod json;
pub mod text;

use crate::error::BrokerError;

/// Render a successful result either as a JSON envelope or plain text,
/// depending on the CLI's `--json` flag.
pub fn render_ok<T: serde::Serialize>(json_mode: bool, value: &T, text: impl FnOnce() -> String) {
    if json_mode {
        json::print_ok(value);
    } else {
        println!("{}", text());
    }
}

pub fn render_err(json_mode: bool, err: &BrokerError) {
    if json_mode {
        json::print_err(err);
    } else {
        text::print_err(err);
    }
}
