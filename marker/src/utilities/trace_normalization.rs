use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

/// ANSI CSI sequences (colours, cursor movement) and bare carriage returns.
static CONTROL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-9;?]*[A-Za-z]|\r").expect("static pattern is valid"));

/// Removes terminal control sequences so literal markers match regardless of colouring.
pub fn strip_control(trace: &str) -> Cow<'_, str> {
    CONTROL.replace_all(trace, "")
}
