//! Repair heuristic for malformed backend event payloads
//!
//! The backend occasionally emits adjacent string fields without the separating
//! comma, e.g. `{"event":"message""answer":"Hi"}`. Only that shape is repaired;
//! callers must try a strict parse first.

use once_cell::sync::Lazy;
use regex::Regex;

/// A closing string quote immediately followed by the next `"key":`
static MISSING_SEPARATOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""(\s*)"([A-Za-z_][A-Za-z0-9_]*)"\s*:"#).expect("static regex is valid")
});

/// Insert missing `,` separators between adjacent string fields.
///
/// Returns `None` when the payload does not contain the known failure shape.
pub fn repair_missing_separators(payload: &str) -> Option<String> {
    if !MISSING_SEPARATOR.is_match(payload) {
        return None;
    }
    Some(
        MISSING_SEPARATOR
            .replace_all(payload, r#"",${1}"${2}":"#)
            .into_owned(),
    )
}
