//! Combining payloads with input values.

use crate::element::Inputs;
use crate::payload::options::{Format, PLACEHOLDER_MARKER};

/// The value an input takes when `seed` is injected with `format`.
///
/// `None` means the format does not apply, e.g. `PLACEHOLDER` on a value
/// that has no marker.
pub fn format_value(original: &str, seed: &str, format: Format) -> Option<String> {
    let format = format.normalized();
    let payload = if format.contains(Format::SEMICOLON) {
        format!(";{}", seed)
    } else {
        seed.to_string()
    };

    let mut value = if format.contains(Format::APPEND) {
        format!("{}{}", original, payload)
    } else if format.contains(Format::PLACEHOLDER) {
        if !original.contains(PLACEHOLDER_MARKER) {
            return None;
        }
        original.replace(PLACEHOLDER_MARKER, &payload)
    } else {
        payload
    };

    if format.contains(Format::NULL) {
        value.push('\0');
    }
    Some(value)
}

/// Copy of `inputs` with `name` set to `value`, appended when not present.
pub fn inject_input(inputs: &Inputs, name: &str, value: &str) -> Inputs {
    let mut injected = inputs.clone();
    match injected.get_mut(name) {
        Some(v) => *v = value.to_string(),
        None => {
            injected.insert(name.to_string(), value.to_string());
        }
    }
    injected
}
