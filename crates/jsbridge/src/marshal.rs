//! String marshaling between engine values and UTF-8
//!
//! One conversion rule is used everywhere a value leaves the engine: call
//! results, evaluation results and host-function arguments.
//! `undefined` becomes the empty string; anything else uses the engine's
//! string conversion, falling back to the empty string if that throws.

use crate::engine::{Engine, ValueKind};

/// Apply the conversion rule to an already-classified value.
///
/// `text` is only consulted for non-`undefined` values, so backends can
/// pass a lazily evaluated conversion.
pub fn render<F>(kind: ValueKind, text: F) -> String
where
    F: FnOnce() -> Option<String>,
{
    if kind == ValueKind::Undefined {
        return String::new();
    }
    text().unwrap_or_default()
}

/// Convert an engine value to an owned UTF-8 string.
pub fn value_to_utf8<E: Engine>(engine: &mut E, realm: &E::Realm, value: &E::Value) -> String {
    let kind = engine.kind(value);
    render(kind, || engine.to_utf8(realm, value))
}

/// Convert an optional host string to an engine value; `None` becomes
/// `undefined`, which is distinct from the empty string.
pub fn to_value<E: Engine>(engine: &mut E, text: Option<&str>) -> E::Value {
    match text {
        Some(text) => engine.string(text),
        None => engine.undefined(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_undefined_renders_empty() {
        let rendered = render(ValueKind::Undefined, || panic!("must not convert undefined"));
        assert_eq!(rendered, "");
    }

    #[test]
    fn test_failed_conversion_renders_empty() {
        assert_eq!(render(ValueKind::Object, || None), "");
    }

    #[test]
    fn test_primitive_uses_conversion() {
        assert_eq!(render(ValueKind::Null, || Some("null".into())), "null");
        assert_eq!(render(ValueKind::Primitive, || Some("2".into())), "2");
    }
}
