//! Scalar leaf coercion
//!
//! Leaf text is tried against these parsers in order, first match wins:
//!
//! 1. `json` attribute: the text is JSON; a number array becomes
//!    [`Value::Floats`] unless `notnum` is present
//! 2. decimal with a fraction part (`-?\d+\.\d*`)
//! 3. integer (`-?\d+`)
//! 4. `enabled`, `true`, `yes`, `on`
//! 5. `disabled`, `false`, `no`, `off`
//! 6. the raw text

use crate::error::{ReaderError, Result};
use crate::node::{Node, JSON_ATTR, NOTNUM_ATTR};
use crate::value::Value;

const TRUE_KEYWORDS: [&str; 4] = ["enabled", "true", "yes", "on"];
const FALSE_KEYWORDS: [&str; 4] = ["disabled", "false", "no", "off"];

/// Coerce a leaf node into a value
pub fn coerce_leaf(node: &Node) -> Result<Value> {
    let text = node.text_content();
    if node.has_attribute(JSON_ATTR) {
        return coerce_json(node, &text);
    }
    Ok(coerce_text(text.trim()))
}

/// Coerce plain text; never fails
pub fn coerce_text(text: &str) -> Value {
    if is_decimal(text) {
        if let Ok(v) = text.parse::<f64>() {
            return Value::Float(v);
        }
    }
    if is_integer(text) {
        // Out of i64 range still reads as a number
        return match text.parse::<i64>() {
            Ok(v) => Value::Int(v),
            Err(_) => text.parse::<f64>().map(Value::Float).unwrap_or_else(|_| Value::from(text)),
        };
    }
    if TRUE_KEYWORDS.contains(&text) {
        return Value::Bool(true);
    }
    if FALSE_KEYWORDS.contains(&text) {
        return Value::Bool(false);
    }
    Value::from(text)
}

fn coerce_json(node: &Node, text: &str) -> Result<Value> {
    let json: serde_json::Value = serde_json::from_str(text).map_err(|e| ReaderError::BadJson {
        node: node.name().to_string(),
        message: e.to_string(),
    })?;

    if !node.has_attribute(NOTNUM_ATTR) {
        if let Some(items) = json.as_array() {
            let floats: Option<Vec<f32>> = items.iter().map(|v| v.as_f64().map(|f| f as f32)).collect();
            if let Some(floats) = floats {
                return Ok(Value::Floats(floats));
            }
        }
    }
    Ok(Value::Json(json))
}

fn digits(s: &str) -> usize {
    s.bytes().take_while(u8::is_ascii_digit).count()
}

fn strip_sign(s: &str) -> &str {
    s.strip_prefix('-').unwrap_or(s)
}

fn is_integer(text: &str) -> bool {
    let body = strip_sign(text);
    !body.is_empty() && digits(body) == body.len()
}

fn is_decimal(text: &str) -> bool {
    let body = strip_sign(text);
    let whole = digits(body);
    if whole == 0 {
        return false;
    }
    match body[whole..].strip_prefix('.') {
        Some(fraction) => digits(fraction) == fraction.len(),
        None => false,
    }
}
