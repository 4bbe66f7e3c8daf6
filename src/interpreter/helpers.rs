use super::*;

// ToBoolean
pub(crate) fn to_boolean(val: &JsValue) -> bool {
    match val {
        JsValue::Undefined | JsValue::Null => false,
        JsValue::Boolean(b) => *b,
        JsValue::Number(n) => *n != 0.0 && !n.is_nan(),
        JsValue::String(s) => !s.is_empty(),
        JsValue::Object(_) => true,
    }
}

// ToNumber for primitives; objects go through Interpreter::to_primitive first
pub(crate) fn to_number(val: &JsValue) -> f64 {
    match val {
        JsValue::Undefined => f64::NAN,
        JsValue::Null => 0.0,
        JsValue::Boolean(b) => *b as u8 as f64,
        JsValue::Number(n) => *n,
        JsValue::String(s) => string_to_number(s),
        JsValue::Object(_) => f64::NAN,
    }
}

fn string_to_number(s: &JsString) -> f64 {
    let rust_str = s.to_rust_string();
    let trimmed = rust_str.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    let radix = |prefix_lower: &str, prefix_upper: &str, radix: u32| {
        trimmed
            .strip_prefix(prefix_lower)
            .or_else(|| trimmed.strip_prefix(prefix_upper))
            .map(|digits| {
                i64::from_str_radix(digits, radix)
                    .map(|n| n as f64)
                    .unwrap_or(f64::NAN)
            })
    };
    if let Some(n) = radix("0x", "0X", 16)
        .or_else(|| radix("0o", "0O", 8))
        .or_else(|| radix("0b", "0B", 2))
    {
        return n;
    }
    match trimmed {
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        // Rust accepts "inf"/"nan" spellings that JS does not
        t if t.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') => f64::NAN,
        t => t.parse::<f64>().unwrap_or(f64::NAN),
    }
}

pub(crate) fn to_js_string(val: &JsValue) -> String {
    format!("{val}")
}

pub(crate) fn strict_equality(left: &JsValue, right: &JsValue) -> bool {
    match (left, right) {
        (JsValue::Undefined, JsValue::Undefined) => true,
        (JsValue::Null, JsValue::Null) => true,
        (JsValue::Boolean(a), JsValue::Boolean(b)) => a == b,
        (JsValue::Number(a), JsValue::Number(b)) => a == b,
        (JsValue::String(a), JsValue::String(b)) => a == b,
        (JsValue::Object(a), JsValue::Object(b)) => a.id == b.id,
        _ => false,
    }
}

pub(crate) fn same_value_zero(left: &JsValue, right: &JsValue) -> bool {
    match (left, right) {
        (JsValue::Number(a), JsValue::Number(b)) => number_ops::same_value_zero(*a, *b),
        _ => strict_equality(left, right),
    }
}

/// `==` once objects have been reduced to primitives.
pub(crate) fn loose_equality(left: &JsValue, right: &JsValue) -> bool {
    if std::mem::discriminant(left) == std::mem::discriminant(right) {
        return strict_equality(left, right);
    }
    match (left, right) {
        (a, b) if a.is_nullish() && b.is_nullish() => true,
        (a, b) if a.is_nullish() || b.is_nullish() => false,
        (JsValue::Boolean(_), _) => loose_equality(&JsValue::Number(to_number(left)), right),
        (_, JsValue::Boolean(_)) => loose_equality(left, &JsValue::Number(to_number(right))),
        (JsValue::Number(a), JsValue::String(_)) => *a == to_number(right),
        (JsValue::String(_), JsValue::Number(b)) => to_number(left) == *b,
        _ => false,
    }
}

/// `<` on primitives. `None` when either side is NaN.
pub(crate) fn less_than(left: &JsValue, right: &JsValue) -> Option<bool> {
    if let (JsValue::String(a), JsValue::String(b)) = (left, right) {
        return Some(a.code_units < b.code_units);
    }
    let (ln, rn) = (to_number(left), to_number(right));
    if ln.is_nan() || rn.is_nan() {
        return None;
    }
    Some(ln < rn)
}

pub(crate) fn typeof_val(
    val: &JsValue,
    objects: &[Option<Rc<RefCell<JsObjectData>>>],
) -> &'static str {
    match val {
        JsValue::Undefined => "undefined",
        JsValue::Null => "object",
        JsValue::Boolean(_) => "boolean",
        JsValue::Number(_) => "number",
        JsValue::String(_) => "string",
        JsValue::Object(o) => {
            if let Some(Some(obj)) = objects.get(o.id as usize)
                && obj.borrow().callable.is_some()
            {
                return "function";
            }
            "object"
        }
    }
}

/// Canonical string form of a property key.
pub(crate) fn property_key_string(val: &JsValue) -> String {
    match val {
        JsValue::Number(n) => number_ops::to_string(*n),
        other => to_js_string(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness() {
        assert!(!to_boolean(&JsValue::Undefined));
        assert!(!to_boolean(&JsValue::Number(f64::NAN)));
        assert!(!to_boolean(&JsValue::from_str("")));
        assert!(to_boolean(&JsValue::from_str("0")));
        assert!(to_boolean(&JsValue::Number(-1.0)));
    }

    #[test]
    fn string_to_number_forms() {
        assert_eq!(to_number(&JsValue::from_str(" 42 ")), 42.0);
        assert_eq!(to_number(&JsValue::from_str("0x1F")), 31.0);
        assert_eq!(to_number(&JsValue::from_str("")), 0.0);
        assert_eq!(to_number(&JsValue::from_str("-Infinity")), f64::NEG_INFINITY);
        assert!(to_number(&JsValue::from_str("inf")).is_nan());
        assert!(to_number(&JsValue::from_str("12px")).is_nan());
        assert_eq!(to_number(&JsValue::from_str("1e3")), 1000.0);
    }

    #[test]
    fn equality_rules() {
        assert!(loose_equality(&JsValue::Null, &JsValue::Undefined));
        assert!(!loose_equality(&JsValue::Null, &JsValue::Number(0.0)));
        assert!(loose_equality(&JsValue::from_str("1"), &JsValue::Number(1.0)));
        assert!(loose_equality(&JsValue::Boolean(true), &JsValue::Number(1.0)));
        assert!(!strict_equality(&JsValue::from_str("1"), &JsValue::Number(1.0)));
        assert!(!strict_equality(&JsValue::Number(f64::NAN), &JsValue::Number(f64::NAN)));
        assert!(same_value_zero(&JsValue::Number(f64::NAN), &JsValue::Number(f64::NAN)));
    }

    #[test]
    fn relational_comparison() {
        assert_eq!(less_than(&JsValue::from_str("a"), &JsValue::from_str("b")), Some(true));
        assert_eq!(less_than(&JsValue::Number(2.0), &JsValue::from_str("10")), Some(true));
        assert_eq!(less_than(&JsValue::Undefined, &JsValue::Number(1.0)), None);
    }
}
