// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

#[yare::parameterized(
    number_lt          = { "1 < 2",                         true },
    number_ge          = { "2 >= 3",                        false },
    loose_num_str      = { "1 == '1'",                      true },
    strict_num_str     = { "1 === '1'",                     false },
    strict_not         = { "1 !== '1'",                     true },
    float_eq           = { "1.0 === 1",                     true },
    string_eq          = { r#""ok" == 'ok'"#,               true },
    string_ne          = { r#""ok" != 'ok'"#,               false },
    string_order       = { "'abc' < 'abd'",                 true },
    not                = { "!false",                        true },
    double_not_str     = { "!!''",                          false },
    neg                = { "-2 < -1",                       true },
    and_or             = { "true && false || true",         true },
    precedence         = { "false || 1 == 1 && 2 > 1",      true },
    parens             = { "(false || true) && false",      false },
    array_length       = { "[1,2,3].length == 3",           true },
    string_length      = { "'abcd'.length > 3",             true },
    object_prop        = { r#"{"code": 0}.code === 0"#,     true },
    object_missing     = { r#"{"a": 1}.b == null"#,         true },
    nested_index       = { r#"{"xs": [5, 6]}.xs[1] == 6"#,  true },
    null_loose         = { "null == undefined",             true },
    null_vs_zero       = { "null == 0",                     false },
    bool_loose         = { "true == 1",                     true },
    concat             = { "'a' + 1 == 'a1'",               true },
    add                = { "1 + 2 === 3",                   true },
    bare_number        = { "0",                             false },
    bare_string        = { "'x'",                           true },
    empty_array        = { "[]",                            true },
    escaped_quote      = { r#"'it\'s' == "it's""#,          true },
    nan_compare        = { "'abc' > 1",                     false },
)]
fn evaluates(expr: &str, expected: bool) {
    assert_eq!(evaluate_bool(expr).unwrap(), expected, "{expr}");
}

#[test]
fn or_returns_operand_value() {
    assert_eq!(evaluate("0 || 'fallback'").unwrap(), json!("fallback"));
    assert_eq!(evaluate("'a' && 'b'").unwrap(), json!("b"));
}

#[yare::parameterized(
    empty          = { "" },
    dangling_op    = { "1 <" },
    unclosed_paren = { "(1 < 2" },
    unterminated   = { "'abc" },
    stray_dollar   = { "$X == 1" },
    unknown_ident  = { "status == 'ok'" },
    trailing       = { "1 2" },
)]
fn rejects(expr: &str) {
    assert!(evaluate(expr).is_err(), "{expr} should not parse");
}

#[test]
fn error_messages_name_the_problem() {
    assert_eq!(evaluate("$X").unwrap_err(), ConditionError::UnexpectedChar { pos: 0, ch: '$' });
    assert_eq!(evaluate("foo").unwrap_err(), ConditionError::UnknownIdentifier("foo".into()));
    assert_eq!(evaluate("1 <").unwrap_err(), ConditionError::UnexpectedEnd);
}

#[yare::parameterized(
    null       = { json!(null),  false },
    zero       = { json!(0),     false },
    one        = { json!(1),     true },
    empty_str  = { json!(""),    false },
    str        = { json!("0"),   true },
    empty_obj  = { json!({}),    true },
)]
fn truthiness(value: Value, expected: bool) {
    assert_eq!(is_truthy(&value), expected);
}
