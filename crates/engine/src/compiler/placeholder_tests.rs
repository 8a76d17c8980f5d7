// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use proptest::prelude::*;
use serde_json::json;

fn bind(pairs: &[(&str, Value)]) -> Vec<(String, Value)> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

#[yare::parameterized(
    braced        = { "echo ${VERSION}",     "echo 1.2" },
    bare          = { "echo $VERSION",       "echo 1.2" },
    bare_suffix   = { "echo $VERSION-rc",    "echo 1.2-rc" },
    not_a_prefix  = { "echo $VERSIONS",      "echo $VERSIONS" },
    twice         = { "$VERSION/${VERSION}", "1.2/1.2" },
)]
fn scalar_substitution(input: &str, expected: &str) {
    assert_eq!(substitute_scalar(input, "VERSION", &json!("1.2")), expected);
}

#[test]
fn scalar_numbers_and_null() {
    assert_eq!(substitute_scalar("n=$N", "N", &json!(3)), "n=3");
    assert_eq!(substitute_scalar("n=${N}.", "N", &Value::Null), "n=.");
}

#[test]
fn labels_with_regex_metacharacters() {
    assert_eq!(substitute_scalar("v=${a.b+c}", "a.b+c", &json!("x")), "v=x");
    assert_eq!(substitute_scalar("v=${aXb+c}", "a.b+c", &json!("x")), "v=${aXb+c}");
}

#[yare::parameterized(
    braced_path  = { "${CFG.db.host}",  "localhost" },
    bare_path    = { "$CFG.ports[1]",   "8081" },
    whole_braced = { "${CFG.ports}",    "[8080,8081]" },
    whole        = { "${CFG}",          r#"{"db":{"host":"localhost"},"ports":[8080,8081]}"# },
    missing      = { "${CFG.nope}",     "${CFG.nope}" },
)]
fn object_substitution(input: &str, expected: &str) {
    let value = json!({"db": {"host": "localhost"}, "ports": [8080, 8081]});
    assert_eq!(substitute_object(input, "CFG", &value), expected);
}

#[test]
fn render_prefers_longer_names() {
    let bindings = bind(&[("A", json!("short")), ("AB", json!("long"))]);
    assert_eq!(render("$AB $A ${AB}", &bindings), "long short long");
}

#[test]
fn render_dispatches_on_value_shape() {
    let bindings = bind(&[("ITEM", json!({"name": "linux"})), ("N", json!(2))]);
    assert_eq!(render("build ${ITEM.name} x$N", &bindings), "build linux x2");
}

#[test]
fn condition_values_are_json_encoded() {
    let bindings = bind(&[("STATUS", json!("ok")), ("COUNT", json!(3)), ("LIST", json!([1, 2]))]);
    assert_eq!(
        render_condition("$STATUS == 'ok' && ${COUNT} > 1 && $LIST.length == 2", &bindings),
        r#""ok" == 'ok' && 3 > 1 && [1,2].length == 2"#
    );
}

#[test]
fn condition_paths_resolve_or_null() {
    let bindings = bind(&[("R", json!({"code": 0}))]);
    assert_eq!(render_condition("${R.code} == 0", &bindings), "0 == 0");
    assert_eq!(render_condition("${R.gone} == null", &bindings), "null == null");
}

#[test]
fn lookup_walks_paths() {
    let value = json!({"a": [{"b": 1}]});
    assert_eq!(lookup(&value, ".a[0].b"), Some(&json!(1)));
    assert_eq!(lookup(&value, ""), Some(&value));
    assert_eq!(lookup(&value, ".a[5]"), None);
}

proptest! {
    #[test]
    fn escaped_labels_match_only_themselves(label in "[ -~]{1,16}") {
        let re = regex::Regex::new(&format!("^{}$", escape(&label))).unwrap();
        prop_assert!(re.is_match(&label));
    }

    #[test]
    fn braced_placeholder_always_substitutes(label in "[A-Za-z_][A-Za-z0-9_ .+*?()]{0,12}", value in "[a-z0-9]{0,8}") {
        let text = format!("<${{{label}}}>");
        let out = substitute_scalar(&text, &label, &Value::String(value.clone()));
        prop_assert_eq!(out, format!("<{value}>"));
    }
}
