// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn parse(text: &str) -> Result<Vec<KnownAgent>, ConfigError> {
    parse_agents(text).map_err(|e| match e {
        ParseFailure::Toml(source) => ConfigError::Parse { path: PathBuf::from("agents.toml"), source },
        ParseFailure::Invalid(e) => e,
    })
}

#[test]
fn agents_parse_with_defaults() {
    let agents = parse(
        r#"
        [[agents]]
        id = "a1"
        name = "Local Agent"
        token = "secret"

        [[agents]]
        id = "a2"
        name = "builder"
        token = "other"
        capabilities = ["docker", "gpu"]
        max_concurrent_jobs = 4
        "#,
    )
    .unwrap();

    assert_eq!(agents.len(), 2);
    assert_eq!(agents[0].id.as_str(), "a1");
    assert_eq!(agents[0].max_concurrent_jobs, 1);
    assert!(agents[0].capabilities.is_empty());
    assert_eq!(agents[1].capabilities, vec!["docker", "gpu"]);
    assert_eq!(agents[1].max_concurrent_jobs, 4);
}

#[test]
fn empty_file_has_no_agents() {
    assert!(parse("").unwrap().is_empty());
}

#[yare::parameterized(
    duplicate_id = {
        "[[agents]]\nid = \"a\"\nname = \"x\"\ntoken = \"t1\"\n[[agents]]\nid = \"a\"\nname = \"y\"\ntoken = \"t2\"\n"
    },
    shared_token = {
        "[[agents]]\nid = \"a\"\nname = \"x\"\ntoken = \"t\"\n[[agents]]\nid = \"b\"\nname = \"y\"\ntoken = \"t\"\n"
    },
    empty_token = { "[[agents]]\nid = \"a\"\nname = \"x\"\ntoken = \"\"\n" },
    missing_token = { "[[agents]]\nid = \"a\"\nname = \"x\"\n" },
    unknown_key = { "agent = []\n" },
)]
fn invalid_files_are_rejected(text: &str) {
    assert!(parse(text).is_err());
}

#[test]
fn shared_token_names_both_agents() {
    let err = parse("[[agents]]\nid = \"a\"\nname = \"x\"\ntoken = \"t\"\n[[agents]]\nid = \"b\"\nname = \"y\"\ntoken = \"t\"\n")
        .unwrap_err();
    assert_eq!(err.to_string(), "agents 'a' and 'b' share a token");
}

#[test]
fn missing_file_means_no_agents() {
    let dir = tempfile::tempdir().unwrap();
    assert!(load_agents(&dir.path().join("agents.toml")).unwrap().is_empty());
}

#[test]
fn file_errors_carry_the_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("agents.toml");
    std::fs::write(&path, "[[agents]\n").unwrap();

    let err = load_agents(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
    assert!(err.to_string().contains("agents.toml"));
}
