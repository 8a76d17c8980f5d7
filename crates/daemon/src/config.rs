// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agents file: the agents allowed to connect and their tokens.
//!
//! ```toml
//! [[agents]]
//! id = "builder-1"
//! name = "Local Agent"
//! token = "..."
//! capabilities = ["docker"]
//! max_concurrent_jobs = 2
//! ```

use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use weft_engine::KnownAgent;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid agents file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("agent '{0}' is listed more than once")]
    DuplicateAgent(String),

    #[error("agents '{0}' and '{1}' share a token")]
    SharedToken(String, String),

    #[error("agent '{0}' has an empty token")]
    EmptyToken(String),
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct AgentsFile {
    #[serde(default)]
    agents: Vec<KnownAgent>,
}

/// Load the agents file. A missing file means no agents.
pub fn load_agents(path: &Path) -> Result<Vec<KnownAgent>, ConfigError> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(path = %path.display(), "no agents file, every agent will be rejected");
            return Ok(Vec::new());
        }
        Err(source) => return Err(ConfigError::Read { path: path.to_path_buf(), source }),
    };
    let agents = parse_agents(&text).map_err(|e| match e {
        ParseFailure::Toml(source) => ConfigError::Parse { path: path.to_path_buf(), source },
        ParseFailure::Invalid(e) => e,
    })?;
    tracing::info!(path = %path.display(), count = agents.len(), "loaded agents");
    Ok(agents)
}

enum ParseFailure {
    Toml(toml::de::Error),
    Invalid(ConfigError),
}

fn parse_agents(text: &str) -> Result<Vec<KnownAgent>, ParseFailure> {
    let file: AgentsFile = toml::from_str(text).map_err(ParseFailure::Toml)?;
    validate(&file.agents).map_err(ParseFailure::Invalid)?;
    Ok(file.agents)
}

fn validate(agents: &[KnownAgent]) -> Result<(), ConfigError> {
    let mut ids = HashSet::new();
    let mut tokens: Vec<(&str, &str)> = Vec::new();
    for agent in agents {
        if !ids.insert(agent.id.as_str()) {
            return Err(ConfigError::DuplicateAgent(agent.id.to_string()));
        }
        if agent.token.is_empty() {
            return Err(ConfigError::EmptyToken(agent.id.to_string()));
        }
        if let Some((other, _)) = tokens.iter().find(|(_, t)| *t == agent.token) {
            return Err(ConfigError::SharedToken(other.to_string(), agent.id.to_string()));
        }
        tokens.push((agent.id.as_str(), &agent.token));
    }
    Ok(())
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
