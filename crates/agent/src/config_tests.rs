// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn parse(s: &str) -> Result<AgentConfig, ConfigError> {
    let config: AgentConfig = toml::from_str(s).map_err(ConfigError::Parse)?;
    config.validate()?;
    Ok(config)
}

const MINIMAL: &str = r#"
agent_id = "node-a"
server = "127.0.0.1:7461"

[[pipes]]
name = "share"
root = "/mnt/share"
api_key = "k1"
"#;

#[test]
fn minimal_config_parses_with_defaults() {
    let config = parse(MINIMAL).expect("valid");
    assert_eq!(config.agent_id, "node-a");
    let pipe = &config.pipes[0];
    assert_eq!(pipe.schema, "fs");
    assert!(pipe.fields_mapping.is_passthrough());
    assert_eq!(pipe.watch_limit, 65_536);
    assert_eq!(pipe.consistency.batch_size, 1000);
}

#[test]
fn fields_mapping_parses_as_rule_list() {
    let config = parse(
        r#"
agent_id = "node-a"
server = "s:1"

[[pipes]]
name = "share"
root = "/mnt/share"
api_key = "k1"

[[pipes.fields_mapping]]
from = "modified_time"
to = "mtime"
"#,
    )
    .expect("valid");
    assert!(!config.pipes[0].fields_mapping.is_passthrough());
}

#[yare::parameterized(
    no_pipes      = { "agent_id = \"a\"\nserver = \"s:1\"\n" },
    empty_agent   = { "agent_id = \"\"\nserver = \"s:1\"\n[[pipes]]\nname = \"p\"\nroot = \"/r\"\napi_key = \"k\"\n" },
    empty_key     = { "agent_id = \"a\"\nserver = \"s:1\"\n[[pipes]]\nname = \"p\"\nroot = \"/r\"\napi_key = \"\"\n" },
    relative_root = { "agent_id = \"a\"\nserver = \"s:1\"\n[[pipes]]\nname = \"p\"\nroot = \"r\"\napi_key = \"k\"\n" },
    dup_name      = { "agent_id = \"a\"\nserver = \"s:1\"\n[[pipes]]\nname = \"p\"\nroot = \"/r\"\napi_key = \"k\"\n[[pipes]]\nname = \"p\"\nroot = \"/q\"\napi_key = \"k2\"\n" },
)]
fn invalid_configs_are_rejected(toml_src: &str) {
    assert!(parse(toml_src).is_err());
}

#[test]
fn load_reads_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("agent.toml");
    std::fs::write(&path, MINIMAL).unwrap();
    let config = AgentConfig::load(&path).expect("valid");
    assert_eq!(config.pipes[0].name, "share");
}
