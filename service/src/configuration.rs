// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

use std::fmt;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::constants::DEFAULT_TOOL;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreBackend {
    /// Process-local maps, lost on restart
    Memory,
    /// One DynamoDB table per record kind
    Dynamodb,
}

#[derive(Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct ServiceOptions {
    #[arg(long, default_value = "127.0.0.1", env("SERVICE_HTTP_HOST"))]
    pub host: String,
    #[arg(long, default_value = "8080", env("SERVICE_HTTP_PORT"))]
    pub port: u16,
    #[arg(long, value_enum, default_value = "memory", env("STORE_BACKEND"))]
    pub store: StoreBackend,
    #[arg(long, default_value = "users", env("USERS_TABLE"))]
    pub users_table: String,
    #[arg(long, default_value = "aws-keys", env("KEYS_TABLE"))]
    pub keys_table: String,
    #[arg(long, default_value = "iac-scripts", env("SCRIPTS_TABLE"))]
    pub scripts_table: String,
    /// 64 hex characters, or a literal 32-byte string
    #[arg(long, env("ENCRYPTION_KEY"), hide_env_values = true)]
    pub encryption_key: String,
    #[arg(long, default_value = DEFAULT_TOOL, env("IAC_TOOL"))]
    pub tool: PathBuf,
    #[arg(long, env("WORKSPACE_ROOT"))]
    pub workspace_root: Option<PathBuf>,
}

impl ServiceOptions {
    pub fn workspace_root(&self) -> PathBuf {
        self.workspace_root
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }
}

impl Default for ServiceOptions {
    fn default() -> Self {
        ServiceOptions {
            host: "127.0.0.1".to_string(),
            port: 8080,
            store: StoreBackend::Memory,
            users_table: "users".to_string(),
            keys_table: "aws-keys".to_string(),
            scripts_table: "iac-scripts".to_string(),
            encryption_key: String::new(),
            tool: PathBuf::from(DEFAULT_TOOL),
            workspace_root: None,
        }
    }
}

// Custom Debug implementation so the options can be logged at startup
impl fmt::Debug for ServiceOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceOptions")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("store", &self.store)
            .field("users_table", &self.users_table)
            .field("keys_table", &self.keys_table)
            .field("scripts_table", &self.scripts_table)
            .field("encryption_key", &"[REDACTED]")
            .field("tool", &self.tool)
            .field("workspace_root", &self.workspace_root)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reads_flags() {
        let options = ServiceOptions::try_parse_from([
            "iac-vault",
            "--port",
            "9000",
            "--store",
            "dynamodb",
            "--encryption-key",
            "0123456789abcdef0123456789abcdef",
            "--workspace-root",
            "/var/tmp/iac",
        ])
        .unwrap();

        assert_eq!(options.port, 9000);
        assert_eq!(options.store, StoreBackend::Dynamodb);
        assert_eq!(options.keys_table, "aws-keys");
        assert_eq!(options.workspace_root(), PathBuf::from("/var/tmp/iac"));
    }

    #[test]
    fn test_debug_redacts_encryption_key() {
        let options = ServiceOptions {
            encryption_key: "super-secret-key-material-000000".to_string(),
            ..Default::default()
        };
        let rendered = format!("{options:?}");
        assert!(rendered.contains("[REDACTED]"));
        assert!(!rendered.contains("super-secret"));
    }

    #[test]
    fn test_workspace_root_defaults_to_temp_dir() {
        let options = ServiceOptions::default();
        assert_eq!(options.workspace_root(), std::env::temp_dir());
    }
}
