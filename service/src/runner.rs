// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Execution of IaC scripts with the external provisioning tool.
//!
//! This module provides the [`ExecutionRunner`], which applies one script
//! with one set of decrypted credentials.
//!
//! # Execution Lifecycle
//!
//! 1. **Prepare**: create a uniquely named workspace under the configured root
//!    and write the script to [`SCRIPT_FILENAME`]
//! 2. **Init**: `<tool> init`
//! 3. **Plan**: `<tool> plan -no-color`
//! 4. **Apply**: `<tool> apply -auto-approve -no-color`
//! 5. **Cleanup**: remove the workspace (failures are logged only)
//!
//! Every subcommand runs in the workspace with `AWS_ACCESS_KEY_ID` and
//! `AWS_SECRET_ACCESS_KEY` added to the inherited environment. The first
//! failing step stops the run; earlier steps are not undone, so a failed
//! apply may leave infrastructure partially provisioned.
//!
//! Failures are not raised to the caller: [`run`](ExecutionRunner::run)
//! always produces an [`ExecutionOutcome`] whose text can be shown to the
//! user. There is no timeout, so a hung subcommand blocks its request.
//!
//! [`SCRIPT_FILENAME`]: crate::constants::SCRIPT_FILENAME

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;

use tempfile::TempDir;
use tokio::process::Command;

use crate::configuration::ServiceOptions;
use crate::constants::{SCRIPT_FILENAME, WORKSPACE_PREFIX};
use crate::models::{RunnerCredential, Script};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStage {
    Prepare,
    Init,
    Plan,
    Apply,
}

impl ExecutionStage {
    fn args(self) -> &'static [&'static str] {
        match self {
            Self::Prepare => &[],
            Self::Init => &["init"],
            Self::Plan => &["plan", "-no-color"],
            Self::Apply => &["apply", "-auto-approve", "-no-color"],
        }
    }
}

impl fmt::Display for ExecutionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prepare => f.write_str("prepare"),
            Self::Init => f.write_str("init"),
            Self::Plan => f.write_str("plan"),
            Self::Apply => f.write_str("apply"),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ExecutionError {
    #[error("unable to prepare workspace: {0}")]
    Workspace(std::io::Error),
    #[error("unable to start {stage} step: {source}")]
    Spawn {
        stage: ExecutionStage,
        source: std::io::Error,
    },
    #[error("{stage} step failed ({status})")]
    Exit {
        stage: ExecutionStage,
        status: ExitStatus,
        stderr: String,
    },
}

impl ExecutionError {
    pub fn stage(&self) -> ExecutionStage {
        match self {
            Self::Workspace(_) => ExecutionStage::Prepare,
            Self::Spawn { stage, .. } | Self::Exit { stage, .. } => *stage,
        }
    }

    pub fn stderr(&self) -> &str {
        match self {
            Self::Exit { stderr, .. } => stderr,
            _ => "",
        }
    }
}

/// Result of one execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// Labelled plan and apply output.
    Success { output: String },
    /// Error description followed by the failing step's stderr.
    Failure {
        stage: ExecutionStage,
        message: String,
    },
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// The displayable text, whichever way the run ended.
    pub fn text(&self) -> &str {
        match self {
            Self::Success { output } => output,
            Self::Failure { message, .. } => message,
        }
    }
}

impl From<ExecutionError> for ExecutionOutcome {
    fn from(err: ExecutionError) -> Self {
        Self::Failure {
            stage: err.stage(),
            message: format!("Error: {}\n{}", err, err.stderr()),
        }
    }
}

/// Runs scripts with the provisioning tool in throwaway workspaces.
#[derive(Debug, Clone)]
pub struct ExecutionRunner {
    tool: PathBuf,
    workspace_root: PathBuf,
}

impl ExecutionRunner {
    pub fn new(tool: impl Into<PathBuf>, workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            tool: tool.into(),
            workspace_root: workspace_root.into(),
        }
    }

    pub fn from_options(options: &ServiceOptions) -> Self {
        Self::new(options.tool.clone(), options.workspace_root())
    }

    /// Applies `script` with `credential` and returns the outcome.
    ///
    /// The workspace is removed before returning whenever it was created.
    #[tracing::instrument(skip_all, fields(script_id = %script.id))]
    pub async fn run(&self, credential: &RunnerCredential, script: &Script) -> ExecutionOutcome {
        let workspace = match self.prepare(&script.content).await {
            Ok(workspace) => workspace,
            Err(err) => {
                tracing::error!("[runner] {}", err);
                return err.into();
            }
        };

        tracing::debug!("[runner] workspace {}", workspace.path().display());

        let result = self.apply(workspace.path(), credential).await;

        self.cleanup(workspace).await;

        match result {
            Ok(output) => {
                tracing::info!("[runner] script {} applied", script.id);
                ExecutionOutcome::Success { output }
            }
            Err(err) => {
                tracing::error!("[runner] script {} failed: {}", script.id, err);
                err.into()
            }
        }
    }

    async fn prepare(&self, content: &str) -> Result<TempDir, ExecutionError> {
        let workspace = tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .tempdir_in(&self.workspace_root)
            .map_err(ExecutionError::Workspace)?;

        tokio::fs::write(workspace.path().join(SCRIPT_FILENAME), content)
            .await
            .map_err(ExecutionError::Workspace)?;

        Ok(workspace)
    }

    /// Removes the workspace, including any provider tree left by `init`, on
    /// the blocking pool. Failures are logged only.
    async fn cleanup(&self, workspace: TempDir) {
        let path = workspace.path().to_path_buf();

        match tokio::task::spawn_blocking(move || workspace.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::error!(
                    "[runner] unable to remove workspace {}: {:?}",
                    path.display(),
                    err
                );
            }
            Err(err) => {
                tracing::error!(
                    "[runner] workspace cleanup task failed for {}: {:?}",
                    path.display(),
                    err
                );
            }
        }
    }

    async fn apply(
        &self,
        workspace: &Path,
        credential: &RunnerCredential,
    ) -> Result<String, ExecutionError> {
        self.invoke(ExecutionStage::Init, workspace, credential)
            .await?;
        let plan = self
            .invoke(ExecutionStage::Plan, workspace, credential)
            .await?;
        let apply = self
            .invoke(ExecutionStage::Apply, workspace, credential)
            .await?;

        Ok(format!("Plan:\n{plan}\n\nApply:\n{apply}"))
    }

    /// Runs one subcommand and returns its stdout.
    async fn invoke(
        &self,
        stage: ExecutionStage,
        workspace: &Path,
        credential: &RunnerCredential,
    ) -> Result<String, ExecutionError> {
        tracing::debug!("[runner] {} {}", self.tool.display(), stage.args().join(" "));

        let output = Command::new(&self.tool)
            .args(stage.args())
            .current_dir(workspace)
            .env("AWS_ACCESS_KEY_ID", &credential.access_key_id)
            .env("AWS_SECRET_ACCESS_KEY", credential.secret_access_key.as_str())
            .output()
            .await
            .map_err(|source| ExecutionError::Spawn { stage, source })?;

        if !output.status.success() {
            return Err(ExecutionError::Exit {
                stage,
                status: output.status,
                stderr: String::from_utf8_lossy(output.stderr.as_slice()).to_string(),
            });
        }

        Ok(String::from_utf8_lossy(output.stdout.as_slice()).to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::models::NewScript;
    use zeroize::Zeroizing;

    fn credential() -> RunnerCredential {
        RunnerCredential {
            access_key_id: "AKIAEXAMPLE".to_string(),
            secret_access_key: Zeroizing::new("s3cr3t".to_string()),
        }
    }

    fn script(content: &str) -> Script {
        Script::new(
            "u1",
            NewScript {
                name: "test".to_string(),
                description: None,
                content: content.to_string(),
            },
        )
    }

    fn is_empty(dir: &Path) -> bool {
        std::fs::read_dir(dir).unwrap().next().is_none()
    }

    #[test]
    fn test_stage_arguments() {
        assert_eq!(ExecutionStage::Init.args(), ["init"]);
        assert_eq!(ExecutionStage::Plan.args(), ["plan", "-no-color"]);
        assert_eq!(
            ExecutionStage::Apply.args(),
            ["apply", "-auto-approve", "-no-color"]
        );
    }

    #[test]
    fn test_failure_text_includes_stderr() {
        let outcome: ExecutionOutcome = ExecutionError::Workspace(std::io::Error::other("disk full")).into();
        assert_eq!(
            outcome,
            ExecutionOutcome::Failure {
                stage: ExecutionStage::Prepare,
                message: "Error: unable to prepare workspace: disk full\n".to_string(),
            }
        );
        assert!(!outcome.is_success());
    }

    #[tokio::test]
    async fn test_missing_tool_fails_at_init_and_cleans_up() {
        let root = tempfile::tempdir().unwrap();
        let runner = ExecutionRunner::new("/nonexistent/provisioning-tool", root.path());

        let outcome = runner.run(&credential(), &script("terraform {}")).await;

        match outcome {
            ExecutionOutcome::Failure { stage, message } => {
                assert_eq!(stage, ExecutionStage::Init);
                assert!(message.starts_with("Error: unable to start init step"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(is_empty(root.path()));
    }

    #[tokio::test]
    async fn test_unwritable_root_fails_at_prepare() {
        let root = tempfile::tempdir().unwrap();
        let runner = ExecutionRunner::new("terraform", root.path().join("missing"));

        let outcome = runner.run(&credential(), &script("terraform {}")).await;

        assert!(matches!(
            outcome,
            ExecutionOutcome::Failure {
                stage: ExecutionStage::Prepare,
                ..
            }
        ));
    }

    #[cfg(unix)]
    mod with_fake_tool {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        /// Writes an executable shell script standing in for the provisioning tool.
        fn fake_tool(dir: &Path, body: &str) -> PathBuf {
            let path = dir.join("fake-terraform");
            std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        const SUCCEEDING_TOOL: &str = r#"
case "$1" in
  init) echo "initialized" ;;
  plan) echo "plan as $AWS_ACCESS_KEY_ID/$AWS_SECRET_ACCESS_KEY"; cat script.tf ;;
  apply) echo "apply complete" ;;
  *) exit 64 ;;
esac
"#;

        #[tokio::test]
        async fn test_successful_run_labels_plan_and_apply() {
            let tools = tempfile::tempdir().unwrap();
            let root = tempfile::tempdir().unwrap();
            let runner = ExecutionRunner::new(fake_tool(tools.path(), SUCCEEDING_TOOL), root.path());

            let outcome = runner
                .run(&credential(), &script("resource \"null_resource\" \"x\" {}"))
                .await;

            assert!(outcome.is_success(), "{outcome:?}");
            assert_eq!(
                outcome.text(),
                "Plan:\nplan as AKIAEXAMPLE/s3cr3t\nresource \"null_resource\" \"x\" {}\n\nApply:\napply complete\n"
            );
            assert!(!outcome.text().contains("initialized"));
            assert!(is_empty(root.path()));
        }

        #[tokio::test]
        async fn test_init_failure_reports_stderr_and_cleans_up() {
            let tools = tempfile::tempdir().unwrap();
            let root = tempfile::tempdir().unwrap();
            let tool = fake_tool(
                tools.path(),
                r#"if [ "$1" = "init" ]; then echo "Error: Failed to query available provider packages" >&2; exit 1; fi
echo "$1 ran""#,
            );
            let runner = ExecutionRunner::new(tool, root.path());

            let outcome = runner.run(&credential(), &script("terraform {}")).await;

            match &outcome {
                ExecutionOutcome::Failure { stage, message } => {
                    assert_eq!(*stage, ExecutionStage::Init);
                    assert!(message.contains("Failed to query available provider packages"));
                    assert!(!message.contains("Plan:"));
                    assert!(!message.contains("Apply:"));
                    assert!(!message.contains("ran"));
                }
                other => panic!("unexpected outcome: {other:?}"),
            }
            assert!(is_empty(root.path()));
        }

        #[tokio::test]
        async fn test_plan_failure_stops_before_apply() {
            let tools = tempfile::tempdir().unwrap();
            let root = tempfile::tempdir().unwrap();
            let tool = fake_tool(
                tools.path(),
                r#"case "$1" in
  init) echo "initialized" ;;
  plan) echo "Error: Unsupported argument" >&2; exit 1 ;;
  apply) touch "$0.applied" ;;
esac"#,
            );
            let runner = ExecutionRunner::new(&tool, root.path());

            let outcome = runner.run(&credential(), &script("terraform {}")).await;

            match &outcome {
                ExecutionOutcome::Failure { stage, message } => {
                    assert_eq!(*stage, ExecutionStage::Plan);
                    assert!(message.starts_with("Error: plan step failed"));
                    assert!(message.contains("Unsupported argument"));
                    assert!(!message.contains("Apply:"));
                }
                other => panic!("unexpected outcome: {other:?}"),
            }
            assert!(!tools.path().join("fake-terraform.applied").exists());
            assert!(is_empty(root.path()));
        }

        #[tokio::test]
        async fn test_provider_tree_is_removed() {
            let tools = tempfile::tempdir().unwrap();
            let root = tempfile::tempdir().unwrap();
            let tool = fake_tool(
                tools.path(),
                r#"if [ "$1" = "init" ]; then
  mkdir -p .terraform/providers/registry/aws/5.0.0
  for i in 1 2 3 4 5 6 7 8; do echo "$i" > ".terraform/providers/registry/aws/5.0.0/plugin-$i"; done
fi
echo "$1 ok""#,
            );
            let runner = ExecutionRunner::new(tool, root.path());

            let outcome = runner.run(&credential(), &script("terraform {}")).await;

            assert!(outcome.is_success(), "{outcome:?}");
            assert!(is_empty(root.path()));
        }

        #[tokio::test]
        async fn test_apply_failure_is_reported_after_plan() {
            let tools = tempfile::tempdir().unwrap();
            let root = tempfile::tempdir().unwrap();
            let tool = fake_tool(
                tools.path(),
                r#"if [ "$1" = "apply" ]; then echo "quota exceeded" >&2; exit 2; fi
echo "$1 ok""#,
            );
            let runner = ExecutionRunner::new(tool, root.path());

            let outcome = runner.run(&credential(), &script("terraform {}")).await;

            match &outcome {
                ExecutionOutcome::Failure { stage, message } => {
                    assert_eq!(*stage, ExecutionStage::Apply);
                    assert!(message.starts_with("Error: apply step failed"));
                    assert!(message.ends_with("quota exceeded\n"));
                }
                other => panic!("unexpected outcome: {other:?}"),
            }
            assert!(is_empty(root.path()));
        }

        #[tokio::test]
        async fn test_concurrent_runs_use_separate_workspaces() {
            let tools = tempfile::tempdir().unwrap();
            let root = tempfile::tempdir().unwrap();
            let runner = ExecutionRunner::new(fake_tool(tools.path(), SUCCEEDING_TOOL), root.path());
            let credential = credential();
            let first = script("first");
            let second = script("second");

            let (a, b) = tokio::join!(
                runner.run(&credential, &first),
                runner.run(&credential, &second)
            );

            assert!(a.text().contains("first"));
            assert!(!a.text().contains("second"));
            assert!(b.text().contains("second"));
            assert!(is_empty(root.path()));
        }
    }
}
