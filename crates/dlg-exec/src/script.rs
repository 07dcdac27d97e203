//! Local script execution
//!
//! Runs a script as a child process of the delegate, with the same output
//! and variable-harvest contract as a remote command. The script is written
//! into a working directory: a fresh per-execution directory that is
//! removed afterwards, or a caller-supplied persistent one from which only
//! the per-run files are removed.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use uuid::Uuid;

use dlg_core::config::ScriptSection;
use dlg_core::traits::LogSink;
use dlg_core::{ExecutionStatus, LogLevel};

use crate::command::{
    check_variable_names, env_file_name, parse_env_output, powershell_suffix, shell_suffix,
    CommandOutcome,
};
use crate::error::ExecError;
use crate::log::ExecutionLogger;

/// Host name recorded on log lines of local scripts
const LOCAL_HOST: &str = "localhost";

/// Script dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScriptType {
    #[default]
    Bash,
    PowerShell,
}

/// One local script run
#[derive(Debug, Clone, Default)]
pub struct ScriptRequest {
    pub account_id: String,
    pub app_id: String,
    pub execution_id: String,
    pub command_unit_name: String,
    pub script: String,
    pub script_type: ScriptType,
    /// Persistent working directory; an ephemeral one is used when unset
    pub working_directory: Option<PathBuf>,
    pub environment: HashMap<String, String>,
    /// Kube-config document exported as `KUBECONFIG`
    pub kube_config: Option<String>,
    pub harvest: Vec<String>,
}

impl ScriptRequest {
    pub fn new(execution_id: impl Into<String>, script: impl Into<String>) -> Self {
        Self {
            execution_id: execution_id.into(),
            script: script.into(),
            ..Default::default()
        }
    }
}

/// Escape a script for the body of a double-quoted shell word
pub fn escape_for_double_quotes(script: &str) -> String {
    let mut escaped = String::with_capacity(script.len());
    for c in script.chars() {
        if matches!(c, '\\' | '$' | '"' | '`') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Wrap a PowerShell script in a shell line invoking `powershell`
pub fn powershell_shim(powershell: &str, script: &str) -> String {
    format!(
        "{} -Command \"& {{ {} }}\"\n",
        powershell,
        escape_for_double_quotes(script)
    )
}

/// Runs scripts as local child processes
pub struct LocalScriptExecutor {
    sink: Arc<dyn LogSink>,
    settings: ScriptSection,
}

/// Files created for one run
struct RunFiles {
    dir: PathBuf,
    ephemeral: bool,
    script: PathBuf,
    env_file: Option<PathBuf>,
    kube_config: Option<PathBuf>,
}

impl RunFiles {
    async fn cleanup(&self) {
        if self.ephemeral {
            if let Err(e) = tokio::fs::remove_dir_all(&self.dir).await {
                tracing::debug!(dir = %self.dir.display(), "Failed to remove working directory: {}", e);
            }
            return;
        }
        let files = std::iter::once(&self.script)
            .chain(self.env_file.as_ref())
            .chain(self.kube_config.as_ref());
        for file in files {
            if let Err(e) = tokio::fs::remove_file(file).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::debug!(file = %file.display(), "Failed to remove run file: {}", e);
                }
            }
        }
    }
}

impl LocalScriptExecutor {
    pub fn new(sink: Arc<dyn LogSink>, settings: ScriptSection) -> Self {
        Self { sink, settings }
    }

    /// Script file contents for a request, harvest suffix included
    pub fn render(&self, request: &ScriptRequest, env_file: Option<&Path>) -> String {
        let env_file = env_file.map(|p| p.to_string_lossy().into_owned());
        match request.script_type {
            ScriptType::Bash => {
                let mut body = request.script.clone();
                if let Some(env_file) = &env_file {
                    body.push_str(&shell_suffix(&request.harvest, env_file));
                }
                body
            }
            ScriptType::PowerShell => {
                let mut body = request.script.clone();
                if let Some(env_file) = &env_file {
                    body.push_str(&powershell_suffix(&request.harvest, env_file));
                }
                powershell_shim(&self.settings.powershell, &body)
            }
        }
    }

    /// Run a script and harvest the requested variables.
    ///
    /// Only invalid variable names are returned as errors; everything else
    /// ends in a status and log lines.
    pub async fn execute(&self, request: &ScriptRequest) -> Result<CommandOutcome, ExecError> {
        check_variable_names(&request.harvest)?;
        let logger = ExecutionLogger::new(
            Arc::clone(&self.sink),
            request.account_id.as_str(),
            request.app_id.as_str(),
            request.execution_id.as_str(),
            request.command_unit_name.as_str(),
            LOCAL_HOST,
        );

        let files = match self.prepare(request).await {
            Ok(files) => files,
            Err(e) => {
                logger.error(format!("Failed to prepare script: {}", e));
                logger.finish(ExecutionStatus::Failure, "Script execution failed");
                return Ok(CommandOutcome {
                    status: ExecutionStatus::Failure,
                    harvested: HashMap::new(),
                });
            }
        };

        let status = self.run(request, &files, &logger).await;

        let harvested = match &files.env_file {
            Some(env_file) => match tokio::fs::read_to_string(env_file).await {
                Ok(output) => parse_env_output(&output, &request.harvest),
                Err(e) => {
                    logger.warn(format!("Unable to read environment variables: {}", e));
                    HashMap::new()
                }
            },
            None => HashMap::new(),
        };

        files.cleanup().await;
        logger.finish(status, format!("Script execution finished with status {}", status));
        Ok(CommandOutcome { status, harvested })
    }

    async fn prepare(&self, request: &ScriptRequest) -> std::io::Result<RunFiles> {
        let (dir, ephemeral) = match &request.working_directory {
            Some(dir) => (dir.clone(), false),
            None => {
                let name = if request.execution_id.trim().is_empty() {
                    Uuid::new_v4().simple().to_string()
                } else {
                    format!("{}-{}", request.execution_id.trim(), Uuid::new_v4().simple())
                };
                (self.settings.working_root.join(name), true)
            }
        };
        tokio::fs::create_dir_all(&dir).await?;

        let run_id = Uuid::new_v4().simple().to_string();
        let script = dir.join(format!("script-{}.sh", run_id));
        let env_file = (!request.harvest.is_empty()).then(|| dir.join(env_file_name()));
        let kube_config = request
            .kube_config
            .as_ref()
            .map(|_| dir.join(format!("config-{}", run_id)));

        let files = RunFiles {
            dir,
            ephemeral,
            script,
            env_file,
            kube_config,
        };

        let written = async {
            if let (Some(path), Some(document)) = (&files.kube_config, &request.kube_config) {
                tokio::fs::write(path, document).await?;
            }
            tokio::fs::write(&files.script, self.render(request, files.env_file.as_deref())).await
        }
        .await;
        if let Err(e) = written {
            files.cleanup().await;
            return Err(e);
        }
        Ok(files)
    }

    async fn run(
        &self,
        request: &ScriptRequest,
        files: &RunFiles,
        logger: &ExecutionLogger,
    ) -> ExecutionStatus {
        let mut command = Command::new(&self.settings.shell);
        command
            .arg(&files.script)
            .current_dir(&files.dir)
            .envs(&request.environment)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(kube_config) = &files.kube_config {
            command.env("KUBECONFIG", kube_config);
        }

        tracing::debug!(
            execution_id = %request.execution_id,
            script = %files.script.display(),
            "Starting local script"
        );

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                logger.error(format!("Failed to start {}: {}", self.settings.shell, e));
                return ExecutionStatus::Failure;
            }
        };

        let stdout = child
            .stdout
            .take()
            .map(|out| tokio::spawn(forward_lines(out, logger.clone(), LogLevel::Info)));
        let stderr = child
            .stderr
            .take()
            .map(|err| tokio::spawn(forward_lines(err, logger.clone(), LogLevel::Error)));

        let exit = child.wait().await;

        for task in [stdout, stderr].into_iter().flatten() {
            if let Err(e) = task.await {
                tracing::debug!("Output forwarder ended abnormally: {}", e);
            }
        }

        match exit {
            Ok(status) => match status.code() {
                Some(code) => {
                    if code != 0 {
                        logger.error(format!("Script exited with status {}", code));
                    }
                    ExecutionStatus::from_exit_code(i64::from(code))
                }
                None => {
                    logger.error("Script was terminated by a signal");
                    ExecutionStatus::Failure
                }
            },
            Err(e) => {
                logger.error(format!("Failed to wait for script: {}", e));
                ExecutionStatus::Failure
            }
        }
    }
}

async fn forward_lines<R>(reader: R, logger: ExecutionLogger, level: LogLevel)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut raw = Vec::new();
    loop {
        raw.clear();
        match reader.read_until(b'\n', &mut raw).await {
            Ok(0) => break,
            Ok(_) => {
                let line = raw.strip_suffix(b"\n").unwrap_or(&raw);
                let line = line.strip_suffix(b"\r").unwrap_or(line);
                let line = String::from_utf8_lossy(line).into_owned();
                match level {
                    LogLevel::Error => logger.error(line),
                    LogLevel::Warn => logger.warn(line),
                    LogLevel::Info => logger.info(line),
                }
            }
            Err(e) => {
                tracing::debug!("Script output read failed: {}", e);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dlg_core::traits::MemoryLogSink;

    fn executor(root: &Path) -> (LocalScriptExecutor, Arc<MemoryLogSink>) {
        let sink = Arc::new(MemoryLogSink::new());
        let settings = ScriptSection {
            working_root: root.to_path_buf(),
            ..Default::default()
        };
        (LocalScriptExecutor::new(sink.clone(), settings), sink)
    }

    #[test]
    fn test_escape_for_double_quotes() {
        assert_eq!(
            escape_for_double_quotes(r#"Write-Host "$env:HOME""#),
            r#"Write-Host \"\$env:HOME\""#
        );
    }

    #[test]
    fn test_powershell_shim() {
        assert_eq!(
            powershell_shim("pwsh", "$x = 1"),
            "pwsh -Command \"& { \\$x = 1 }\"\n"
        );
    }

    #[tokio::test]
    async fn test_stdout_and_stderr_levels() {
        let root = tempfile::tempdir().unwrap();
        let (executor, sink) = executor(root.path());
        let request = ScriptRequest::new("exec-1", "echo hello\necho oops >&2\n");

        let outcome = executor.execute(&request).await.unwrap();
        assert_eq!(outcome.status, ExecutionStatus::Success);

        let entries = sink.entries();
        assert!(entries
            .iter()
            .any(|(_, l)| l.log_line == "hello" && l.log_level == LogLevel::Info));
        assert!(entries
            .iter()
            .any(|(_, l)| l.log_line == "oops" && l.log_level == LogLevel::Error));
        assert_eq!(sink.final_status(), Some(ExecutionStatus::Success));
        assert_eq!(entries[0].1.host_name, LOCAL_HOST);
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_failure() {
        let root = tempfile::tempdir().unwrap();
        let (executor, sink) = executor(root.path());

        let outcome = executor
            .execute(&ScriptRequest::new("exec-2", "exit 3"))
            .await
            .unwrap();
        assert_eq!(outcome.status, ExecutionStatus::Failure);
        assert!(sink.lines().iter().any(|l| l == "Script exited with status 3"));
    }

    #[tokio::test]
    async fn test_harvest_and_ephemeral_cleanup() {
        let root = tempfile::tempdir().unwrap();
        let (executor, _) = executor(root.path());
        let mut request = ScriptRequest::new("exec-3", "export VERSION=1.4.0\nARTIFACT=app.jar\nfalse");
        request.harvest = vec!["VERSION".to_string(), "ARTIFACT".to_string()];

        let outcome = executor.execute(&request).await.unwrap();
        assert_eq!(outcome.status, ExecutionStatus::Failure);
        assert_eq!(outcome.harvested["VERSION"], "1.4.0");
        assert_eq!(outcome.harvested["ARTIFACT"], "app.jar");

        let leftovers: Vec<_> = std::fs::read_dir(root.path()).unwrap().collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_persistent_directory_keeps_other_files() {
        let root = tempfile::tempdir().unwrap();
        let workdir = tempfile::tempdir().unwrap();
        std::fs::write(workdir.path().join("keep.txt"), "x").unwrap();
        let (executor, sink) = executor(root.path());

        let mut request = ScriptRequest::new("exec-4", "cat \"$KUBECONFIG\"\necho made > out.txt");
        request.working_directory = Some(workdir.path().to_path_buf());
        request.kube_config = Some("apiVersion: v1".to_string());
        request.harvest = vec!["HOME".to_string()];

        let outcome = executor.execute(&request).await.unwrap();
        assert_eq!(outcome.status, ExecutionStatus::Success);
        assert!(sink.lines().iter().any(|l| l == "apiVersion: v1"));

        let mut names: Vec<String> = std::fs::read_dir(workdir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["keep.txt", "out.txt"]);
    }

    #[tokio::test]
    async fn test_environment_is_passed() {
        let root = tempfile::tempdir().unwrap();
        let (executor, sink) = executor(root.path());
        let mut request = ScriptRequest::new("exec-5", "echo \"target=$TARGET\"");
        request
            .environment
            .insert("TARGET".to_string(), "prod".to_string());

        executor.execute(&request).await.unwrap();
        assert!(sink.lines().iter().any(|l| l == "target=prod"));
    }

    #[tokio::test]
    async fn test_missing_shell_is_failure() {
        let root = tempfile::tempdir().unwrap();
        let sink = Arc::new(MemoryLogSink::new());
        let settings = ScriptSection {
            working_root: root.path().to_path_buf(),
            shell: "/nonexistent/shell".to_string(),
            ..Default::default()
        };
        let executor = LocalScriptExecutor::new(sink.clone(), settings);

        let outcome = executor
            .execute(&ScriptRequest::new("exec-6", "true"))
            .await
            .unwrap();
        assert_eq!(outcome.status, ExecutionStatus::Failure);
        assert_eq!(sink.final_status(), Some(ExecutionStatus::Failure));
    }
}
