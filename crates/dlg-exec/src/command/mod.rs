//! Remote command execution and file push over cached sessions

mod harvest;
mod stream;

pub use harvest::{
    check_variable_names, env_file_name, is_valid_variable_name, parse_env_output,
    powershell_suffix, shell_suffix, ENV_FILE_PREFIX,
};
pub use stream::{collect_output, stream_output, StreamEnd, StreamSettings};

use std::collections::HashMap;
use std::sync::Arc;

use dlg_core::config::RemoteSection;
use dlg_core::traits::LogSink;
use dlg_core::ExecutionStatus;
use dlg_protocol::{shell_quote, sink_command, ProtocolError, ScpMessage};

use crate::descriptor::SessionDescriptor;
use crate::error::ExecError;
use crate::log::ExecutionLogger;
use crate::scp::{push_file, FileProvider};
use crate::session::{RemoteSession, SessionCache};

/// Directory used for the variable dump when the descriptor names none
const DEFAULT_REMOTE_DIR: &str = "/tmp";

/// Upper bound on the size of a variable dump read back
const MAX_ENV_DUMP_BYTES: u64 = 1024 * 1024;

/// Terminal status of a command plus its harvested variables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub status: ExecutionStatus,
    pub harvested: HashMap<String, String>,
}

impl CommandOutcome {
    fn failure() -> Self {
        Self {
            status: ExecutionStatus::Failure,
            harvested: HashMap::new(),
        }
    }
}

/// Runs commands and transfers over sessions from a [`SessionCache`]
pub struct CommandExecutor {
    cache: Arc<SessionCache>,
    sink: Arc<dyn LogSink>,
    settings: StreamSettings,
}

impl CommandExecutor {
    pub fn new(
        cache: Arc<SessionCache>,
        sink: Arc<dyn LogSink>,
        settings: StreamSettings,
    ) -> Self {
        Self {
            cache,
            sink,
            settings,
        }
    }

    /// Executor using the streaming limits from the `[remote]` section
    pub fn from_config(
        cache: Arc<SessionCache>,
        sink: Arc<dyn LogSink>,
        remote: &RemoteSection,
    ) -> Self {
        Self::new(
            cache,
            sink,
            StreamSettings {
                poll_interval: remote.poll_interval(),
                max_output_bytes: remote.max_output_bytes,
            },
        )
    }

    pub fn cache(&self) -> &Arc<SessionCache> {
        &self.cache
    }

    /// Run `command` on the descriptor's host and harvest `harvest` variables.
    ///
    /// Connection, authentication and output failures end in
    /// [`ExecutionStatus::Failure`] with log lines. Only invalid variable
    /// names are returned as errors.
    pub async fn execute_command(
        &self,
        descriptor: &SessionDescriptor,
        command: &str,
        harvest: &[String],
    ) -> Result<CommandOutcome, ExecError> {
        check_variable_names(harvest)?;
        let logger = ExecutionLogger::for_descriptor(Arc::clone(&self.sink), descriptor);

        let Some(session) = self.acquire(descriptor, &logger).await else {
            logger.finish(ExecutionStatus::Failure, "Command execution failed");
            return Ok(CommandOutcome::failure());
        };

        let remote_dir = descriptor
            .working_directory()
            .unwrap_or(DEFAULT_REMOTE_DIR)
            .trim_end_matches('/');
        let env_file =
            (!harvest.is_empty()).then(|| format!("{}/{}", remote_dir, env_file_name()));

        let mut full_command = match descriptor.working_directory() {
            Some(dir) => format!("cd {} && {}", shell_quote(dir), command),
            None => command.to_string(),
        };
        if let Some(env_file) = &env_file {
            full_command.push_str(&shell_suffix(harvest, env_file));
        }

        let mut channel = match session.open_exec(&full_command, true).await {
            Ok(channel) => channel,
            Err(e) => {
                logger.error(e.human_message());
                logger.finish(ExecutionStatus::Failure, "Command execution failed");
                return Ok(CommandOutcome::failure());
            }
        };

        let end = stream_output(
            channel.as_mut(),
            &logger,
            descriptor.sudo_password(),
            self.settings,
        )
        .await;
        channel.close().await;

        let status = match end {
            StreamEnd::Closed {
                exit_status: Some(0),
            } => ExecutionStatus::Success,
            StreamEnd::Closed { exit_status } => {
                match exit_status {
                    Some(code) => logger.error(format!("Command exited with status {}", code)),
                    None => logger.error("Command ended without an exit status"),
                }
                ExecutionStatus::Failure
            }
            StreamEnd::OutputLimitExceeded => {
                logger.error(format!(
                    "Unknown error: command output exceeded {} bytes",
                    self.settings.max_output_bytes
                ));
                ExecutionStatus::Failure
            }
        };

        let harvested = match &env_file {
            Some(env_file) if !matches!(end, StreamEnd::OutputLimitExceeded) => {
                self.read_env_file(session.as_ref(), env_file, harvest, &logger)
                    .await
            }
            _ => HashMap::new(),
        };

        logger.finish(status, format!("Command execution finished with status {}", status));
        Ok(CommandOutcome { status, harvested })
    }

    /// Push one file into `destination_dir` on the descriptor's host
    pub async fn scp_one_file(
        &self,
        descriptor: &SessionDescriptor,
        destination_dir: &str,
        provider: &dyn FileProvider,
    ) -> Result<ExecutionStatus, ExecError> {
        ScpMessage::file(provider.name(), provider.size())
            .map_err(|e| ExecError::InvalidSource(e.to_string()))?;
        let logger = ExecutionLogger::for_descriptor(Arc::clone(&self.sink), descriptor);

        let Some(session) = self.acquire(descriptor, &logger).await else {
            logger.finish(ExecutionStatus::Failure, "File transfer failed");
            return Ok(ExecutionStatus::Failure);
        };

        logger.info(format!(
            "Begin file transfer {} to {}:{}",
            provider.name(),
            descriptor.host(),
            destination_dir
        ));

        let stream = match session.open_exec_stream(&sink_command(destination_dir)).await {
            Ok(stream) => stream,
            Err(e) => {
                logger.error(e.human_message());
                logger.finish(ExecutionStatus::Failure, "File transfer failed");
                return Ok(ExecutionStatus::Failure);
            }
        };

        match push_file(stream, provider).await {
            Ok(sent) => {
                logger.info(format!("{} bytes transferred", sent));
                logger.finish(ExecutionStatus::Success, "File successfully transferred");
                Ok(ExecutionStatus::Success)
            }
            Err(ProtocolError::Remote(message)) => {
                logger.error(message);
                logger.finish(ExecutionStatus::Failure, "File transfer failed");
                Ok(ExecutionStatus::Failure)
            }
            Err(e) => {
                logger.error(e.to_string());
                logger.finish(ExecutionStatus::Failure, "File transfer failed");
                Ok(ExecutionStatus::Failure)
            }
        }
    }

    /// Drop the cached session for an execution on a host
    pub async fn evict(&self, execution_id: &str, host: &str) -> bool {
        self.cache.evict(execution_id, host).await
    }

    async fn acquire(
        &self,
        descriptor: &SessionDescriptor,
        logger: &ExecutionLogger,
    ) -> Option<Arc<dyn RemoteSession>> {
        match self.cache.get_or_connect(descriptor).await {
            Ok(session) => {
                logger.info(format!(
                    "Connected to {} as {}",
                    descriptor.address(),
                    if descriptor.user().is_empty() {
                        "default user"
                    } else {
                        descriptor.user()
                    }
                ));
                Some(session)
            }
            Err(e) => {
                tracing::warn!(
                    host = %descriptor.host(),
                    execution_id = %descriptor.execution_id(),
                    "Session setup failed: {}",
                    e
                );
                logger.error(e.human_message());
                None
            }
        }
    }

    async fn read_env_file(
        &self,
        session: &dyn RemoteSession,
        env_file: &str,
        names: &[String],
        logger: &ExecutionLogger,
    ) -> HashMap<String, String> {
        let command = format!("cat {file} && rm -f {file}", file = shell_quote(env_file));
        let mut channel = match session.open_exec(&command, false).await {
            Ok(channel) => channel,
            Err(e) => {
                logger.warn(format!("Unable to read environment variables: {}", e.human_message()));
                return HashMap::new();
            }
        };
        let (output, exit_status) = collect_output(channel.as_mut(), MAX_ENV_DUMP_BYTES).await;
        channel.close().await;

        if exit_status != Some(0) {
            logger.warn("Environment variable output was not produced");
            return HashMap::new();
        }
        parse_env_output(&output, names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use dlg_core::traits::MemoryLogSink;
    use dlg_core::LogLevel;

    use crate::scp::{sink, BytesFileProvider};
    use crate::session::SessionConnector;
    use crate::testing::{FakeConnector, Script, ScriptedSession};

    struct Fixture {
        connector: Arc<FakeConnector>,
        sink: Arc<MemoryLogSink>,
        executor: CommandExecutor,
    }

    fn fixture() -> Fixture {
        let connector = Arc::new(FakeConnector::new());
        let sink = Arc::new(MemoryLogSink::new());
        let cache = Arc::new(SessionCache::new(
            Arc::clone(&connector) as Arc<dyn SessionConnector>,
            Duration::from_secs(5),
        ));
        let executor = CommandExecutor::new(
            cache,
            sink.clone(),
            StreamSettings {
                poll_interval: Duration::from_millis(20),
                max_output_bytes: 1024,
            },
        );
        Fixture {
            connector,
            sink,
            executor,
        }
    }

    fn descriptor() -> SessionDescriptor {
        SessionDescriptor::builder("exec-1", "web-1")
            .account_id("acc")
            .user("deploy")
            .command_unit_name("Install")
            .working_directory("/opt/app")
            .build()
    }

    #[tokio::test]
    async fn test_successful_command() {
        let f = fixture();
        let session = Arc::new(ScriptedSession::new());
        session.push_script(Script::new(&["installing\n", "done\n"], 0));
        f.connector.prepare(session.clone());

        let outcome = f
            .executor
            .execute_command(&descriptor(), "./install.sh", &[])
            .await
            .unwrap();

        assert_eq!(outcome.status, ExecutionStatus::Success);
        assert!(outcome.harvested.is_empty());
        assert_eq!(session.commands(), vec!["cd '/opt/app' && ./install.sh"]);
        assert!(f.sink.lines().contains(&"installing".to_string()));
        assert_eq!(f.sink.final_status(), Some(ExecutionStatus::Success));
        assert_eq!(session.channels_closed.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_working_directory_is_shell_quoted() {
        let f = fixture();
        let session = Arc::new(ScriptedSession::new());
        f.connector.prepare(session.clone());
        let descriptor = SessionDescriptor::builder("exec-1", "web-1")
            .working_directory("/srv/o'neil app")
            .build();

        f.executor
            .execute_command(&descriptor, "ls", &[])
            .await
            .unwrap();
        assert_eq!(session.commands(), vec![r"cd '/srv/o'\''neil app' && ls"]);
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_failure() {
        let f = fixture();
        let session = Arc::new(ScriptedSession::new());
        session.push_script(Script::new(&["boom\n"], 2));
        f.connector.prepare(session);

        let outcome = f
            .executor
            .execute_command(&descriptor(), "false", &[])
            .await
            .unwrap();
        assert_eq!(outcome.status, ExecutionStatus::Failure);
        assert_eq!(f.sink.final_status(), Some(ExecutionStatus::Failure));
    }

    #[tokio::test]
    async fn test_harvest_reads_env_file() {
        let f = fixture();
        let session = Arc::new(ScriptedSession::new());
        session.push_script(Script::new(&["built\n"], 0));
        session.push_script(Script::new(&["VERSION=4.2\nIGNORED=1\n"], 0));
        f.connector.prepare(session.clone());

        let outcome = f
            .executor
            .execute_command(&descriptor(), "make", &["VERSION".to_string()])
            .await
            .unwrap();

        assert_eq!(outcome.status, ExecutionStatus::Success);
        assert_eq!(outcome.harvested.len(), 1);
        assert_eq!(outcome.harvested["VERSION"], "4.2");

        let commands = session.commands();
        assert!(commands[0].contains(&format!("}} > '/opt/app/{}", ENV_FILE_PREFIX)));
        assert!(commands[1].starts_with(&format!("cat '/opt/app/{}", ENV_FILE_PREFIX)));
    }

    #[tokio::test]
    async fn test_invalid_harvest_name_is_rejected() {
        let f = fixture();
        let result = f
            .executor
            .execute_command(&descriptor(), "true", &["NOT VALID".to_string()])
            .await;
        assert!(matches!(result, Err(ExecError::InvalidVariableName(_))));
        assert_eq!(f.connector.connects(), 0);
    }

    #[tokio::test]
    async fn test_connection_failure_is_logged_not_raised() {
        let f = fixture();
        f.connector
            .refuse
            .store(true, std::sync::atomic::Ordering::SeqCst);

        let outcome = f
            .executor
            .execute_command(&descriptor(), "true", &[])
            .await
            .unwrap();
        assert_eq!(outcome.status, ExecutionStatus::Failure);

        let entries = f.sink.entries();
        assert!(entries
            .iter()
            .any(|(_, log)| log.log_level == LogLevel::Error
                && log.log_line.starts_with("Unable to connect to remote host")));
    }

    #[tokio::test]
    async fn test_output_cap_is_unknown_error() {
        let f = fixture();
        let session = Arc::new(ScriptedSession::new());
        let big = "x".repeat(700);
        session.push_script(Script::new(&[big.as_str(), big.as_str()], 0));
        f.connector.prepare(session);

        let outcome = f
            .executor
            .execute_command(&descriptor(), "yes", &[])
            .await
            .unwrap();
        assert_eq!(outcome.status, ExecutionStatus::Failure);
        assert!(f.sink.lines().iter().any(|l| l.starts_with("Unknown error")));
    }

    #[tokio::test]
    async fn test_scp_one_file_success() {
        let f = fixture();
        let session = Arc::new(ScriptedSession::new());
        let (client, server) = tokio::io::duplex(256);
        session.push_stream(client);
        f.connector.prepare(session.clone());

        let remote = tokio::spawn(sink::run(server, None));
        let provider = BytesFileProvider::new("app.jar", vec![7u8; 1000]);
        let status = f
            .executor
            .scp_one_file(&descriptor(), "/opt/app", &provider)
            .await
            .unwrap();

        assert_eq!(status, ExecutionStatus::Success);
        assert_eq!(remote.await.unwrap().data, vec![7u8; 1000]);
        assert_eq!(session.commands(), vec!["mkdir -p '/opt/app' && scp -t '/opt/app'"]);
    }

    #[tokio::test]
    async fn test_scp_one_file_error_ack() {
        let f = fixture();
        let session = Arc::new(ScriptedSession::new());
        let (client, server) = tokio::io::duplex(256);
        session.push_stream(client);
        f.connector.prepare(session);

        let remote = tokio::spawn(sink::run(server, Some("scp: /opt/app: No space left on device")));
        let provider = BytesFileProvider::new("app.jar", vec![1u8; 10]);
        let status = f
            .executor
            .scp_one_file(&descriptor(), "/opt/app", &provider)
            .await
            .unwrap();
        remote.await.unwrap();

        assert_eq!(status, ExecutionStatus::Failure);
        assert!(f
            .sink
            .lines()
            .contains(&"scp: /opt/app: No space left on device".to_string()));
        assert_eq!(f.sink.final_status(), Some(ExecutionStatus::Failure));
    }

    #[tokio::test]
    async fn test_evict_forces_new_session() {
        let f = fixture();
        f.executor
            .execute_command(&descriptor(), "true", &[])
            .await
            .unwrap();
        assert!(f.executor.evict("exec-1", "web-1").await);
        f.executor
            .execute_command(&descriptor(), "true", &[])
            .await
            .unwrap();
        assert_eq!(f.connector.connects(), 2);
    }
}
