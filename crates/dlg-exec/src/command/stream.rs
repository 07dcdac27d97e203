//! Streaming a running command's output into the log sink

use std::time::Duration;

use dlg_protocol::{is_sudo_prompt, LineSplitter};

use crate::log::ExecutionLogger;
use crate::session::{ChannelEvent, ExecChannel};

/// Limits applied while streaming one command
#[derive(Debug, Clone, Copy)]
pub struct StreamSettings {
    /// How long to wait for output before re-checking a held prompt
    pub poll_interval: Duration,
    /// Ceiling on bytes read from the command
    pub max_output_bytes: u64,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            max_output_bytes: dlg_core::config::DEFAULT_MAX_OUTPUT_BYTES,
        }
    }
}

/// How a streamed command ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// The channel closed
    Closed { exit_status: Option<u32> },
    /// Output exceeded the byte ceiling
    OutputLimitExceeded,
}

/// Answers `[sudo] password for ...:` prompts
struct PromptResponder<'a> {
    password: Option<&'a str>,
    /// The held fragment already got its answer
    answered_pending: bool,
    warned: bool,
}

impl<'a> PromptResponder<'a> {
    fn new(password: Option<&'a str>) -> Self {
        Self {
            password,
            answered_pending: false,
            warned: false,
        }
    }

    /// A complete line arrived
    async fn on_line(
        &mut self,
        line: &str,
        channel: &mut dyn ExecChannel,
        logger: &ExecutionLogger,
    ) {
        if std::mem::take(&mut self.answered_pending) {
            // The prompt was answered while it was still a fragment.
            return;
        }
        if is_sudo_prompt(line) {
            self.answer(channel, logger).await;
        }
    }

    /// The incomplete trailing fragment changed
    async fn on_pending(
        &mut self,
        pending: Option<&str>,
        channel: &mut dyn ExecChannel,
        logger: &ExecutionLogger,
    ) {
        if self.answered_pending {
            return;
        }
        if pending.is_some_and(is_sudo_prompt) {
            self.answered_pending = true;
            self.answer(channel, logger).await;
        }
    }

    async fn answer(&mut self, channel: &mut dyn ExecChannel, logger: &ExecutionLogger) {
        let Some(password) = self.password else {
            if !self.warned {
                self.warned = true;
                logger.warn("Password prompt detected but no sudo password is configured");
            }
            return;
        };
        let mut reply = Vec::with_capacity(password.len() + 1);
        reply.extend_from_slice(password.as_bytes());
        reply.push(b'\n');
        if let Err(e) = channel.write(&reply).await {
            logger.error(format!("Failed to answer password prompt: {}", e));
        }
    }
}

/// Read the channel until it closes, logging each line as it completes
pub async fn stream_output(
    channel: &mut dyn ExecChannel,
    logger: &ExecutionLogger,
    sudo_password: Option<&str>,
    settings: StreamSettings,
) -> StreamEnd {
    let mut splitter = LineSplitter::new();
    let mut responder = PromptResponder::new(sudo_password);
    let mut total: u64 = 0;

    loop {
        let event = match tokio::time::timeout(settings.poll_interval, channel.next_event()).await {
            Ok(event) => event,
            Err(_) => {
                let pending = splitter.pending().map(|p| p.into_owned());
                responder
                    .on_pending(pending.as_deref(), channel, logger)
                    .await;
                continue;
            }
        };

        match event {
            ChannelEvent::Data(data) => {
                total = total.saturating_add(data.len() as u64);
                if total > settings.max_output_bytes {
                    if let Some(fragment) = splitter.finish() {
                        logger.info(fragment);
                    }
                    return StreamEnd::OutputLimitExceeded;
                }

                for line in splitter.push(&data) {
                    responder.on_line(&line, channel, logger).await;
                    logger.info(line);
                }
                let pending = splitter.pending().map(|p| p.into_owned());
                responder
                    .on_pending(pending.as_deref(), channel, logger)
                    .await;
            }
            ChannelEvent::Closed { exit_status } => {
                if let Some(fragment) = splitter.finish() {
                    logger.info(fragment);
                }
                return StreamEnd::Closed { exit_status };
            }
        }
    }
}

/// Collect a short command's whole output without logging it
pub async fn collect_output(channel: &mut dyn ExecChannel, limit: u64) -> (String, Option<u32>) {
    let mut buffer = Vec::new();
    loop {
        match channel.next_event().await {
            ChannelEvent::Data(data) => {
                if (buffer.len() + data.len()) as u64 <= limit {
                    buffer.extend_from_slice(&data);
                }
            }
            ChannelEvent::Closed { exit_status } => {
                return (String::from_utf8_lossy(&buffer).into_owned(), exit_status);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use bytes::Bytes;
    use dlg_core::traits::MemoryLogSink;
    use tokio::time::Instant;

    use crate::session::RemoteSession;
    use crate::testing::{Script, ScriptedSession};

    fn logger(sink: &Arc<MemoryLogSink>) -> ExecutionLogger {
        ExecutionLogger::new(sink.clone(), "acc", "app", "exec-1", "Run", "web-1")
    }

    async fn run(
        chunks: &[&str],
        password: Option<&str>,
        max_output_bytes: u64,
    ) -> (StreamEnd, Vec<String>, Vec<u8>) {
        let session = ScriptedSession::new();
        session.push_script(Script::new(chunks, 0));
        let mut channel = session.open_exec("cmd", true).await.unwrap();
        let sink = Arc::new(MemoryLogSink::new());
        let settings = StreamSettings {
            poll_interval: Duration::from_millis(50),
            max_output_bytes,
        };
        let end = stream_output(channel.as_mut(), &logger(&sink), password, settings).await;
        (end, sink.lines(), session.stdin())
    }

    #[tokio::test]
    async fn test_lines_split_across_chunks() {
        let (end, lines, _) = run(&["hel", "lo\nwor", "ld\r\npartial"], None, u64::MAX).await;
        assert_eq!(end, StreamEnd::Closed { exit_status: Some(0) });
        assert_eq!(lines, vec!["hello", "world", "partial"]);
    }

    #[tokio::test]
    async fn test_sudo_prompt_answered_once_and_logged_once() {
        let (_, lines, stdin) = run(
            &["[sudo] password for deploy: ", "\n", "installed\n"],
            Some("s3cret"),
            u64::MAX,
        )
        .await;
        assert_eq!(stdin, b"s3cret\n");
        assert_eq!(lines, vec!["[sudo] password for deploy: ", "installed"]);
    }

    #[tokio::test]
    async fn test_sudo_prompt_on_complete_line() {
        let (_, lines, stdin) = run(
            &["[sudo] password for deploy: \nok\n"],
            Some("pw"),
            u64::MAX,
        )
        .await;
        assert_eq!(stdin, b"pw\n");
        assert_eq!(lines.len(), 2);
    }

    #[tokio::test]
    async fn test_two_prompts_get_two_answers() {
        let (_, _, stdin) = run(
            &[
                "[sudo] password for deploy: ",
                "\nSorry, try again.\n",
                "[sudo] password for deploy: ",
                "\n",
            ],
            Some("pw"),
            u64::MAX,
        )
        .await;
        assert_eq!(stdin, b"pw\npw\n");
    }

    #[tokio::test]
    async fn test_prompt_without_password_is_not_answered() {
        let (_, lines, stdin) = run(&["[sudo] password for deploy: \n"], None, u64::MAX).await;
        assert!(stdin.is_empty());
        assert!(lines[0].contains("no sudo password"));
    }

    #[tokio::test]
    async fn test_output_cap_aborts() {
        let (end, _, _) = run(&["0123456789", "0123456789"], None, 15).await;
        assert_eq!(end, StreamEnd::OutputLimitExceeded);
    }

    /// Prints a prompt with no newline, then stays silent until stdin is
    /// written (or until `give_up_at`), then stays silent for `verify_delay`.
    struct WaitingPromptChannel {
        prompt: Option<Bytes>,
        rest: VecDeque<Bytes>,
        verify_delay: Duration,
        give_up_at: Option<Instant>,
        resume_at: Option<Instant>,
        stdin: Arc<Mutex<Vec<u8>>>,
        writes: Arc<Mutex<usize>>,
    }

    impl WaitingPromptChannel {
        fn new(rest: &[&str], verify_delay: Duration, give_up_after: Option<Duration>) -> Self {
            Self {
                prompt: Some(Bytes::from_static(b"[sudo] password for deploy: ")),
                rest: rest.iter().map(|c| Bytes::copy_from_slice(c.as_bytes())).collect(),
                verify_delay,
                give_up_at: give_up_after.map(|d| Instant::now() + d),
                resume_at: None,
                stdin: Arc::default(),
                writes: Arc::default(),
            }
        }
    }

    #[async_trait]
    impl ExecChannel for WaitingPromptChannel {
        async fn next_event(&mut self) -> ChannelEvent {
            if let Some(prompt) = self.prompt.take() {
                return ChannelEvent::Data(prompt);
            }
            match self.resume_at.or(self.give_up_at) {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
            match self.rest.pop_front() {
                Some(chunk) => ChannelEvent::Data(chunk),
                None => ChannelEvent::Closed {
                    exit_status: Some(0),
                },
            }
        }

        async fn write(&mut self, data: &[u8]) -> std::io::Result<()> {
            self.stdin.lock().unwrap().extend_from_slice(data);
            *self.writes.lock().unwrap() += 1;
            self.resume_at
                .get_or_insert_with(|| Instant::now() + self.verify_delay);
            Ok(())
        }

        async fn close(&mut self) {}
    }

    #[tokio::test(start_paused = true)]
    async fn test_prompt_waiting_for_input_answered_once() {
        let mut channel =
            WaitingPromptChannel::new(&["\n", "installed\n"], Duration::from_secs(5), None);
        let stdin = Arc::clone(&channel.stdin);
        let writes = Arc::clone(&channel.writes);
        let sink = Arc::new(MemoryLogSink::new());
        let settings = StreamSettings {
            poll_interval: Duration::from_secs(1),
            max_output_bytes: u64::MAX,
        };

        let end = stream_output(&mut channel, &logger(&sink), Some("s3cret"), settings).await;

        assert_eq!(end, StreamEnd::Closed { exit_status: Some(0) });
        assert_eq!(*writes.lock().unwrap(), 1);
        assert_eq!(*stdin.lock().unwrap(), b"s3cret\n");
        assert_eq!(sink.lines(), vec!["[sudo] password for deploy: ", "installed"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_prompt_waiting_without_password_warns_once() {
        let mut channel = WaitingPromptChannel::new(
            &["\n"],
            Duration::ZERO,
            Some(Duration::from_secs(4)),
        );
        let writes = Arc::clone(&channel.writes);
        let sink = Arc::new(MemoryLogSink::new());
        let settings = StreamSettings {
            poll_interval: Duration::from_secs(1),
            max_output_bytes: u64::MAX,
        };

        stream_output(&mut channel, &logger(&sink), None, settings).await;

        assert_eq!(*writes.lock().unwrap(), 0);
        let lines = sink.lines();
        assert_eq!(
            lines.iter().filter(|l| l.contains("no sudo password")).count(),
            1
        );
        assert_eq!(lines.last().map(String::as_str), Some("[sudo] password for deploy: "));
    }
}
