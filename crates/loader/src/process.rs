//! Child-process helpers for the tool-driven loaders.
//!
//! Every child is spawned with `kill_on_drop`, so aborting a load (Ctrl-C, a
//! failed sibling task) never leaves an importer running.

use std::collections::VecDeque;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::info;

/// How many trailing output lines are kept for error messages.
const TAIL_LINES: usize = 50;

/// Exit status and captured output of a finished child.
#[derive(Clone, Debug, Default)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// stdout and stderr joined, for "did it mention X" checks.
    pub fn combined(&self) -> String {
        format!("{}\n{}", self.stdout, self.stderr)
    }
}

/// Splits a configured command line into its program and leading arguments.
pub fn split_command(command: &[String]) -> std::io::Result<(String, Vec<String>)> {
    match command.split_first() {
        Some((program, leading)) => Ok((program.clone(), leading.to_vec())),
        None => Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "empty command line",
        )),
    }
}

/// Runs a command to completion and captures its output.
///
/// `envs` are added to the inherited environment; secrets go here rather than
/// on the command line, where any local user can read them.
pub async fn run_captured(
    program: &str,
    args: &[String],
    envs: &[(&str, String)],
) -> std::io::Result<CommandOutput> {
    run_with_stdin(program, args, envs, Stdio::null()).await
}

/// Runs a command with `stdin` attached and captures its output.
pub async fn run_with_stdin(
    program: &str,
    args: &[String],
    envs: &[(&str, String)],
    stdin: Stdio,
) -> std::io::Result<CommandOutput> {
    let output = Command::new(program)
        .args(args)
        .envs(envs.iter().map(|(k, v)| (*k, v.as_str())))
        .stdin(stdin)
        .kill_on_drop(true)
        .output()
        .await?;

    Ok(CommandOutput {
        success: output.status.success(),
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Runs a command, forwarding each output line to the log as it arrives.
///
/// Only the last lines of each stream are returned.
pub async fn run_logged(
    program: &str,
    args: &[String],
    label: &str,
) -> std::io::Result<CommandOutput> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let (stdout, stderr) = tokio::join!(forward_lines(stdout, label), forward_lines(stderr, label));
    let status = child.wait().await?;

    Ok(CommandOutput {
        success: status.success(),
        code: status.code(),
        stdout,
        stderr,
    })
}

async fn forward_lines<R>(reader: Option<R>, label: &str) -> String
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return String::new();
    };

    let mut tail = VecDeque::with_capacity(TAIL_LINES);
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        info!("[{label}] {line}");
        if tail.len() == TAIL_LINES {
            tail.pop_front();
        }
        tail.push_back(line);
    }

    tail.into_iter().collect::<Vec<_>>().join("\n")
}
