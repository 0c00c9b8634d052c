use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::stream::Source;
use crate::types::ProcessOutcome;

/// One invocation of the external tool.
#[derive(Debug)]
pub struct Invocation {
    pub program: PathBuf,
    pub homedir: Option<PathBuf>,
    pub args: Vec<OsString>,
    /// Fed to stdin when present; stdin is closed otherwise.
    pub input: Option<Source>,
    pub timeout_secs: Option<u64>,
}

impl Invocation {
    pub fn new<I, S>(program: impl Into<PathBuf>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        Self {
            program: program.into(),
            homedir: None,
            args: args.into_iter().map(Into::into).collect(),
            input: None,
            timeout_secs: None,
        }
    }

    pub fn homedir(mut self, homedir: Option<PathBuf>) -> Self {
        self.homedir = homedir;
        self
    }

    pub fn input(mut self, input: Option<Source>) -> Self {
        self.input = input;
        self
    }

    pub fn timeout_secs(mut self, timeout_secs: Option<u64>) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

/// Runs the invocation to completion and collects both output channels.
///
/// Stdin is fed on a separate task while stdout and stderr are drained, so
/// large inputs cannot deadlock against a full output pipe. The outcome is
/// produced once, after the process has exited.
pub async fn invoke(invocation: Invocation) -> Result<ProcessOutcome> {
    match invocation.timeout_secs {
        Some(secs) => tokio::time::timeout(Duration::from_secs(secs), run_inner(invocation))
            .await
            .map_err(|_| Error::Timeout(secs))?,
        None => run_inner(invocation).await,
    }
}

async fn run_inner(invocation: Invocation) -> Result<ProcessOutcome> {
    let Invocation {
        program,
        homedir,
        args,
        input,
        ..
    } = invocation;

    let mut cmd = Command::new(&program);
    cmd.env("LC_ALL", "C");
    if let Some(dir) = &homedir {
        cmd.arg("--homedir").arg(dir);
    }
    cmd.args(&args)
        .stdin(if input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!(program = %program.display(), args = ?args, "spawning");
    let mut child = cmd.spawn()?;

    let feeder = match input {
        Some(source) => {
            let mut stdin = child.stdin.take().ok_or(Error::StdinCaptureFailed)?;
            Some(tokio::spawn(async move {
                let mut reader = source.into_reader().await?;
                tokio::io::copy(&mut reader, &mut stdin).await?;
                stdin.shutdown().await?;
                Ok::<_, Error>(())
            }))
        }
        None => None,
    };

    let output = child.wait_with_output().await?;

    if let Some(feeder) = feeder {
        match feeder.await {
            Ok(Ok(())) => {}
            Ok(Err(Error::Command(e))) if e.kind() == io::ErrorKind::BrokenPipe => {
                debug!("subprocess closed stdin before consuming all input");
            }
            Ok(Err(e)) => return Err(e),
            Err(e) => {
                warn!(error = %e, "stdin feeder task failed");
                return Err(Error::Command(io::Error::other(e)));
            }
        }
    }

    let outcome = ProcessOutcome {
        primary_text: String::from_utf8_lossy(&output.stdout).into_owned(),
        secondary_text: String::from_utf8_lossy(&output.stderr).into_owned(),
        exit_code: output.status.code().unwrap_or(-1),
    };

    debug!(
        exit_code = outcome.exit_code,
        stdout_bytes = output.stdout.len(),
        stderr_bytes = output.stderr.len(),
        "subprocess finished"
    );

    Ok(outcome)
}
