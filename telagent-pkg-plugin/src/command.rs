use crate::error::{Error, Result};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Runs `program` with `args` and returns stdout followed by stderr.
///
/// The child is killed when `timeout` elapses or when the returned future is dropped, so
/// cancelling a scan does not leave package manager processes behind.
pub async fn run(program: &str, args: &[&str], timeout: Duration) -> Result<String> {
    debug!(cmd = %format!("{} {}", program, args.join(" ")), "executing command");

    let mut command = Command::new(program);
    command.args(args).stdin(Stdio::null()).kill_on_drop(true);

    let output = match tokio::time::timeout(timeout, command.output()).await {
        Ok(output) => output.map_err(|source| Error::CommandSpawn {
            program: program.to_string(),
            source,
        })?,
        Err(_) => {
            return Err(Error::CommandTimeout {
                program: program.to_string(),
                timeout,
            })
        }
    };

    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));

    if !output.status.success() {
        debug!(output = %text, "cmd output");
        return Err(Error::CommandFailed {
            program: program.to_string(),
            code: output.status.code(),
            output: text,
        });
    }
    Ok(text)
}
