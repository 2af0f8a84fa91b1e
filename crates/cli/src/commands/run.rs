//! `taskmill run`: execute a batch of external commands

use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use taskmill_config::Settings;
use taskmill_core::{Error, Result};
use taskmill_task::{SlotReport, TaskScheduler, WorkUnit};
use taskmill_utils::RetryingExecutor;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

/// One entry of a batch file
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatchCommand {
    /// Label used in logs and in the report
    pub name: String,
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    /// Reuse a previous successful result with the same invocation
    #[serde(default = "default_cache")]
    pub cache: bool,
}

fn default_cache() -> bool {
    true
}

/// What identifies a command for caching purposes
#[derive(Debug, Clone, Serialize)]
struct Invocation {
    program: String,
    args: Vec<String>,
    /// Always absolute, so the same batch run from two directories differs
    cwd: PathBuf,
}

/// Captured result of a command that exited successfully
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

#[derive(Serialize)]
struct ReportEntry<'a> {
    name: &'a str,
    #[serde(flatten)]
    slot: SlotReport<'a, CommandOutput>,
}

pub fn parse_batch(text: &str) -> Result<Vec<BatchCommand>> {
    let commands: Vec<BatchCommand> = serde_json::from_str(text)
        .map_err(|e| Error::malformed_data(format!("invalid batch file: {e}")))?;

    for (index, command) in commands.iter().enumerate() {
        if command.program.trim().is_empty() {
            return Err(Error::malformed_data(format!(
                "batch entry {index} ('{}') has an empty program",
                command.name
            )));
        }
    }
    Ok(commands)
}

/// Working directory of a command, relative entries resolved against `base`
fn resolve_cwd(cwd: Option<&Path>, base: &Path) -> PathBuf {
    match cwd {
        Some(dir) if dir.is_absolute() => dir.to_path_buf(),
        Some(dir) => base.join(dir),
        None => base.to_path_buf(),
    }
}

async fn read_batch(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut text = String::new();
        tokio::io::stdin()
            .read_to_string(&mut text)
            .await
            .map_err(|e| Error::file_system("<stdin>", "read", e))?;
        return Ok(text);
    }

    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| Error::file_system(path, "read", e))
}

/// Spawn the command and wait for it, mapping failures onto classifiable errors
async fn run_command(invocation: &Invocation) -> Result<CommandOutput> {
    if !invocation.cwd.is_dir() {
        return Err(Error::missing_path(&invocation.cwd));
    }

    let mut command = Command::new(&invocation.program);
    command
        .args(&invocation.args)
        .current_dir(&invocation.cwd)
        .stdin(Stdio::null())
        .kill_on_drop(true);

    let output = command.output().await.map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => {
            Error::missing_dependency(&invocation.program, "program not found on PATH")
        }
        io::ErrorKind::PermissionDenied => {
            Error::permission_denied(format!("spawn '{}'", invocation.program), e.to_string())
        }
        _ => Error::command_execution(
            &invocation.program,
            invocation.args.clone(),
            e.to_string(),
            None,
        ),
    })?;

    let exit_code = output.status.code().unwrap_or(-1);
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    if !output.status.success() {
        let message = match stderr.trim() {
            "" => "no output on stderr".to_string(),
            text => text.to_string(),
        };
        return Err(Error::command_execution(
            &invocation.program,
            invocation.args.clone(),
            message,
            Some(exit_code),
        ));
    }

    Ok(CommandOutput {
        exit_code,
        stdout,
        stderr,
    })
}

fn build_unit<'a>(
    command: &BatchCommand,
    base: &Path,
    executor: &RetryingExecutor,
) -> Result<WorkUnit<'a, CommandOutput>> {
    let invocation = Invocation {
        program: command.program.clone(),
        args: command.args.clone(),
        cwd: resolve_cwd(command.cwd.as_deref(), base),
    };
    let name = command.name.clone();
    let executor = executor.clone();

    let unit = WorkUnit::new(
        command.name.clone(),
        invocation,
        move |invocation: Invocation| async move {
            executor.run(&name, || run_command(&invocation)).await
        },
    )?;

    Ok(if command.cache { unit } else { unit.uncached() })
}

pub async fn execute(settings: &Settings, batch: &Path) -> Result<()> {
    let text = read_batch(batch).await?;
    let commands = parse_batch(&text)?;

    let scheduler = TaskScheduler::from_settings(settings)?;
    let executor = RetryingExecutor::builder()
        .config(settings.retry.retry_config())
        .default_remediations(settings.retry.default_remediations())
        .build()?;

    let base = std::env::current_dir()
        .map_err(|e| Error::file_system(".", "get current directory", e))?;
    let units = commands
        .iter()
        .map(|command| build_unit(command, &base, &executor))
        .collect::<Result<Vec<_>>>()?;

    let result = scheduler.run(units).await?;

    let report: Vec<ReportEntry<'_>> = commands
        .iter()
        .zip(result.report())
        .map(|(command, slot)| ReportEntry {
            name: &command.name,
            slot,
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&report)?);

    tracing::info!(
        total = result.len(),
        failed = result.failures(),
        cached = result.cache_hits(),
        "batch finished"
    );

    if result.all_succeeded() {
        Ok(())
    } else {
        Err(Error::operation(
            "run",
            format!("{} of {} commands failed", result.failures(), result.len()),
        ))
    }
}
