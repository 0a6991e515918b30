//! Step Process Runner
//!
//! Launches one external step script as a child process and exposes its
//! combined stdout/stderr as an ordered sequence of text lines plus a
//! final exit code. Knows nothing about workflow semantics.
//!
//! The interpreter is invoked with an unbuffered flag so lines arrive as
//! soon as the child flushes them. Undecodable output bytes are replaced
//! with U+FFFD instead of failing the step.

use std::io::{self, BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::mpsc::{sync_channel, SyncSender};
use std::thread;

use log::debug;
use thiserror::Error;

/// Flag passed to the interpreter to disable output buffering.
const UNBUFFERED_FLAG: &str = "-u";

/// Bound on in-flight output lines. Keeps production synchronous with
/// consumption instead of buffering a runaway child in memory.
const LINE_CHANNEL_BOUND: usize = 64;

/// Errors from launching or waiting on a step process.
///
/// Non-zero exit codes are not errors at this layer; the engine applies
/// the failure policy.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("script not found: {0}")]
    ScriptMissing(PathBuf),

    #[error("failed to launch '{interpreter}': {source}")]
    Launch {
        interpreter: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to wait for step process: {0}")]
    Wait(#[source] io::Error),

    #[error("step process terminated by a signal")]
    Terminated,
}

/// Launches step scripts through a configured interpreter.
///
/// Script paths resolve as `<scripts_dir>/<module>.<extension>`.
///
/// # Example
///
/// ```rust,no_run
/// use stepflow::execution::ScriptRunner;
///
/// let runner = ScriptRunner::new("python");
/// let code = runner.run("fetch_drop", |line| println!("{}", line))?;
/// assert_eq!(code, 0);
/// # Ok::<(), stepflow::execution::ProcessError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ScriptRunner {
    interpreter: PathBuf,
    scripts_dir: PathBuf,
    extension: String,
}

impl ScriptRunner {
    /// Creates a runner with the default `tasks/` scripts directory and
    /// `.py` extension.
    pub fn new(interpreter: impl Into<PathBuf>) -> Self {
        Self {
            interpreter: interpreter.into(),
            scripts_dir: PathBuf::from("tasks"),
            extension: "py".to_string(),
        }
    }

    /// Sets the directory scripts are resolved against.
    pub fn with_scripts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scripts_dir = dir.into();
        self
    }

    /// Sets the extension appended to module references.
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Resolves a module reference to its script path.
    pub fn resolve_script(&self, module: &str) -> PathBuf {
        self.scripts_dir
            .join(format!("{}.{}", module, self.extension))
    }

    /// Runs one step script to completion.
    ///
    /// Stdout and stderr are both captured and funneled line-by-line into
    /// `on_line` as one combined sequence, in arrival order. The call
    /// blocks until the child exits and returns its exit code.
    ///
    /// Only one step process exists at a time; the engine calls this
    /// sequentially from its single worker.
    pub fn run<F>(&self, module: &str, mut on_line: F) -> Result<i32, ProcessError>
    where
        F: FnMut(&str),
    {
        let script_path = self.resolve_script(module);
        if !script_path.exists() {
            return Err(ProcessError::ScriptMissing(script_path));
        }

        debug!(
            "Launching {} {} {}",
            self.interpreter.display(),
            UNBUFFERED_FLAG,
            script_path.display()
        );

        let mut command = Command::new(&self.interpreter);
        command
            .arg(UNBUFFERED_FLAG)
            .arg(&script_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        // Keep the child from popping up a console window of its own.
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            const CREATE_NO_WINDOW: u32 = 0x0800_0000;
            command.creation_flags(CREATE_NO_WINDOW);
        }

        let mut child = command.spawn().map_err(|source| ProcessError::Launch {
            interpreter: self.interpreter.display().to_string(),
            source,
        })?;

        let (tx, rx) = sync_channel::<String>(LINE_CHANNEL_BOUND);

        // stderr is merged into the stdout sequence by funneling both
        // readers into one channel; arrival order defines the combined
        // order. Senders drop at EOF, which ends the receive loop.
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let stdout_tx = tx;
        let stderr_tx = stdout_tx.clone();

        let stdout_reader = stdout.map(|out| thread::spawn(move || drain_lines(out, stdout_tx)));
        let stderr_reader = stderr.map(|err| thread::spawn(move || drain_lines(err, stderr_tx)));

        for line in rx {
            on_line(&line);
        }

        if let Some(handle) = stdout_reader {
            let _ = handle.join();
        }
        if let Some(handle) = stderr_reader {
            let _ = handle.join();
        }

        let status = child.wait().map_err(ProcessError::Wait)?;

        match status.code() {
            Some(code) => {
                debug!("Step process exited with code {}", code);
                Ok(code)
            }
            None => Err(ProcessError::Terminated),
        }
    }
}

/// Reads a stream to EOF, sending one decoded line per send.
///
/// Invalid UTF-8 is replaced, never propagated. A send only fails when
/// the consumer is gone, at which point draining stops.
fn drain_lines<R: Read>(stream: R, tx: SyncSender<String>) {
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&buf);
                let line = text.trim_end_matches(['\n', '\r']).to_string();
                if tx.send(line).is_err() {
                    break;
                }
            }
            Err(e) => {
                debug!("Output stream read ended: {}", e);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::{tempdir, TempDir};

    /// Shell-backed runner over a scratch scripts directory.
    fn sh_runner() -> (ScriptRunner, TempDir) {
        let temp_dir = tempdir().unwrap();
        let runner = ScriptRunner::new("sh")
            .with_scripts_dir(temp_dir.path())
            .with_extension("sh");
        (runner, temp_dir)
    }

    fn write_script(dir: &Path, module: &str, body: &str) {
        fs::write(dir.join(format!("{}.sh", module)), body).unwrap();
    }

    #[test]
    fn test_resolve_script() {
        let runner = ScriptRunner::new("python");
        assert_eq!(
            runner.resolve_script("fetch_drop"),
            PathBuf::from("tasks/fetch_drop.py")
        );
    }

    #[test]
    fn test_resolve_script_custom_dir_and_ext() {
        let runner = ScriptRunner::new("sh")
            .with_scripts_dir("/opt/steps")
            .with_extension("sh");
        assert_eq!(
            runner.resolve_script("clean"),
            PathBuf::from("/opt/steps/clean.sh")
        );
    }

    #[test]
    fn test_run_captures_lines_in_order() {
        let (runner, dir) = sh_runner();
        write_script(dir.path(), "greet", "echo one\necho two\necho three\n");

        let mut lines = Vec::new();
        let code = runner.run("greet", |line| lines.push(line.to_string())).unwrap();

        assert_eq!(code, 0);
        assert_eq!(lines, vec!["one", "two", "three"]);
    }

    #[test]
    fn test_run_returns_nonzero_exit_code() {
        let (runner, dir) = sh_runner();
        write_script(dir.path(), "boom", "exit 7\n");

        let code = runner.run("boom", |_| {}).unwrap();
        assert_eq!(code, 7);
    }

    #[test]
    fn test_run_missing_script() {
        let (runner, _dir) = sh_runner();

        let result = runner.run("nope", |_| {});
        assert!(matches!(result, Err(ProcessError::ScriptMissing(_))));
    }

    #[test]
    fn test_run_unlaunchable_interpreter() {
        let temp_dir = tempdir().unwrap();
        let runner = ScriptRunner::new("/definitely/not/an/interpreter")
            .with_scripts_dir(temp_dir.path())
            .with_extension("sh");
        write_script(temp_dir.path(), "ok", "exit 0\n");

        let result = runner.run("ok", |_| {});
        assert!(matches!(result, Err(ProcessError::Launch { .. })));
    }

    #[test]
    fn test_run_merges_stderr_into_line_stream() {
        let (runner, dir) = sh_runner();
        write_script(dir.path(), "mixed", "echo out\necho err 1>&2\n");

        let mut lines = Vec::new();
        let code = runner.run("mixed", |line| lines.push(line.to_string())).unwrap();

        assert_eq!(code, 0);
        lines.sort();
        assert_eq!(lines, vec!["err", "out"]);
    }

    #[test]
    fn test_run_replaces_invalid_utf8() {
        let (runner, dir) = sh_runner();
        write_script(dir.path(), "binary", "printf 'ab\\377cd\\n'\n");

        let mut lines = Vec::new();
        runner.run("binary", |line| lines.push(line.to_string())).unwrap();

        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains('\u{FFFD}'), "got: {:?}", lines[0]);
        assert!(lines[0].starts_with("ab"));
        assert!(lines[0].ends_with("cd"));
    }

    #[test]
    fn test_run_strips_trailing_newline_and_cr() {
        let (runner, dir) = sh_runner();
        write_script(dir.path(), "crlf", "printf 'dos line\\r\\n'\n");

        let mut lines = Vec::new();
        runner.run("crlf", |line| lines.push(line.to_string())).unwrap();

        assert_eq!(lines, vec!["dos line"]);
    }

    #[test]
    fn test_run_many_lines_does_not_deadlock() {
        // More lines than the channel bound; consumption keeps pace.
        let (runner, dir) = sh_runner();
        write_script(
            dir.path(),
            "chatty",
            "i=0\nwhile [ $i -lt 200 ]; do echo line $i; i=$((i+1)); done\n",
        );

        let mut count = 0usize;
        let code = runner.run("chatty", |_| count += 1).unwrap();

        assert_eq!(code, 0);
        assert_eq!(count, 200);
    }
}
