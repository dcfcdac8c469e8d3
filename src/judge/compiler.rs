use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::protocol::Verdict;

/// Default wall-clock budget for one compilation.
pub const DEFAULT_COMPILE_TIMEOUT: Duration = Duration::from_secs(15);

/// Result of one compilation job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileOutcome {
    Finished { success: bool, diagnostics: String },
    TimedOut,
}

impl CompileOutcome {
    /// Accept iff the compiler exited cleanly and printed nothing.
    ///
    /// A timeout is a reject: under load the judge answers conservatively
    /// instead of guessing.
    pub fn verdict(&self) -> Verdict {
        match self {
            CompileOutcome::Finished {
                success: true,
                diagnostics,
            } if diagnostics.trim().is_empty() => Verdict::Accept,
            _ => Verdict::Reject,
        }
    }
}

/// Compiles a full translation unit read from memory.
#[async_trait]
pub trait Compiler: Send + Sync {
    async fn compile(&self, unit: &str) -> io::Result<CompileOutcome>;
}

/// clang driven over stdin, warnings as errors, first error fatal.
///
/// The child runs inside `workdir` (with `-I workdir`) so a quoted include of
/// the protected file resolves there.
#[derive(Debug, Clone)]
pub struct ClangCompiler {
    program: PathBuf,
    workdir: PathBuf,
    timeout: Duration,
}

impl ClangCompiler {
    pub fn new(program: impl Into<PathBuf>, workdir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            workdir: workdir.into(),
            timeout: DEFAULT_COMPILE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn args(&self) -> Vec<String> {
        vec![
            "-x".to_string(),
            "c".to_string(),
            "-std=c11".to_string(),
            "-Wall".to_string(),
            "-Wextra".to_string(),
            "-Werror".to_string(),
            "-Wmain".to_string(),
            "-Wfatal-errors".to_string(),
            "-I".to_string(),
            self.workdir.to_string_lossy().to_string(),
            "-o".to_string(),
            "/dev/null".to_string(),
            "-".to_string(),
        ]
    }
}

#[async_trait]
impl Compiler for ClangCompiler {
    async fn compile(&self, unit: &str) -> io::Result<CompileOutcome> {
        let mut child = Command::new(&self.program)
            .args(self.args())
            .current_dir(&self.workdir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "compiler stdin missing"))?;

        let feed = async move {
            // The compiler may bail out before draining stdin.
            if let Err(e) = stdin.write_all(unit.as_bytes()).await {
                if e.kind() != io::ErrorKind::BrokenPipe {
                    tracing::debug!(error = %e, "compiler stdin write failed");
                }
            }
            drop(stdin);
        };

        let run = async move {
            let (_, output) = tokio::join!(feed, child.wait_with_output());
            output
        };

        match tokio::time::timeout(self.timeout, run).await {
            Ok(output) => {
                let output = output?;
                let mut diagnostics = String::from_utf8_lossy(&output.stdout).into_owned();
                diagnostics.push_str(&String::from_utf8_lossy(&output.stderr));
                Ok(CompileOutcome::Finished {
                    success: output.status.success(),
                    diagnostics,
                })
            }
            // Dropping `run` drops the child, and kill_on_drop reaps it.
            Err(_) => Ok(CompileOutcome::TimedOut),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_exit_without_output_accepts() {
        let outcome = CompileOutcome::Finished {
            success: true,
            diagnostics: String::new(),
        };
        assert_eq!(outcome.verdict(), Verdict::Accept);
    }

    #[test]
    fn whitespace_only_output_accepts() {
        let outcome = CompileOutcome::Finished {
            success: true,
            diagnostics: " \n".to_string(),
        };
        assert_eq!(outcome.verdict(), Verdict::Accept);
    }

    #[test]
    fn diagnostics_reject_even_on_success() {
        let outcome = CompileOutcome::Finished {
            success: true,
            diagnostics: "<stdin>:1:1: note: something".to_string(),
        };
        assert_eq!(outcome.verdict(), Verdict::Reject);
    }

    #[test]
    fn failure_and_timeout_reject() {
        let failed = CompileOutcome::Finished {
            success: false,
            diagnostics: String::new(),
        };
        assert_eq!(failed.verdict(), Verdict::Reject);
        assert_eq!(CompileOutcome::TimedOut.verdict(), Verdict::Reject);
    }

    #[test]
    fn clang_arguments_escalate_warnings() {
        let clang = ClangCompiler::new("/usr/bin/clang", "/srv/judge");
        let args = clang.args();
        for flag in ["-Werror", "-Wfatal-errors", "-Wall", "-Wextra", "-std=c11"] {
            assert!(args.iter().any(|a| a == flag), "missing {flag}");
        }
        assert_eq!(args.last().map(String::as_str), Some("-"));
        assert!(args.windows(2).any(|w| w[0] == "-I" && w[1] == "/srv/judge"));
        assert_eq!(clang.timeout(), DEFAULT_COMPILE_TIMEOUT);
    }

    #[tokio::test]
    async fn missing_compiler_is_an_io_error() {
        let clang = ClangCompiler::new("/nonexistent/clang-for-tests", ".");
        assert!(clang.compile("int main(void) {}").await.is_err());
    }
}
