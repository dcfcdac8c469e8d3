//! Shared test harness for integration testing the judge and the extractor.
//!
//! `JudgeHarness` spawns the production accept loop from `src/runtime/` over a
//! temporary protected directory. By default the compiler is
//! `TemplateCompiler`, which evaluates probe units the way clang would without
//! needing a toolchain.

#![allow(dead_code)]

use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use compilerbot::judge::{CompileOutcome, Compiler};
use compilerbot::runtime::{JudgeConfig, JudgeHandle};
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

/// Judge server plus the directory holding its protected file.
pub struct JudgeHarness {
    /// Handle to the running judge.
    pub judge: JudgeHandle,
    dir: TempDir,
}

impl JudgeHarness {
    /// Spawn a judge whose protected file `flag` holds `contents`.
    pub async fn spawn(contents: &str) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        Self::spawn_with_file("flag", contents).await
    }

    /// Spawn a judge with a protected file of the given name.
    pub async fn spawn_with_file(
        name: &str,
        contents: &str,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join(name), contents)?;
        let compiler = Arc::new(TemplateCompiler::new(dir.path()));
        Self::spawn_in(dir, compiler).await
    }

    /// Spawn a judge over an existing directory with any compiler.
    pub async fn spawn_in(
        dir: TempDir,
        compiler: Arc<dyn Compiler>,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let config = JudgeConfig::new("127.0.0.1:0".parse()?, compiler);
        let judge = JudgeHandle::spawn(config).await?;
        Ok(Self { judge, dir })
    }

    pub fn addr(&self) -> SocketAddr {
        self.judge.addr
    }

    pub fn protected_dir(&self) -> &Path {
        self.dir.path()
    }
}

/// Evaluates probe units against the protected file without a real compiler.
///
/// Reads the prefix, include name, and probe parameters out of the unit,
/// loads the included file from `workdir`, and answers with the diagnostics a
/// bounds check would produce.
pub struct TemplateCompiler {
    workdir: PathBuf,
}

impl TemplateCompiler {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    fn evaluate(&self, unit: &str) -> Result<(), String> {
        if !unit.starts_with("int main(void) {") || !unit.ends_with('}') {
            return Err("error: malformed translation unit".to_string());
        }
        let include = between(unit, "%:include \"", "\"")
            .ok_or_else(|| "error: no include directive".to_string())?;
        let prefix = unit
            .lines()
            .filter_map(|line| line.trim().strip_prefix("%:define "))
            .find_map(|rest| rest.strip_suffix(" stringize("))
            .ok_or_else(|| "error: no prefix macro".to_string())?;

        let contents = std::fs::read_to_string(self.workdir.join(include))
            .map_err(|_| format!("fatal error: '{include}' file not found"))?;
        let literal = contents
            .trim_end()
            .strip_prefix(prefix)
            .ok_or_else(|| "error: use of undeclared identifier".to_string())?
            .as_bytes();
        let len = literal.len();

        let in_bounds = if let Some(index) = number_after(unit, "window[a[") {
            let threshold = number_after(unit, "const char window[")
                .ok_or_else(|| "error: missing window".to_string())?;
            match index.cmp(&len) {
                std::cmp::Ordering::Less => (literal[index] as usize) < threshold,
                std::cmp::Ordering::Equal => threshold > 0,
                std::cmp::Ordering::Greater => false,
            }
        } else if let Some(size) = number_after(unit, "leaked = a[") {
            size <= len
        } else {
            return Err("error: unknown probe".to_string());
        };

        if in_bounds {
            Ok(())
        } else {
            Err("error: array index is past the end of the array [-Werror,-Warray-bounds]".to_string())
        }
    }
}

#[async_trait]
impl Compiler for TemplateCompiler {
    async fn compile(&self, unit: &str) -> io::Result<CompileOutcome> {
        let outcome = match self.evaluate(unit) {
            Ok(()) => CompileOutcome::Finished {
                success: true,
                diagnostics: String::new(),
            },
            Err(diagnostics) => CompileOutcome::Finished {
                success: false,
                diagnostics,
            },
        };
        Ok(outcome)
    }
}

fn between<'a>(text: &'a str, open: &str, close: &str) -> Option<&'a str> {
    let start = text.find(open)? + open.len();
    let end = text[start..].find(close)? + start;
    Some(&text[start..end])
}

fn number_after(text: &str, marker: &str) -> Option<usize> {
    let start = text.find(marker)? + marker.len();
    let digits: String = text[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Spawn a misbehaving judge that prompts, reads one line, writes `reply`
/// verbatim and closes.
pub async fn spawn_scripted_judge(
    reply: &'static [u8],
) -> Result<SocketAddr, Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut stream = BufReader::new(stream);
                if stream.get_mut().write_all(b">").await.is_err() {
                    return;
                }
                let mut line = Vec::new();
                if stream.read_until(b'\n', &mut line).await.is_err() {
                    return;
                }
                let _ = stream.get_mut().write_all(reply).await;
                let _ = stream.get_mut().shutdown().await;
            });
        }
    });
    Ok(addr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_harness_spawn() {
        let harness = JudgeHarness::spawn("hxp{a}\n")
            .await
            .expect("Failed to spawn harness");

        assert_ne!(harness.addr().port(), 0);
        assert!(harness.protected_dir().join("flag").exists());

        // Shutdown is implicit via Drop
    }
}
