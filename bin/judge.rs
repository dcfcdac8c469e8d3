use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use compilerbot::config::{FileConfig, JudgeFileConfig};
use compilerbot::judge::ClangCompiler;
use compilerbot::runtime::{JudgeConfig, JudgeHandle};
use compilerbot::telemetry;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = parse_args()?;
    let mut config = match &args.config {
        Some(path) => JudgeFileConfig::load_from_file(path)?,
        None => JudgeFileConfig::default(),
    };
    if let Some(listen) = args.listen {
        config.listen_addr = listen.to_string();
    }
    if let Some(dir) = args.protected_dir {
        config.protected_dir = dir;
    }
    if let Some(compiler) = args.compiler {
        config.compiler = compiler;
    }
    config.validate()?;

    // Initialize tracing subscriber with environment filter
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(config.log_level_as_tracing().into())
                .from_env_lossy(),
        )
        .init();

    let listen_addr: SocketAddr = config.listen_addr.parse()?;
    let compiler = ClangCompiler::new(&config.compiler, &config.protected_dir)
        .with_timeout(config.compile_timeout);
    tracing::info!(
        compiler = %compiler.program().display(),
        protected_dir = %compiler.workdir().display(),
        timeout = ?compiler.timeout(),
        "compiler configured"
    );

    let mut judge_config = JudgeConfig::new(listen_addr, Arc::new(compiler));
    judge_config.max_request_bytes = config.max_request_bytes;
    let handle = JudgeHandle::spawn(judge_config).await?;
    tracing::info!(listen_addr = %handle.addr, "judge listening");

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    handle.shutdown();
    handle.wait().await?;

    let snapshot = telemetry::judge_snapshot();
    tracing::info!(stats = %serde_json::to_string(&snapshot)?, "final counters");
    Ok(())
}

struct Args {
    config: Option<PathBuf>,
    listen: Option<SocketAddr>,
    protected_dir: Option<PathBuf>,
    compiler: Option<PathBuf>,
}

fn parse_args() -> Result<Args, pico_args::Error> {
    let mut pargs = pico_args::Arguments::from_env();
    let config = pargs.opt_value_from_str(["-c", "--config"])?;
    let listen = pargs.opt_value_from_str(["-l", "--listen"])?;
    let protected_dir = pargs.opt_value_from_str(["-d", "--protected-dir"])?;
    let compiler = pargs.opt_value_from_str("--compiler")?;

    Ok(Args {
        config,
        listen,
        protected_dir,
        compiler,
    })
}
