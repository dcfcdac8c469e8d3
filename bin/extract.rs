use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use compilerbot::config::{ExtractFileConfig, FileConfig};
use compilerbot::extract::Session;
use compilerbot::oracle::TcpOracle;
use compilerbot::payload::PayloadCache;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => ExtractFileConfig::load_from_file(path)?,
        None => ExtractFileConfig::default(),
    };
    args.apply(&mut config);
    config.validate()?;

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(config.log_level_as_tracing().into())
                .from_env_lossy(),
        )
        .init();

    let oracle = TcpOracle::new(config.judge_addr.clone());
    let payloads = PayloadCache::with_capacity(config.templates(), config.cache_capacity);
    let session = Session::new(Arc::new(oracle), Arc::new(payloads), config.options()?);
    tracing::info!(judge_addr = %config.judge_addr, "extracting");

    match session.run().await {
        Ok(extraction) => {
            println!("{}", extraction.flag);
            Ok(())
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Recover a protected literal from a judge", long_about = None)]
struct Args {
    #[arg(short, long, help = "Path to JSON config file")]
    config: Option<PathBuf>,

    #[arg(short, long, help = "Judge address (host:port)")]
    judge: Option<String>,

    #[arg(long, help = "Identifier that opens the protected file")]
    prefix: Option<String>,

    #[arg(long, help = "Protected file name as seen by #include")]
    include: Option<String>,

    #[arg(long, help = "Candidate characters in scan order")]
    alphabet: Option<String>,

    #[arg(long, help = "Upper bound on the secret length")]
    max_length: Option<usize>,

    #[arg(long, help = "Fail when an index crosses more than once")]
    strict: bool,
}

impl Args {
    fn apply(&self, config: &mut ExtractFileConfig) {
        if let Some(judge) = &self.judge {
            config.judge_addr = judge.clone();
        }
        if let Some(prefix) = &self.prefix {
            config.prefix = prefix.clone();
        }
        if let Some(include) = &self.include {
            config.include = include.clone();
        }
        if let Some(alphabet) = &self.alphabet {
            config.alphabet = Some(alphabet.clone());
        }
        if let Some(max_length) = self.max_length {
            config.max_length = max_length;
        }
        config.strict |= self.strict;
    }
}
