use std::io::{self, BufRead};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use logroll::{RollingConfig, RollingWriter};

#[derive(Parser)]
#[command(name = "logroll")]
#[command(about = "Copy stdin into a size-bounded rotating log file")]
struct Cli {
    /// Active log file (default: <temp dir>/<program>-rolling.log)
    #[arg(long)]
    file: Option<PathBuf>,

    /// Rotate once the file would grow past this many bytes (0 = never)
    #[arg(long, default_value_t = 100 * 1024 * 1024)]
    max_bytes: u64,

    /// Number of backups to keep (0 = keep all)
    #[arg(long, default_value_t = 0)]
    max_backups: usize,

    /// Days to keep backups (0 = keep all)
    #[arg(long, default_value_t = 0)]
    max_age_days: u32,

    /// Gzip rotated backups
    #[arg(long)]
    compress: bool,

    /// Name backups with local time instead of UTC
    #[arg(long)]
    local_time: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = match cli.file {
        Some(path) => RollingConfig::new(path),
        None => RollingConfig::default(),
    };
    config.max_bytes = cli.max_bytes;
    config.max_backups = cli.max_backups;
    config.max_age_days = cli.max_age_days;
    config.compress = cli.compress;
    config.local_time = cli.local_time;

    log::info!("writing stdin to {}", config.path.display());
    let writer = RollingWriter::with_error_handler(config, |err| {
        log::error!("background sweep failed: {err}");
    });

    let chunk = match usize::try_from(writer.config().max_bytes) {
        Ok(0) | Err(_) => usize::MAX,
        Ok(limit) => limit,
    };

    let mut stdin = io::stdin().lock();
    let mut line = Vec::new();
    loop {
        line.clear();
        let read = stdin
            .read_until(b'\n', &mut line)
            .context("failed to read stdin")?;
        if read == 0 {
            break;
        }
        // A line longer than the limit is split so every piece fits one file.
        for piece in line.chunks(chunk) {
            writer
                .write(piece)
                .with_context(|| format!("failed to write {}", writer.path().display()))?;
        }
    }

    writer.close().context("failed to close log")?;
    writer.wait_for_sweep();
    Ok(())
}
