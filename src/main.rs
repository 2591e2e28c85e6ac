mod cli;
mod extract_cmd;
mod info_cmd;
mod make_cmd;
mod string_utils;

use anyhow::{Context, Result};

pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

fn init_log(level: log::LevelFilter) -> Result<()> {
    let local_level = level;
    fern::Dispatch::new()
        .format(move |out, message, record| {
            if local_level > log::LevelFilter::Info {
                // Add some extra info to each message in debug
                out.finish(format_args!(
                    "[{}]({})({}) {}",
                    chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
                    record.target(),
                    record.level(),
                    message
                ))
            } else {
                out.finish(format_args!("{}", message))
            }
        })
        .level(level)
        .chain(std::io::stdout())
        .apply()
        .context("unable to initialize log")?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let (command, log_opts) = match cli::parse_opts(std::env::args_os()) {
        Ok(opts) => opts,
        Err(err) => err.exit(),
    };
    init_log(log_opts.filter)?;
    match command {
        cli::CommandOpts::Make(opts) => make_cmd::make_cmd(opts).await,
        cli::CommandOpts::Extract(opts) => extract_cmd::extract_cmd(opts).await,
        cli::CommandOpts::Info { input } => info_cmd::info_cmd(&input).await,
    }
}
