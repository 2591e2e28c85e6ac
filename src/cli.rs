use clap::{Arg, ArgAction, Command};
use log::LevelFilter;
use std::ffi::OsString;
use std::path::PathBuf;

use crate::extract_cmd;
use crate::make_cmd;
use crate::PKG_NAME;
use crate::PKG_VERSION;
use castr::chunker;
use castr::Compression;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogOpts {
    pub filter: LevelFilter,
}

impl LogOpts {
    fn new(filter: LevelFilter) -> Self {
        Self { filter }
    }
}

#[derive(Debug, Clone)]
pub enum CommandOpts {
    Make(make_cmd::Options),
    Extract(extract_cmd::Options),
    Info { input: PathBuf },
}

pub fn parse_opts<I, T>(args: I) -> Result<(CommandOpts, LogOpts), clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let make_subcmd = add_chunker_args(
        Command::new("make")
            .about("Chunk a file or directory into a store and write its index.")
            .arg(
                Arg::new("INPUT")
                    .value_name("INPUT")
                    .help("Input file or directory")
                    .required(true),
            )
            .arg(
                Arg::new("OUTPUT")
                    .value_name("OUTPUT")
                    .help("Output index file (.caibx for files, .caidx for directories)")
                    .required(true),
            )
            .arg(
                Arg::new("store")
                    .long("store")
                    .value_name("DIR")
                    .help("Chunk store directory")
                    .required(true),
            )
            .arg(
                Arg::new("compression")
                    .long("compression")
                    .value_name("TYPE")
                    .help("Compression for stored chunks (zstd or none) [default: zstd]"),
            )
            .arg(
                Arg::new("compression-level")
                    .long("compression-level")
                    .value_name("LEVEL")
                    .value_parser(clap::value_parser!(i32))
                    .help("Chunk compression level"),
            )
            .arg(
                Arg::new("force-create")
                    .short('f')
                    .long("force-create")
                    .action(ArgAction::SetTrue)
                    .help("Overwrite the output index if it exists"),
            ),
    );
    let extract_subcmd = Command::new("extract")
        .about("Rebuild a file or directory from an index and a chunk store.")
        .arg(
            Arg::new("INDEX")
                .value_name("INDEX")
                .help("Index file to extract from")
                .required(true),
        )
        .arg(
            Arg::new("OUTPUT")
                .value_name("OUTPUT")
                .help("Output file or directory")
                .required(true),
        )
        .arg(
            Arg::new("store")
                .long("store")
                .value_name("DIR")
                .help("Chunk store directory")
                .required(true),
        )
        .arg(
            Arg::new("seed-store")
                .long("seed-store")
                .value_name("DIR")
                .action(ArgAction::Append)
                .help("Extra store to consult before the main store"),
        )
        .arg(
            Arg::new("verify-output")
                .long("verify-output")
                .action(ArgAction::SetTrue)
                .help("Verify that the output re-hashes to the index after extraction"),
        )
        .arg(
            Arg::new("force-create")
                .short('f')
                .long("force-create")
                .action(ArgAction::SetTrue)
                .help("Overwrite output files if they exist"),
        );
    let info_subcmd = Command::new("info")
        .about("Print information about an index file.")
        .arg(
            Arg::new("INPUT")
                .value_name("INPUT")
                .help("Index file")
                .required(true),
        );
    let matches = Command::new(PKG_NAME)
        .version(PKG_VERSION)
        .arg(
            Arg::new("verbose")
                .short('v')
                .action(ArgAction::Count)
                .global(true)
                .help("Set verbosity level"),
        )
        .arg(
            Arg::new("buffered-chunks")
                .long("buffered-chunks")
                .value_name("NUM")
                .value_parser(clap::value_parser!(u32))
                .global(true)
                .help("Limit number of chunks processed simultaneously"),
        )
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(make_subcmd)
        .subcommand(extract_subcmd)
        .subcommand(info_subcmd)
        .try_get_matches_from(args)?;

    // Global arguments propagate into the subcommand matches.
    let (_, sub_matches) = matches.subcommand().expect("subcommand required");
    let log_opts = LogOpts::new(match sub_matches.get_count("verbose") {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    });
    let num_chunk_buffers = sub_matches
        .get_one::<u32>("buffered-chunks")
        .map(|&num| num as usize)
        .unwrap_or(0);

    if let Some(matches) = matches.subcommand_matches("make") {
        let chunker_config = parse_chunker_config(matches)?;
        let compression = parse_compression(matches)?;
        Ok((
            CommandOpts::Make(make_cmd::Options {
                input: matches.get_one::<String>("INPUT").unwrap().into(),
                output: matches.get_one::<String>("OUTPUT").unwrap().into(),
                store: matches.get_one::<String>("store").unwrap().into(),
                chunker_config,
                compression,
                num_chunk_buffers,
                force_create: matches.get_flag("force-create"),
            }),
            log_opts,
        ))
    } else if let Some(matches) = matches.subcommand_matches("extract") {
        Ok((
            CommandOpts::Extract(extract_cmd::Options {
                index: matches.get_one::<String>("INDEX").unwrap().into(),
                output: matches.get_one::<String>("OUTPUT").unwrap().into(),
                store: matches.get_one::<String>("store").unwrap().into(),
                seed_stores: matches
                    .get_many::<String>("seed-store")
                    .unwrap_or_default()
                    .map(PathBuf::from)
                    .collect(),
                verify_output: matches.get_flag("verify-output"),
                force_create: matches.get_flag("force-create"),
                num_chunk_buffers,
            }),
            log_opts,
        ))
    } else if let Some(matches) = matches.subcommand_matches("info") {
        Ok((
            CommandOpts::Info {
                input: matches.get_one::<String>("INPUT").unwrap().into(),
            },
            log_opts,
        ))
    } else {
        unreachable!("a subcommand is required")
    }
}

fn add_chunker_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("avg-chunk-size")
            .long("avg-chunk-size")
            .value_name("SIZE")
            .help("Indication of target chunk size [default: 64KiB]"),
    )
    .arg(
        Arg::new("min-chunk-size")
            .long("min-chunk-size")
            .value_name("SIZE")
            .help("Set minimal size of chunks [default: 16KiB]"),
    )
    .arg(
        Arg::new("max-chunk-size")
            .long("max-chunk-size")
            .value_name("SIZE")
            .help("Set maximal size of chunks [default: 256KiB]"),
    )
}

fn parse_chunker_config(matches: &clap::ArgMatches) -> Result<chunker::Config, clap::Error> {
    let mut config = chunker::Config::default();
    if let Some(min) = matches.get_one::<String>("min-chunk-size") {
        config.min_chunk_size = parse_size(min)?;
    }
    if let Some(avg) = matches.get_one::<String>("avg-chunk-size") {
        config.avg_chunk_size = parse_size(avg)?;
    }
    if let Some(max) = matches.get_one::<String>("max-chunk-size") {
        config.max_chunk_size = parse_size(max)?;
    }
    config
        .check()
        .map_err(|err| clap::Error::raw(clap::error::ErrorKind::ValueValidation, err))?;
    Ok(config)
}

fn parse_compression(matches: &clap::ArgMatches) -> Result<Compression, clap::Error> {
    let level = matches.get_one::<i32>("compression-level").copied();
    match matches
        .get_one::<String>("compression")
        .map(String::as_str)
        .unwrap_or("zstd")
    {
        "none" => Ok(Compression::None),
        "zstd" => Ok(match level {
            Some(level) => Compression::Zstd(level),
            None => Compression::zstd_default(),
        }),
        other => Err(clap::Error::raw(
            clap::error::ErrorKind::ValueValidation,
            format!("invalid compression ({})\n", other),
        )),
    }
}

fn parse_size(size_str: &str) -> Result<usize, clap::Error> {
    let size_val: String = size_str.chars().filter(|a| a.is_numeric()).collect();
    let size_unit: String = size_str.chars().filter(|a| !a.is_numeric()).collect();
    let size_val: usize = size_val.parse().map_err(|err| {
        clap::Error::raw(
            clap::error::ErrorKind::ValueValidation,
            format!("invalid size {}: {}\n", size_str, err),
        )
    })?;
    match size_unit.as_str() {
        "GiB" => Ok(1024 * 1024 * 1024 * size_val),
        "MiB" => Ok(1024 * 1024 * size_val),
        "KiB" => Ok(1024 * size_val),
        "B" | "" => Ok(size_val),
        unit => Err(clap::Error::raw(
            clap::error::ErrorKind::ValueValidation,
            format!("invalid size unit ({})\n", unit),
        )),
    }
}
