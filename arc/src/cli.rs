use std::ops::RangeInclusive;
use std::path::PathBuf;

use structopt::clap::AppSettings::*;
use structopt::StructOpt;

use crate::util::parse_charset;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "arc",
    about = "Inspect, crack and extract hash-addressed game archives.",
    settings = &[SubcommandRequiredElseHelp, DisableHelpSubcommand, VersionlessSubcommands],
)]
pub struct Cli {
    #[structopt(short, long, help = "Show debug output", global = true)]
    pub verbose: bool,

    #[structopt(subcommand)]
    pub command: Commands,
}

#[derive(Debug, StructOpt)]
pub enum Commands {
    #[structopt(name = "l", visible_alias = "list", about = "List files of an archive")]
    List(ListArgs),

    #[structopt(
        name = "x",
        visible_alias = "extract",
        about = "Extract files from an archive"
    )]
    Extract(ExtractArgs),

    #[structopt(name = "streams", about = "Extract the uncompressed stream files")]
    Streams(StreamsArgs),

    #[structopt(
        name = "crack",
        about = "Recover path strings and update a dictionary"
    )]
    Crack(CrackArgs),

    #[structopt(name = "hashes", about = "Dump the checksums of an archive")]
    Hashes(HashesArgs),

    #[structopt(
        name = "t",
        visible_alias = "validate",
        about = "Check recovered strings against the archive structure"
    )]
    Validate(ValidateArgs),
}

#[derive(Debug, StructOpt)]
pub struct ArchiveArgs {
    #[structopt(name = "arcfile", parse(from_os_str), help = "Path to the archive")]
    pub archive: PathBuf,

    #[structopt(
        short,
        long,
        parse(from_os_str),
        help = "Newline-delimited list of known strings"
    )]
    pub dictionary: Option<PathBuf>,
}

#[derive(Debug, StructOpt)]
pub struct ListArgs {
    #[structopt(flatten)]
    pub archive: ArchiveArgs,

    #[structopt(long, help = "Show the rebuilt directory tree instead of the file table")]
    pub tree: bool,
}

#[derive(Debug, StructOpt)]
pub struct ExtractArgs {
    #[structopt(flatten)]
    pub archive: ArchiveArgs,

    #[structopt(short, long, parse(from_os_str), help = "Output directory [default: .]")]
    pub output: Option<PathBuf>,

    #[structopt(long, help = "Dump raw bytes of undecodable files to <output>/bad")]
    pub quarantine: bool,

    #[structopt(long, help = "Do not replace files that already exist")]
    pub keep_existing: bool,

    #[structopt(short, long, help = "Do not show a progress bar")]
    pub quiet: bool,
}

#[derive(Debug, StructOpt)]
pub struct StreamsArgs {
    #[structopt(flatten)]
    pub archive: ArchiveArgs,

    #[structopt(short, long, parse(from_os_str), help = "Output directory [default: .]")]
    pub output: Option<PathBuf>,

    #[structopt(short, long, help = "Do not show a progress bar")]
    pub quiet: bool,
}

#[derive(Debug, StructOpt)]
pub struct CrackArgs {
    #[structopt(flatten)]
    pub archive: ArchiveArgs,

    #[structopt(
        short,
        long,
        parse(from_os_str),
        help = "Write the recovered dictionary here"
    )]
    pub output: Option<PathBuf>,

    #[structopt(long, default_value = "64", help = "Upper bound on reconstruction passes")]
    pub max_passes: usize,

    #[structopt(long, help = "Brute-force every string of this length")]
    pub brute_force: Option<usize>,

    #[structopt(
        long,
        default_value = "a-z",
        parse(try_from_str = parse_charset),
        help = "Byte range used when brute forcing"
    )]
    pub charset: RangeInclusive<u8>,

    #[structopt(
        long,
        default_value = "0",
        help = "Brute-force tree templates with up to this many unknown bytes"
    )]
    pub template_len: usize,

    #[structopt(long, help = "Remove recovered strings that contradict the archive")]
    pub prune: bool,
}

#[derive(Debug, StructOpt)]
pub struct HashesArgs {
    #[structopt(flatten)]
    pub archive: ArchiveArgs,

    #[structopt(short, long, parse(from_os_str), help = "Write here instead of stdout")]
    pub output: Option<PathBuf>,

    #[structopt(long, help = "Only dump checksums without known text")]
    pub unknown: bool,
}

#[derive(Debug, StructOpt)]
pub struct ValidateArgs {
    #[structopt(flatten)]
    pub archive: ArchiveArgs,
}
