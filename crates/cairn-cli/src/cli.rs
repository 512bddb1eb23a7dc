use std::path::PathBuf;

use clap::{ArgGroup, Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "cairn",
    about = "Git-compatible object storage and pack unpacking",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Repository directory holding `objects/`
    #[arg(long, global = true, default_value = ".git")]
    pub git_dir: PathBuf,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create an empty repository
    Init(InitArgs),
    /// Compute a blob id for a file, optionally storing it
    HashObject(HashObjectArgs),
    /// Show an object's content, kind, or size
    CatFile(CatFileArgs),
    /// List the entries of a tree
    LsTree(LsTreeArgs),
    /// Store a directory as trees and blobs
    WriteTree(WriteTreeArgs),
    /// Unpack a packfile into the object store
    UnpackObjects(PackArgs),
    /// Decode and resolve a packfile without storing it
    VerifyPack(PackArgs),
}

#[derive(Args)]
pub struct InitArgs {
    pub path: Option<PathBuf>,
}

#[derive(Args)]
pub struct HashObjectArgs {
    /// Write the blob into the object store
    #[arg(short = 'w')]
    pub write: bool,
    pub file: PathBuf,
}

#[derive(Args)]
#[command(group(ArgGroup::new("mode").required(true).args(["pretty", "kind", "size"])))]
pub struct CatFileArgs {
    /// Print the payload; trees are listed
    #[arg(short = 'p')]
    pub pretty: bool,
    /// Print the object kind
    #[arg(short = 't')]
    pub kind: bool,
    /// Print the payload size
    #[arg(short = 's')]
    pub size: bool,
    pub object: String,
}

#[derive(Args)]
pub struct LsTreeArgs {
    #[arg(long)]
    pub name_only: bool,
    pub tree: String,
}

#[derive(Args)]
pub struct WriteTreeArgs {
    /// Directory to store; defaults to the one containing the git dir
    pub dir: Option<PathBuf>,
}

#[derive(Args)]
pub struct PackArgs {
    pub pack: PathBuf,
}
