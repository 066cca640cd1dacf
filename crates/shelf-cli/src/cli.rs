use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "lfs-shelf",
    about = "git-lfs custom transfer agent that keeps objects in a plain folder",
    long_about = "Treats a folder, usually a shared one, as the remote store for \
                  LFS object data. Uploads and downloads become file copies to \
                  paths derived from each object id.\n\n\
                  Meant to be started by git-lfs. Configure it with \
                  lfs.customtransfer.<name>.path and pass the base directory \
                  through lfs.customtransfer.<name>.args.",
    version
)]
pub struct Cli {
    /// Base directory of the object store
    #[arg(value_name = "BASEDIR")]
    pub basedir: Option<String>,

    /// TOML file with agent settings; flags take precedence
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory for staged downloads (default: system temp directory)
    #[arg(long, value_name = "DIR")]
    pub temp_dir: Option<PathBuf>,

    /// Hard-link uploads into the store when possible instead of copying
    #[arg(long)]
    pub hard_link: bool,

    /// More diagnostics on stderr. -v echoes every protocol message, -vv adds
    /// per-block detail
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}
