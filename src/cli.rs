// License: MIT

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "triptych",
    about = "Fullscreen Wayland shell with bust/gameplay/stat panels",
    version
)]
pub struct Cli {
    /// Title for the toplevel window.
    #[arg(long, short = 't', default_value = "Triptych")]
    pub title: String,

    /// Also write structured logs to this file.
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Debug-level logging.
    #[arg(long, short = 'v')]
    pub verbose: bool,
}
