// License: MIT

use anyhow::Result;
use clap::Parser;
use eventline as el;

use triptych::cli::Cli;
use triptych::logging;
use triptych::shell::Engine;

fn run(cli: &Cli) -> Result<()> {
    let mut engine = Engine::connect()?;
    engine.create_window(&cli.title);
    engine.run()
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.log_file.as_deref(), cli.verbose) {
        eprintln!("triptych: logging init failed: {e:#}");
        std::process::exit(1);
    }

    if let Err(e) = run(&cli) {
        el::error!("triptych.fatal error={err}", err = format!("{e:#}"));
        std::process::exit(1);
    }
}
