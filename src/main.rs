//! baton - Backstack navigation scripts
//!
//! This is the binary entry point. All logic lives in the library.

use std::io;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr};

use baton::baton_nav::{self, config::BATON_DIR};
use baton::Script;

/// baton - replay navigation scripts against a headless host
#[derive(Parser, Debug)]
#[command(name = "baton")]
#[command(about = "Replay navigation scripts against a headless host", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a TOML script and print the backstacks after every step (NDJSON)
    Run {
        /// Path to the script
        #[arg(value_name = "SCRIPT")]
        script: PathBuf,

        /// Directory holding `.baton/config.toml` (defaults to the current
        /// directory). Logs go to `.baton/logs` under it when given.
        #[arg(long, value_name = "DIR")]
        config: Option<PathBuf>,

        /// Frames (16ms each) advanced after every step to settle animations
        #[arg(long, default_value_t = 0)]
        frames: u32,
    },

    /// Write a default `.baton/config.toml` into DIR (current directory by default)
    Init {
        #[arg(value_name = "DIR")]
        dir: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();

    match args.command {
        Command::Run {
            script,
            config,
            frames,
        } => {
            let log_dir = config.as_deref().map(|dir| dir.join(BATON_DIR).join("logs"));
            baton::baton_core::logging::init(log_dir.as_deref())?;

            let config_dir = config.unwrap_or_else(current_dir);
            let config = baton_nav::load_config(&config_dir);

            let loaded = Script::load(&script)
                .wrap_err_with(|| format!("Failed to load script {}", script.display()))?;

            let mut stdout = io::stdout().lock();
            baton::run_script(&loaded, config, frames, &mut stdout)
                .wrap_err("Script stopped on a fatal error")?;
        }
        Command::Init { dir } => {
            let dir = dir.unwrap_or_else(current_dir);
            init(&dir)?;
        }
    }

    Ok(())
}

fn init(dir: &Path) -> Result<()> {
    let config_path = dir.join(BATON_DIR).join(baton_nav::config::CONFIG_FILENAME);
    if baton_nav::init_config(dir)
        .wrap_err_with(|| format!("Failed to write {}", config_path.display()))?
    {
        println!("Created {}", config_path.display());
    } else {
        println!("{} already exists", config_path.display());
    }
    Ok(())
}

fn current_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}
