// CLI module - command-line argument parsing and handlers
//
// Subcommands:
// - serve (default): Run the fragment server
// - config --show: Display effective configuration
// - config --reset: Regenerate config file with defaults
// - config --path: Print the config file location

use crate::config::{Config, VERSION};
use clap::{Parser, Subcommand};
use std::io::Write;

/// speakersheet - component fragment server
#[derive(Parser)]
#[command(name = "speakersheet")]
#[command(version = VERSION)]
#[command(about = "Serves component fragments and search collections", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Run the fragment server (default)
    Serve,

    /// Manage configuration
    Config {
        /// Show effective configuration
        #[arg(long)]
        show: bool,

        /// Reset config file to defaults
        #[arg(long)]
        reset: bool,

        /// Skip the overwrite prompt for --reset
        #[arg(long, short = 'y', requires = "reset")]
        yes: bool,

        /// Show config file path
        #[arg(long)]
        path: bool,
    },
}

/// Handle CLI commands. Returns true if a command was handled (exit after).
pub fn handle_cli() -> bool {
    handle(Cli::parse())
}

fn handle(cli: Cli) -> bool {
    match cli.command {
        Some(Commands::Config {
            show,
            reset,
            yes,
            path,
        }) => {
            if path {
                handle_config_path();
            } else if show {
                handle_config_show();
            } else if reset {
                handle_config_reset(yes);
            } else {
                println!("Usage: speakersheet config [--show|--reset [-y]|--path]");
                println!();
                println!("Options:");
                println!("  --show    Display effective configuration");
                println!("  --reset   Reset config file to defaults");
                println!("  --path    Show config file path");
            }
            true
        }
        Some(Commands::Serve) | None => false,
    }
}

fn handle_config_path() {
    match Config::config_path() {
        Some(path) => println!("{}", path.display()),
        None => {
            eprintln!("Error: Could not determine config path");
            std::process::exit(1);
        }
    }
}

fn handle_config_show() {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    println!("# Effective configuration (env > file > defaults)");
    println!();
    print!("{}", config.to_toml());

    println!();
    if let Some(path) = Config::config_path() {
        if path.exists() {
            println!("# Source: {}", path.display());
        } else {
            println!("# Source: defaults (no config file)");
        }
    }
}

fn confirm(prompt: &str) -> bool {
    eprint!("{prompt} [y/N] ");
    if std::io::stderr().flush().is_err() {
        return false;
    }
    let mut input = String::new();
    if std::io::stdin().read_line(&mut input).is_err() {
        return false;
    }
    input.trim().eq_ignore_ascii_case("y")
}

fn handle_config_reset(yes: bool) {
    if let Some(path) = Config::config_path().filter(|p| p.exists()) {
        if !yes
            && !confirm(&format!(
                "Config file exists at {}. Overwrite?",
                path.display()
            ))
        {
            println!("Aborted.");
            return;
        }
    }

    match Config::reset() {
        Ok(path) => println!("Config reset to defaults: {}", path.display()),
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_subcommand_runs_server() {
        let cli = Cli::try_parse_from(["speakersheet"]).unwrap();
        assert_eq!(cli.command, None);
        assert!(!handle(cli));

        let cli = Cli::try_parse_from(["speakersheet", "serve"]).unwrap();
        assert_eq!(cli.command, Some(Commands::Serve));
    }

    #[test]
    fn test_config_flags() {
        let cli = Cli::try_parse_from(["speakersheet", "config", "--reset", "-y"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Commands::Config {
                show: false,
                reset: true,
                yes: true,
                path: false,
            })
        );

        // -y only makes sense with --reset
        assert!(Cli::try_parse_from(["speakersheet", "config", "-y"]).is_err());
    }
}
