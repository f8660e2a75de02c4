//! CLI command definitions and dispatch.

pub mod build;

use clap::{Parser, Subcommand};
use ctforge_common::distro::Distro;

/// Builds customized Proxmox VE container templates.
#[derive(Parser, Debug)]
#[command(name = "ctforge", version, about, long_about = None)]
pub struct Cli {
    /// Distribution to build.
    #[command(subcommand)]
    pub command: Command,

    /// Log at debug level (`RUST_LOG` takes precedence).
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available CLI subcommands, one per distribution.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build an Ubuntu template (apt, `.tar.zst`).
    Ubuntu(build::BuildArgs),
    /// Build a Fedora template (dnf, `.tar.xz`).
    Fedora(build::BuildArgs),
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the build fails at any stage.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Ubuntu(args) => build::execute(Distro::Ubuntu, &args),
        Command::Fedora(args) => build::execute(Distro::Fedora, &args),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_all_build_flags() {
        let cli = Cli::try_parse_from([
            "ctforge", "ubuntu", "-r", "22.04", "-t", "base", "-o", "web.tar.xz", "-k",
            "ssh-ed25519 AAAA", "-n", "9.9.9.9", "-c", "/srv/cache", "-v",
        ])
        .expect("parse");
        assert!(cli.verbose);
        let Command::Ubuntu(args) = cli.command else {
            panic!("expected ubuntu subcommand");
        };
        assert_eq!(args.release.as_deref(), Some("22.04"));
        assert_eq!(args.template, "base");
        assert_eq!(args.output.as_deref(), Some("web.tar.xz"));
        assert_eq!(args.ssh_key.as_deref(), Some("ssh-ed25519 AAAA"));
        assert_eq!(args.nameserver.as_deref(), Some("9.9.9.9"));
        assert_eq!(args.cache_dir, Some(PathBuf::from("/srv/cache")));
    }

    #[test]
    fn long_flags_and_defaults() {
        let cli = Cli::try_parse_from(["ctforge", "fedora", "--release", "41"]).expect("parse");
        let Command::Fedora(args) = cli.command else {
            panic!("expected fedora subcommand");
        };
        assert_eq!(args.release.as_deref(), Some("41"));
        assert_eq!(args.template, "cloud");
        assert!(args.output.is_none());
        assert!(!cli.verbose);
    }

    #[test]
    fn unknown_flag_is_rejected() {
        assert!(Cli::try_parse_from(["ctforge", "ubuntu", "--bogus"]).is_err());
    }

    #[test]
    fn distribution_is_required() {
        assert!(Cli::try_parse_from(["ctforge"]).is_err());
        assert!(Cli::try_parse_from(["ctforge", "debian"]).is_err());
    }
}
