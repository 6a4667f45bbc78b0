//! Command-line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Certificate login backend for platform instance identities
#[derive(Parser, Debug)]
#[command(name = "instance-cert-auth")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short, long, env = "INSTANCE_CERT_AUTH_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "INSTANCE_CERT_AUTH_PORT")]
    pub port: Option<u16>,

    /// Host to bind to
    #[arg(long, env = "INSTANCE_CERT_AUTH_HOST")]
    pub host: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        long,
        default_value = "info",
        env = "INSTANCE_CERT_AUTH_LOG_LEVEL",
        global = true
    )]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "INSTANCE_CERT_AUTH_LOG_FORMAT", global = true)]
    pub log_format: Option<String>,

    /// Subcommand (optional - defaults to server mode)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP server (default)
    Serve,

    /// Manage how organizations, workspaces and apps map to policies
    Map {
        /// Namespace to operate on
        #[arg(value_enum)]
        namespace: Namespace,

        /// Operation on the namespace
        #[command(subcommand)]
        action: MapCommand,
    },

    /// Manage trusted CA certificates
    #[command(subcommand)]
    Certs(CertsCommand),
}

/// Policy namespace selector
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Namespace {
    /// Application ids
    Apps,
    /// Workspace ids
    Workspaces,
    /// Organization ids
    Orgs,
}

impl Namespace {
    /// Storage name of the namespace.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Apps => "apps",
            Self::Workspaces => "workspaces",
            Self::Orgs => "orgs",
        }
    }
}

/// Mapping subcommands
#[derive(Subcommand, Debug)]
pub enum MapCommand {
    /// Show the policies mapped to an id
    Get {
        /// Identifier (or `default`)
        id: String,
    },

    /// Map an id to policies
    Set {
        /// Identifier (or `default`)
        id: String,

        /// Comma-separated policy names
        #[arg(short, long)]
        policies: String,
    },

    /// Remove the mapping for an id
    Remove {
        /// Identifier (or `default`)
        id: String,
    },

    /// List mapped ids
    List,
}

/// Trusted certificate subcommands
#[derive(Subcommand, Debug)]
pub enum CertsCommand {
    /// Trust the CA bundle in a PEM file
    Add {
        /// Entry name
        name: String,

        /// PEM file; the first certificate must be a CA
        #[arg(required = true)]
        file: PathBuf,
    },

    /// Print a stored bundle
    Show {
        /// Entry name
        name: String,
    },

    /// Remove a stored bundle
    Remove {
        /// Entry name
        name: String,
    },

    /// List stored bundles
    List,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_means_serve() {
        let cli = Cli::try_parse_from(["instance-cert-auth"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn map_set_parses_namespace_and_policies() {
        let cli = Cli::try_parse_from([
            "instance-cert-auth",
            "map",
            "workspaces",
            "set",
            "ws-1",
            "--policies",
            "a,b",
        ])
        .unwrap();
        match cli.command {
            Some(Command::Map {
                namespace,
                action: MapCommand::Set { id, policies },
            }) => {
                assert_eq!(namespace, Namespace::Workspaces);
                assert_eq!(id, "ws-1");
                assert_eq!(policies, "a,b");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn unknown_namespace_is_rejected() {
        assert!(Cli::try_parse_from(["instance-cert-auth", "map", "spaces", "list"]).is_err());
    }

    #[test]
    fn certs_add_takes_name_and_file() {
        let cli =
            Cli::try_parse_from(["instance-cert-auth", "certs", "add", "root", "ca.pem"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Command::Certs(CertsCommand::Add { ref name, .. })) if name == "root"
        ));
    }
}
