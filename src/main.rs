//! Instance Certificate Auth - certificate login for platform instances

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};

use instance_cert_auth::{
    AuthBackend, Error,
    cli::{CertsCommand, Cli, Command, MapCommand, Namespace},
    config::{Config, StorageKind},
    pki::{delete_trusted_cert, list_trusted_certs, read_trusted_cert, write_trusted_cert},
    policy::{PolicyList, parse_policy_list},
    server::Server,
    setup_tracing,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup tracing
    if let Err(e) = setup_tracing(&cli.log_level, cli.log_format.as_deref()) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    let config = match Config::load(cli.config.as_deref()) {
        Ok(mut config) => {
            // Apply CLI overrides
            if let Some(port) = cli.port {
                config.server.port = port;
            }
            if let Some(ref host) = cli.host {
                config.server.host = host.clone();
            }
            config
        }
        Err(e) => {
            error!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Some(Command::Map { namespace, action }) => run_map_command(&config, namespace, action).await,
        Some(Command::Certs(cmd)) => run_certs_command(&config, cmd).await,
        Some(Command::Serve) | None => run_server(config).await,
    }
}

async fn open_backend(config: &Config) -> Option<AuthBackend> {
    if config.storage.kind == StorageKind::Memory {
        warn!("Storage kind is 'memory'; changes made by this command are discarded on exit");
    }
    match AuthBackend::from_config(config).await {
        Ok(backend) => Some(backend),
        Err(e) => {
            eprintln!("❌ Failed to open storage: {e}");
            None
        }
    }
}

/// Run policy mapping commands
async fn run_map_command(config: &Config, namespace: Namespace, cmd: MapCommand) -> ExitCode {
    let Some(backend) = open_backend(config).await else {
        return ExitCode::FAILURE;
    };
    let Some(map) = backend.namespace(namespace.as_str()) else {
        eprintln!("❌ Unknown namespace: {}", namespace.as_str());
        return ExitCode::FAILURE;
    };
    let storage = backend.storage();

    let result = match cmd {
        MapCommand::Get { id } => map.get(storage, &id).await.map_err(Error::from).map(|entry| {
            match entry {
                Some(entry) => println!("{id}: {}", entry.policies.join(",")),
                None => println!("{id}: (no mapping; `default` applies)"),
            }
        }),
        MapCommand::Set { id, policies } => match parse_policy_list(&policies) {
            Ok(list) => map
                .put(storage, &id, PolicyList::List(list))
                .await
                .map(|()| println!("✅ {}/{id} → {policies}", map.name())),
            Err(e) => Err(e),
        },
        MapCommand::Remove { id } => map
            .delete(storage, &id)
            .await
            .map(|()| println!("✅ Removed {}/{id}", map.name())),
        MapCommand::List => map.list(storage).await.map(|ids| {
            for id in ids {
                println!("{id}");
            }
        }),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("❌ {e}");
            ExitCode::FAILURE
        }
    }
}

/// Run trusted certificate commands
async fn run_certs_command(config: &Config, cmd: CertsCommand) -> ExitCode {
    let Some(backend) = open_backend(config).await else {
        return ExitCode::FAILURE;
    };
    let storage = backend.storage();

    let result = match cmd {
        CertsCommand::Add { name, file } => match tokio::fs::read_to_string(&file).await {
            Ok(pem) => write_trusted_cert(storage, &name, &pem)
                .await
                .map(|()| println!("✅ Trusted {name} ({})", file.display())),
            Err(e) => Err(Error::from(e)),
        },
        CertsCommand::Show { name } => read_trusted_cert(storage, &name)
            .await
            .map(|entry| print!("{}", entry.certificate)),
        CertsCommand::Remove { name } => delete_trusted_cert(storage, &name)
            .await
            .map(|()| println!("✅ Removed {name}")),
        CertsCommand::List => list_trusted_certs(storage).await.map(|names| {
            for name in names {
                println!("{name}");
            }
        }),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("❌ {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run_server(config: Config) -> ExitCode {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        port = config.server.port,
        storage = ?config.storage.kind,
        "Starting instance cert auth"
    );

    let backend = match AuthBackend::from_config(&config).await {
        Ok(backend) => Arc::new(backend),
        Err(e) => {
            error!("Failed to open storage: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = Server::new(config, backend).run().await {
        error!("Server error: {e}");
        return ExitCode::FAILURE;
    }

    info!("Shutdown complete");
    ExitCode::SUCCESS
}
