//! # Auth Registry CLI
//!
//! Administrative entry point for authentication provider configuration and
//! account conversion.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use auth_registry::{
    admin::{AccountMigration, Caller, ProviderAdmin},
    config::ConfigLoader,
    credentials::StoreCredentialService,
    db,
    error::{AdminError, ResponseClass},
    models::auth_provider_row,
    persistence::{PersistenceFacade, SeaOrmStore},
    providers::{AuthenticationProviderRegistry, ProviderFactoryRegistry},
    telemetry,
};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};

/// Authentication provider registry administration
#[derive(Parser, Debug)]
#[command(name = "auth-registry")]
#[command(about = "Manage authentication providers and convert accounts to builtin")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the registered provider factories
    Factories,
    /// Manage provider configuration rows
    Providers {
        #[command(subcommand)]
        command: ProviderCommand,
    },
    /// Account operations
    Users {
        #[command(subcommand)]
        command: UserCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ProviderCommand {
    /// List all provider rows
    List,
    /// List the providers currently serving logins
    Active,
    /// Show one provider row
    Show { id: String },
    /// Create or replace a provider row
    Add {
        #[arg(long)]
        id: String,
        /// Alias of the factory that builds this provider
        #[arg(long)]
        factory: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        subtitle: Option<String>,
        /// Factory payload as JSON
        #[arg(long, default_value = "{}")]
        config: String,
        #[arg(long, default_value_t = false)]
        enabled: bool,
    },
    /// Enable a provider
    Enable { id: String },
    /// Disable a provider
    Disable { id: String },
    /// Set the enabled flag from a textual boolean (true/false, yes/no, on/off)
    SetEnabled { id: String, value: String },
    /// Disable a provider and delete its row
    Delete { id: String },
}

#[derive(Subcommand, Debug)]
enum UserCommand {
    /// Convert an externally authenticated account to builtin
    ConvertToBuiltin {
        user_id: i64,
        /// Email address for the converted account
        email: String,
        /// Id of the superuser performing the conversion
        #[arg(long = "as", value_name = "USER_ID")]
        caller: i64,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => match err.downcast_ref::<AdminError>() {
            Some(admin) => {
                let problem = admin.to_problem();
                match serde_json::to_string_pretty(&problem) {
                    Ok(body) => eprintln!("{}", body),
                    Err(_) => eprintln!("{}", admin),
                }
                match problem.class {
                    ResponseClass::ServerError => ExitCode::from(2),
                    _ => ExitCode::FAILURE,
                }
            }
            None => {
                eprintln!("Error: {:#}", err);
                ExitCode::from(2)
            }
        },
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = ConfigLoader::new().load().context("loading configuration")?;
    telemetry::init_tracing(&config).context("initializing tracing")?;
    match config.redacted_json() {
        Ok(redacted) => info!(profile = %config.profile, config = %redacted, "Loaded configuration"),
        Err(err) => warn!(profile = %config.profile, error = %err, "Loaded configuration; rendering it failed"),
    }

    let db = db::open(&config).await.context("opening database")?;
    let store: Arc<dyn PersistenceFacade> = Arc::new(SeaOrmStore::new(Arc::new(db)));

    let factories = Arc::new(ProviderFactoryRegistry::with_defaults());
    let registry = Arc::new(AuthenticationProviderRegistry::new(factories));
    let admin = ProviderAdmin::new(store.clone(), registry);

    match cli.command {
        Command::Factories => print_json(&admin.list_factories()),
        Command::Providers { command } => {
            admin.activate_enabled().await?;
            run_provider_command(&admin, command).await
        }
        Command::Users { command } => match command {
            UserCommand::ConvertToBuiltin {
                user_id,
                email,
                caller,
            } => {
                let caller = match store.find_user(caller).await.map_err(AdminError::from)? {
                    Some(user) => Caller::Authenticated(user),
                    None => Caller::Anonymous,
                };
                let credentials = Arc::new(
                    StoreCredentialService::new(store.clone())
                        .context("compiling credential validation patterns")?,
                );
                let migration = AccountMigration::new(store, credentials).with_provider_ids(
                    config.external_provider_id.clone(),
                    config.builtin_provider_id.clone(),
                );
                let result = migration.convert_to_builtin(&caller, user_id, &email).await?;
                print_json(&result)
            }
        },
    }
}

async fn run_provider_command(admin: &ProviderAdmin, command: ProviderCommand) -> Result<()> {
    match command {
        ProviderCommand::List => print_json(&admin.list_providers().await?),
        ProviderCommand::Active => print_json(&admin.list_active()),
        ProviderCommand::Show { id } => print_json(&admin.show_provider(&id).await?),
        ProviderCommand::Add {
            id,
            factory,
            title,
            subtitle,
            config,
            enabled,
        } => {
            let payload: serde_json::Value = serde_json::from_str(&config)
                .map_err(|err| AdminError::invalid_input(format!("invalid --config JSON: {err}")))?;
            let mut row = auth_provider_row::Model::new(id, factory, enabled).with_config(payload);
            if let Some(title) = title {
                row = row.with_title(title);
            }
            row.subtitle = subtitle;
            print_json(&admin.add_provider(row).await?)
        }
        ProviderCommand::Enable { id } => print_json(&admin.set_enabled(&id, "true").await?),
        ProviderCommand::Disable { id } => print_json(&admin.set_enabled(&id, "false").await?),
        ProviderCommand::SetEnabled { id, value } => {
            print_json(&admin.set_enabled(&id, &value).await?)
        }
        ProviderCommand::Delete { id } => print_json(&admin.delete_provider(&id).await?),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
