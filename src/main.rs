//! Statehouse CLI - portal access control and content back office
//!
//! Run `statehouse --help` for usage information.

use clap::{Args, Parser, Subcommand};
use secrecy::{ExposeSecret, SecretString};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use statehouse::auth::{AccessService, Permission, Permissions, Principal, TokenIssuer, UserSummary};
use statehouse::config::{Config, LogFormat, ENV_PASSWORD, ENV_STORAGE_KEY};
use statehouse::content::ContentKind;
use statehouse::storage::{FileStorage, StorageBackend};
use statehouse::web::ApiServer;
use statehouse::StatehouseError;

#[derive(Parser)]
#[command(
    name = "statehouse",
    about = "Access control and content back office for a roleplay government portal",
    version
)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve {
        /// Address to bind to (overrides the configuration)
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Write a configuration file with fresh secrets and create the store
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Show store status
    Status,

    /// Manage roles and access codes
    Role {
        #[command(subcommand)]
        command: RoleCommands,
    },

    /// Manage user accounts
    User {
        #[command(subcommand)]
        command: UserCommands,
    },
}

/// Account the management command runs as
#[derive(Args)]
struct ActorArgs {
    /// Username to authenticate as (password from STATEHOUSE_PASSWORD or prompt)
    #[arg(long = "as", value_name = "USERNAME")]
    username: String,
}

#[derive(Subcommand)]
enum RoleCommands {
    /// List all roles with their access codes
    List {
        #[command(flatten)]
        actor: ActorArgs,

        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Create a new role
    Create {
        /// Role name
        name: String,

        /// Permissions (comma-separated, e.g. manage_news,delete)
        #[arg(short, long, default_value = "")]
        permissions: String,

        #[command(flatten)]
        actor: ActorArgs,
    },

    /// Replace a role's access code
    RegenerateCode {
        /// Role ID
        id: String,

        #[command(flatten)]
        actor: ActorArgs,
    },

    /// Delete a role nobody holds
    Delete {
        /// Role ID
        id: String,

        #[command(flatten)]
        actor: ActorArgs,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    /// List all accounts
    List {
        #[command(flatten)]
        actor: ActorArgs,

        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Delete an account
    Delete {
        /// User ID
        id: String,

        #[command(flatten)]
        actor: ActorArgs,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Load configuration
    let config = if let Some(config_path) = &cli.config {
        Config::load(config_path).await?
    } else {
        let default_path = Config::default_path();
        if default_path.exists() {
            Config::load(&default_path).await?
        } else {
            Config::default()
        }
    }
    .with_env_overrides();

    init_logging(&config, cli.verbose);

    // Execute command
    match cli.command {
        Commands::Serve { bind } => run_server(config, bind).await?,
        Commands::Init { force } => init_config(force).await?,
        Commands::Status => show_status(config).await?,
        Commands::Role { command } => match command {
            RoleCommands::List { actor, format } => list_roles(config, actor, format).await?,
            RoleCommands::Create {
                name,
                permissions,
                actor,
            } => create_role(config, name, permissions, actor).await?,
            RoleCommands::RegenerateCode { id, actor } => {
                regenerate_code(config, id, actor).await?
            }
            RoleCommands::Delete { id, actor } => delete_role(config, id, actor).await?,
        },
        Commands::User { command } => match command {
            UserCommands::List { actor, format } => list_users(config, actor, format).await?,
            UserCommands::Delete { id, actor } => delete_user(config, id, actor).await?,
        },
    }

    Ok(())
}

fn init_logging(config: &Config, verbose: u8) {
    let mut filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match verbose {
        0 => {}
        1 => filter = filter.add_directive(Level::DEBUG.into()),
        _ => filter = filter.add_directive(Level::TRACE.into()),
    }

    let (json, pretty) = match config.logging.format {
        LogFormat::Json => (Some(fmt::layer().json()), None),
        LogFormat::Pretty => (None, Some(fmt::layer())),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(pretty)
        .init();
}

fn prompt_secret(env_var: &str, prompt: &str) -> io::Result<SecretString> {
    // Check environment variable first
    if let Ok(value) = std::env::var(env_var) {
        return Ok(SecretString::from(value));
    }

    eprint!("{}", prompt);
    io::stderr().flush()?;

    let value = rpassword::read_password()?;
    Ok(SecretString::from(value))
}

fn get_storage_password() -> io::Result<SecretString> {
    prompt_secret(ENV_STORAGE_KEY, "Enter storage password: ")
}

async fn init_storage(config: &Config) -> Result<Arc<dyn StorageBackend>, StatehouseError> {
    let password = get_storage_password()?;
    let storage = FileStorage::new(&config.storage.path, &password).await?;
    Ok(Arc::new(storage))
}

async fn init_service(config: &Config) -> Result<Arc<AccessService>, StatehouseError> {
    let storage = init_storage(config).await?;
    Ok(Arc::new(AccessService::from_config(storage, &config.auth)))
}

/// Log in as the given account for a management command
async fn authenticate_actor(
    service: &AccessService,
    actor: &ActorArgs,
) -> Result<Principal, StatehouseError> {
    let password = prompt_secret(ENV_PASSWORD, &format!("Password for {}: ", actor.username))?;
    let session = service
        .login(&actor.username, password.expose_secret())
        .await?;
    Ok(session.principal)
}

async fn run_server(config: Config, bind: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let service = init_service(&config).await?;

    if config.auth.governor_secret.is_none() && !service.governor_exists().await? {
        warn!("No governor exists and no governor secret is configured; governor registration is disabled");
    }

    let mut server_config = config.server.clone();
    if let Some(bind) = bind {
        server_config.bind = bind;
    }

    let server = ApiServer::new(server_config, service);
    info!(bind = %server.bind_address(), "Statehouse API ready");
    server
        .run()
        .await
        .map_err(|e| -> Box<dyn std::error::Error> { e })?;

    Ok(())
}

async fn init_config(force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = Config::default_path();

    if config_path.exists() && !force {
        return Err(format!(
            "Configuration already exists at {}. Use --force to overwrite.",
            config_path.display()
        )
        .into());
    }

    // Create config directory
    if let Some(parent) = config_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let governor_secret = TokenIssuer::random_secret();
    let token_secret = TokenIssuer::random_secret();
    let storage_path = Config::default_storage_path();

    let content = format!(
        r#"# Statehouse Configuration

[server]
bind = "127.0.0.1:8000"
cors = false

[storage]
path = "{storage}"

[auth]
# Required to register the governor (or set STATEHOUSE_GOVERNOR_SECRET)
governor_secret = "{governor}"
# Signs session tokens (or set STATEHOUSE_TOKEN_SECRET)
token_secret = "{token}"
token_ttl_hours = 24
access_code_length = 8
bcrypt_cost = 12

[logging]
level = "info"
format = "pretty"
"#,
        storage = storage_path.display(),
        governor = governor_secret.expose_secret(),
        token = token_secret.expose_secret(),
    );

    tokio::fs::write(&config_path, content).await?;
    println!("Configuration initialized at {}", config_path.display());

    // Create the store so the passphrase is fixed from the start
    let config = Config::load(&config_path).await?;
    init_storage(&config).await?;
    println!("Store created at {}", config.storage.path.display());

    println!("\nGovernor secret: {}", governor_secret.expose_secret());
    println!("\nNext steps:");
    println!("1. Set STATEHOUSE_STORAGE_KEY or you'll be prompted for the storage password");
    println!("2. Start the API: statehouse serve");
    println!("3. Register the governor: POST /auth/register-governor with the secret above");
    println!("4. Create roles: statehouse role create \"Press Office\" -p manage_news --as <governor>");

    Ok(())
}

async fn show_status(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let storage = init_storage(&config).await?;
    storage.health_check().await?;

    let governor = storage.governor_exists().await?;
    let roles = storage.list_roles().await?.len();
    let users = storage.list_users().await?.len();

    println!("Store:     {}", config.storage.path.display());
    println!("Governor:  {}", if governor { "registered" } else { "not registered" });
    println!("Roles:     {}", roles);
    println!("Users:     {}", users);
    for kind in ContentKind::ALL {
        let count = storage.list_content(kind).await?.len();
        println!("{:<10} {}", format!("{}:", kind), count);
    }

    Ok(())
}

async fn list_roles(
    config: Config,
    actor: ActorArgs,
    format: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let service = init_service(&config).await?;
    let principal = authenticate_actor(&service, &actor).await?;
    let roles = service.list_roles(&principal).await?;

    if roles.is_empty() {
        println!("No roles found");
        return Ok(());
    }

    match format.as_str() {
        "json" => {
            let json = serde_json::to_string_pretty(&roles)?;
            println!("{}", json);
        }
        _ => {
            println!(
                "{:<20} {:<36} {:<10} {}",
                "NAME", "ID", "CODE", "PERMISSIONS"
            );
            println!("{}", "-".repeat(100));
            for role in roles {
                let perms = role
                    .permissions
                    .granted()
                    .map(|p| p.to_string())
                    .collect::<Vec<_>>()
                    .join(",");
                println!(
                    "{:<20} {:<36} {:<10} {}",
                    role.name, role.id, role.access_code, perms
                );
            }
        }
    }

    Ok(())
}

async fn create_role(
    config: Config,
    name: String,
    permissions: String,
    actor: ActorArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let permissions: Permissions = Permission::parse_many(&permissions)?.into_iter().collect();

    let service = init_service(&config).await?;
    let principal = authenticate_actor(&service, &actor).await?;
    let role = service.create_role(&principal, &name, permissions).await?;

    println!("Role '{}' created", role.name);
    println!("  ID:          {}", role.id);
    println!("  Access code: {}", role.access_code);

    Ok(())
}

async fn regenerate_code(
    config: Config,
    id: String,
    actor: ActorArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let service = init_service(&config).await?;
    let principal = authenticate_actor(&service, &actor).await?;
    let role = service.regenerate_code(&principal, &id).await?;

    println!("New access code for '{}': {}", role.name, role.access_code);
    Ok(())
}

async fn delete_role(
    config: Config,
    id: String,
    actor: ActorArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let service = init_service(&config).await?;
    let principal = authenticate_actor(&service, &actor).await?;
    service.delete_role(&principal, &id).await?;

    println!("Role {} deleted", id);
    Ok(())
}

async fn list_users(
    config: Config,
    actor: ActorArgs,
    format: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let service = init_service(&config).await?;
    let principal = authenticate_actor(&service, &actor).await?;
    let users: Vec<UserSummary> = service
        .list_users(&principal)
        .await?
        .iter()
        .map(UserSummary::from)
        .collect();

    match format.as_str() {
        "json" => {
            let json = serde_json::to_string_pretty(&users)?;
            println!("{}", json);
        }
        _ => {
            println!("{:<24} {:<36} {:<36} {}", "USERNAME", "ID", "ROLE", "CREATED");
            println!("{}", "-".repeat(120));
            for user in users {
                println!(
                    "{:<24} {:<36} {:<36} {}",
                    user.username,
                    user.id,
                    user.role,
                    user.created_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
    }

    Ok(())
}

async fn delete_user(
    config: Config,
    id: String,
    actor: ActorArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let service = init_service(&config).await?;
    let principal = authenticate_actor(&service, &actor).await?;
    service.delete_user(&principal, &id).await?;

    println!("User {} deleted", id);
    Ok(())
}
