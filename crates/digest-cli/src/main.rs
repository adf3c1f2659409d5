//! Digest bot role administration.
//!
//! ```bash
//! digest-roles check alice can_access_sources
//! digest-roles roles set tester -p can_access_sources -p can_access_analysis
//! digest-roles --source roster serve
//! ```

use std::error::Error;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use digest_access::RoleManager;
use digest_core::config;
use digest_directory::{
    DirectoryConfig, DirectoryService, DirectorySource, HrTableConfig, HrTableSource,
    RosterFileSource,
};
use digest_models::{Permission, RoleDefinition};
use digest_persistence::FileRoleStore;
use tracing_subscriber::EnvFilter;

/// Digest bot roles - check access and manage role definitions
#[derive(Parser, Debug)]
#[command(name = "digest-roles")]
#[command(about = "Check access and manage roles for the digest bot")]
struct Args {
    /// Where user records come from
    #[arg(long, value_enum, default_value_t = SourceKind::HrTable)]
    source: SourceKind,

    /// Verbose logging (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum SourceKind {
    /// HR table API (HR_TABLE_* variables)
    HrTable,
    /// Local roster document (DIGEST_ROSTER_FILE)
    Roster,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check whether a user may use the bot, or a single permission
    Check {
        username: String,
        permission: Option<Permission>,
    },
    /// List known permissions
    Permissions,
    /// Manage role definitions
    Roles {
        #[command(subcommand)]
        action: RolesCommand,
    },
    /// Refresh the directory mirror once
    Sync,
    /// Keep the directory in sync until Ctrl+C
    Serve,
}

#[derive(Subcommand, Debug)]
enum RolesCommand {
    /// List all roles
    List,
    /// Show one role
    Show { name: String },
    /// Create or replace a role
    Set {
        name: String,
        #[arg(short, long, default_value = "")]
        description: String,
        /// Permission to grant (repeatable)
        #[arg(short = 'p', long = "permission")]
        permissions: Vec<Permission>,
    },
    /// Delete a role
    Delete { name: String },
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn Error>> {
    let args = Args::parse();

    // Load environment variables from config directory first
    let env_path = config::env_file();
    if env_path.exists() {
        let _ = dotenvy::from_path(&env_path);
    }
    let _ = dotenvy::from_filename(".env.local").or_else(|_| dotenvy::dotenv());

    let filter = match args.verbose {
        0 => "warn,digest_directory=info,digest_access=info",
        1 => "info,digest_directory=debug,digest_access=debug,digest_persistence=debug",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = config::ensure_all_dirs() {
        tracing::warn!(error = %e, "Failed to create state directories");
    }

    match args.command {
        Command::Permissions => {
            for permission in Permission::ALL {
                println!("{:<22} {}", permission.as_str(), permission.description());
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Check {
            username,
            permission,
        } => check(args.source, &username, permission).await,
        Command::Roles { action } => roles(args.source, action).await,
        Command::Sync => {
            let directory = open_directory(args.source)?;
            let count = directory.sync_now().await?;
            directory.shutdown().await?;
            println!("Synced {} users", count);
            Ok(ExitCode::SUCCESS)
        }
        Command::Serve => serve(args.source).await,
    }
}

fn open_directory(kind: SourceKind) -> Result<Arc<DirectoryService>, Box<dyn Error>> {
    let source: Arc<dyn DirectorySource> = match kind {
        SourceKind::HrTable => Arc::new(HrTableSource::new(HrTableConfig::from_env()?)?),
        SourceKind::Roster => Arc::new(RosterFileSource::new(config::roster_file())),
    };
    let directory_config =
        DirectoryConfig::from_env().with_mirror_path(config::directory_mirror_file());
    Ok(Arc::new(DirectoryService::new(source, directory_config)))
}

fn open_manager(directory: &Arc<DirectoryService>) -> Result<RoleManager, Box<dyn Error>> {
    let store = FileRoleStore::open(config::roles_file())?;
    Ok(RoleManager::new(directory.clone(), Arc::new(store)))
}

async fn check(
    kind: SourceKind,
    username: &str,
    permission: Option<Permission>,
) -> Result<ExitCode, Box<dyn Error>> {
    let directory = open_directory(kind)?;
    directory.restore_mirror().await?;
    let manager = open_manager(&directory)?;

    let result = match permission {
        Some(permission) => manager.check_permission_result(username, permission).await,
        None => manager.check_user_access(username).await,
    };

    let role = result.resolved_role.as_deref().unwrap_or("-");
    if result.granted {
        println!("granted (role: {})", role);
        if permission.is_none() {
            for p in manager.get_user_permissions_by_username(username).await {
                println!("  {}", p);
            }
        }
        Ok(ExitCode::SUCCESS)
    } else {
        println!("denied: {} (role: {})", result.reason(), role);
        Ok(ExitCode::FAILURE)
    }
}

async fn roles(kind: SourceKind, action: RolesCommand) -> Result<ExitCode, Box<dyn Error>> {
    let directory = open_directory(kind)?;
    let manager = open_manager(&directory)?;

    match action {
        RolesCommand::List => {
            let roles = manager.get_all_roles().await?;
            if roles.is_empty() {
                println!("No roles defined");
            }
            for role in roles {
                println!("{:<16} {}", role.role_name, role.permission_names().join(", "));
            }
        }
        RolesCommand::Show { name } => match manager.get_role_permissions(&name).await? {
            Some(role) => print_role(&role),
            None => {
                println!("Role not found: {}", name);
                return Ok(ExitCode::FAILURE);
            }
        },
        RolesCommand::Set {
            name,
            description,
            permissions,
        } => {
            let role = RoleDefinition::with_permissions(name, description, permissions);
            manager.upsert_role(role.clone()).await?;
            print_role(&role);
        }
        RolesCommand::Delete { name } => {
            if manager.delete_role(&name).await? {
                println!("Deleted role {}", name);
            } else {
                println!("Role not found: {}", name);
                return Ok(ExitCode::FAILURE);
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn serve(kind: SourceKind) -> Result<ExitCode, Box<dyn Error>> {
    let directory = open_directory(kind)?;
    let manager = open_manager(&directory)?;

    directory.init().await?;
    if manager.ensure_default_roles().await? {
        println!("Created default admin role");
    }
    directory.start_periodic_sync().await;

    println!(
        "Directory sync running every {}s, {} users cached",
        directory.config().sync_interval.as_secs(),
        directory.cached_users().await
    );
    println!("   Press Ctrl+C to stop\n");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    directory.shutdown().await?;
    Ok(ExitCode::SUCCESS)
}

fn print_role(role: &RoleDefinition) {
    println!("{}", role.role_name.trim());
    if !role.description.is_empty() {
        println!("  {}", role.description);
    }
    println!("  updated {}", role.updated_at.format("%Y-%m-%d %H:%M:%S UTC"));
    for permission in &role.permissions {
        println!("  - {:<22} {}", permission.as_str(), permission.description());
    }
}
