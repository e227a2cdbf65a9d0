use campus::admin::{AppState, api_router};
use campus::collaborators::LocalObjectStore;
use campus::config::{AppConfig, redact_db_url};
use campus::crypto;
use campus::tenancy::{NewSchool, NewSchoolAdmin, ProvisionPhase};
use clap::{Parser, Subcommand};
use migration::{Migrator, MigratorTrait};
use sea_orm::Database;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

#[derive(Parser)]
#[command(name = "campus", about = "Campus - multi-tenant school management backend")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server (default)
    Serve,
    /// Provision a school and its database
    Provision(ProvisionArgs),
    /// Apply pending migrations to every school database
    MigrateTenants,
    /// Finish provisioning for schools left incomplete
    Reconcile,
    /// Manage control-plane users
    User {
        #[command(subcommand)]
        action: UserAction,
    },
}

#[derive(clap::Args)]
struct ProvisionArgs {
    /// JSON file with the full school request; overrides the other flags
    #[arg(long)]
    file: Option<PathBuf>,
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    address: Option<String>,
    /// Board id; repeat for several boards
    #[arg(long = "board")]
    boards: Vec<i32>,
    #[arg(long)]
    admin_user: Option<String>,
    #[arg(long)]
    admin_email: Option<String>,
    #[arg(long)]
    admin_password: Option<String>,
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a platform superadmin
    CreateSuperuser {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Init structured logging (respects RUST_LOG; defaults to info)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    // Load .env if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = AppConfig::from_env()?;

    tracing::info!(database = %redact_db_url(&config.database_url), "connecting to control database");
    let db = Database::connect(&config.database_url).await?;
    Migrator::up(&db, None).await?;
    tracing::info!("control database initialized");

    let master_key = config.encryption_key.unwrap_or_else(|| {
        tracing::warn!(
            "CAMPUS_ENCRYPTION_KEY not set; using a random key. \
             Stored tenant credentials will be unreadable after restart. \
             Set CAMPUS_ENCRYPTION_KEY to a 64-char hex string in production."
        );
        crypto::random_key()
    });
    let jwt_secret = config.jwt_secret.clone().unwrap_or_else(|| {
        tracing::warn!(
            "CAMPUS_JWT_SECRET not set; using a random secret. \
             Tokens will be invalidated on every restart."
        );
        crypto::random_hex(32)
    });

    let mut state = AppState::new(
        db.clone(),
        config.tenant_server(&db),
        master_key,
        config.tenant_credentials.clone(),
        jwt_secret,
    );
    state.jwt_expiry_hours = config.jwt_expiry_hours;
    state.provision_timeout = config.provision_timeout;
    state.object_store = Arc::new(LocalObjectStore::new(config.storage_dir.clone()));

    match cli.command {
        None | Some(Commands::Serve) => serve(state, &config).await?,
        Some(Commands::Provision(args)) => provision(&state, args).await?,
        Some(Commands::MigrateTenants) => {
            let report = state.provisioner.migrate_all_tenants().await?;
            for f in &report.failed {
                tracing::error!(db = %f.db_key, error = %f.error, "tenant migration failed");
            }
            tracing::info!(
                succeeded = report.succeeded.len(),
                failed = report.failed.len(),
                "tenant migrations finished"
            );
            if !report.failed.is_empty() {
                std::process::exit(1);
            }
        }
        Some(Commands::Reconcile) => {
            state.loader.ensure_loaded().await?;
            let report = state.provisioner.reconcile_incomplete().await?;
            tracing::info!(
                resumed = report.resumed.len(),
                failed = report.failed.len(),
                "reconcile finished"
            );
        }
        Some(Commands::User { action }) => match action {
            UserAction::CreateSuperuser {
                username,
                email,
                password,
            } => {
                let user = state.auth.create_superuser(&username, &email, &password).await?;
                tracing::info!(username = %user.user_name, "created superuser");
            }
        },
    }

    Ok(())
}

async fn serve(state: AppState, config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    if state.auth.count_users().await? == 0 {
        tracing::warn!(
            "No users found. Create a superadmin with `campus user create-superuser` before logging in."
        );
    }

    let loaded = state.loader.ensure_loaded().await?;
    tracing::info!(
        loaded = loaded.loaded.len(),
        failed = loaded.failed.len(),
        "tenant databases registered"
    );

    // Schools interrupted mid-provisioning are finished before traffic starts.
    match state.provisioner.reconcile_incomplete().await {
        Ok(report) if !report.resumed.is_empty() || !report.failed.is_empty() => {
            tracing::info!(
                resumed = report.resumed.len(),
                failed = report.failed.len(),
                "reconciled incomplete schools"
            );
        }
        Ok(_) => {}
        Err(e) => tracing::error!(error = %e, "reconcile failed"),
    }

    let listener = TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "API online");
    axum::serve(listener, api_router(state, &config.cors_allowed_origins)).await?;
    Ok(())
}

async fn provision(state: &AppState, args: ProvisionArgs) -> Result<(), Box<dyn std::error::Error>> {
    let request = match args.file {
        Some(path) => serde_json::from_str::<NewSchool>(&tokio::fs::read_to_string(path).await?)?,
        None => {
            let missing = |flag: &str| format!("--{flag} is required without --file");
            NewSchool {
                name: args.name.ok_or_else(|| missing("name"))?,
                address: args.address.ok_or_else(|| missing("address"))?,
                contact_number: None,
                email: None,
                board_ids: args.boards,
                admin: NewSchoolAdmin {
                    user_name: args.admin_user.ok_or_else(|| missing("admin-user"))?,
                    email: args.admin_email.ok_or_else(|| missing("admin-email"))?,
                    password: args.admin_password.ok_or_else(|| missing("admin-password"))?,
                    first_name: None,
                    last_name: None,
                    phone_number: None,
                },
                academic_start_year: None,
                academic_end_year: None,
            }
        }
    };

    state.loader.ensure_loaded().await?;
    let school = state
        .provisioner
        .provision_with_progress(request, &|phase: ProvisionPhase, detail: &str| {
            tracing::info!(phase = phase.as_str(), "{detail}");
        })
        .await?;
    println!("{}", serde_json::to_string_pretty(&school)?);
    Ok(())
}
