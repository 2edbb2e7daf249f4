//! Filtervault CLI
//!
//! Command-line interface for the filtervault template database.
//!
//! # Usage
//!
//! ```bash
//! # Paste the auth blob from the browser login flow
//! filtervault login <blob>
//!
//! # Check the current session
//! filtervault status
//!
//! # List your templates
//! filtervault templates list
//! ```

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt};

use filtervault_core::{
    ApiClient, FileTokenStore,
    models::{
        ApiResponse, CreateTemplateRequest, PublicTemplateList, Template, TemplateDetailed,
        TemplateType, UpdateAdminRequest, UpdateTemplateRequest,
    },
    routes,
};

mod config;

#[derive(Parser)]
#[command(name = "filtervault")]
#[command(about = "Browse and manage item filter templates")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Template type to operate on
    #[arg(short = 't', long, global = true, default_value = routes::types::ITEM_FILTER_LIBRARY)]
    template_type: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store the auth blob produced by the browser login flow
    Login {
        /// Base64-encoded auth data
        blob: String,
    },

    /// Show the current session state
    Status,

    /// Drop the current session
    Logout,

    /// Check backend reachability
    Ping,

    /// Template operations
    #[command(subcommand)]
    Templates(TemplateCommands),

    /// User administration (admin only)
    #[command(subcommand)]
    Users(UserCommands),
}

#[derive(Subcommand)]
enum UserCommands {
    /// Show a user's profile
    Show { user_id: String },

    /// Grant or revoke admin rights
    SetAdmin {
        user_id: String,

        #[arg(action = clap::ArgAction::Set)]
        is_admin: bool,
    },
}

#[derive(Subcommand)]
enum TemplateCommands {
    /// List the template types the backend serves
    Types,

    /// List your templates
    List,

    /// Browse public templates
    Public {
        #[arg(short, long, default_value_t = 1)]
        page: u32,

        #[arg(short, long, default_value_t = 20)]
        limit: u32,
    },

    /// Fetch a single template with its content
    Show {
        template_id: String,

        /// Include every stored version
        #[arg(long)]
        all_versions: bool,
    },

    /// Create a template from a content file
    Create {
        name: String,

        /// Path to a JSON content file
        #[arg(short, long)]
        file: std::path::PathBuf,

        /// Make the template publicly visible
        #[arg(long)]
        public: bool,
    },

    /// Update an existing template
    Update {
        template_id: String,

        name: String,

        /// Path to a JSON content file
        #[arg(short, long)]
        file: std::path::PathBuf,

        /// Notes describing the change
        #[arg(long)]
        notes: Option<String>,

        /// Change public visibility
        #[arg(long)]
        public: Option<bool>,
    },

    /// Delete a template
    Delete { template_id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::load_config()?;

    init_logging(cli.verbose, &config.log_level);

    debug!(base_url = %config.base_url, "connecting to backend");
    let store = FileTokenStore::new(config.token_path());
    let client = ApiClient::new(config.base_url.clone(), store).await?;

    match cli.command {
        Commands::Login { blob } => {
            client.login(&blob).await?;
            let creds = client.credentials().await?;
            println!("Logged in as {}", creds.user_id);
            Ok(())
        }
        Commands::Status => status(&client).await,
        Commands::Logout => {
            client.logout().await?;
            println!("Logged out");
            Ok(())
        }
        Commands::Ping => {
            let _: serde_json::Value = client.get(&routes::health::ping()).await?;
            println!("Backend at {} is reachable", config.base_url);
            Ok(())
        }
        Commands::Templates(command) => {
            if !client.initialize().await {
                bail!("not authenticated; run `filtervault login <blob>` first");
            }
            run_template_command(&client, &cli.template_type, command).await
        }
        Commands::Users(command) => {
            if !client.initialize().await {
                bail!("not authenticated; run `filtervault login <blob>` first");
            }
            run_user_command(&client, command).await
        }
    }
}

fn init_logging(verbose: bool, log_level: &str) {
    let default = if verbose { "debug" } else { log_level };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt().with_env_filter(filter).with_target(false).init();
}

async fn status(client: &ApiClient<FileTokenStore>) -> Result<()> {
    if client.initialize().await {
        let creds = client.credentials().await?;
        println!("Session: active");
        println!("User:    {}", creds.user_id);
        if creds.is_admin {
            println!("Role:    admin");
        }
    } else {
        println!("Session: not authenticated");
        println!(
            "Visit {}{} to obtain a login blob, then run `filtervault login <blob>`",
            client.base_url(),
            routes::auth::login()
        );
    }
    Ok(())
}

async fn run_user_command(
    client: &ApiClient<FileTokenStore>,
    command: UserCommands,
) -> Result<()> {
    match command {
        UserCommands::Show { user_id } => {
            let user: serde_json::Value = client.get(&routes::users::get(&user_id)).await?;
            println!("{}", serde_json::to_string_pretty(&user)?);
        }
        UserCommands::SetAdmin { user_id, is_admin } => {
            let body = UpdateAdminRequest { is_admin };
            let _: serde_json::Value = client
                .put(&routes::users::set_admin(&user_id), &body)
                .await?;
            println!(
                "{} is {} an admin",
                user_id,
                if is_admin { "now" } else { "no longer" }
            );
        }
    }
    Ok(())
}

async fn run_template_command(
    client: &ApiClient<FileTokenStore>,
    type_id: &str,
    command: TemplateCommands,
) -> Result<()> {
    match command {
        TemplateCommands::Types => {
            let types: ApiResponse<Vec<TemplateType>> =
                client.get(&routes::templates::types()).await?;
            for t in types.data {
                println!("{}\t{}", t.type_id, t.name);
            }
        }
        TemplateCommands::List => {
            let templates: ApiResponse<Vec<Template>> =
                client.get(&routes::templates::mine(type_id)).await?;
            print_templates(&templates.data);
        }
        TemplateCommands::Public { page, limit } => {
            let list: ApiResponse<PublicTemplateList> = client
                .get(&routes::templates::public_list(type_id, page, limit))
                .await?;
            print_templates(&list.data.data);
            if let Some(p) = list.data.pagination {
                println!("page {}/{} ({} total)", p.current_page, p.last_page, p.total_items);
            }
        }
        TemplateCommands::Show {
            template_id,
            all_versions,
        } => {
            let template: ApiResponse<TemplateDetailed> = client
                .get(&routes::templates::get(type_id, &template_id, all_versions))
                .await?;
            let t = template.data;
            println!("{} (v{}) by {}", t.name, t.version, t.creator_name.as_deref().unwrap_or("?"));
            if let Some(latest) = &t.latest_version {
                println!("{}", serde_json::to_string_pretty(&latest.content)?);
            }
            for version in &t.versions {
                println!("-- version {}", version.version_number);
            }
        }
        TemplateCommands::Create { name, file, public } => {
            let content = read_content(&file)?;
            let body = CreateTemplateRequest {
                name,
                content,
                is_public: public,
            };
            let created: ApiResponse<Template> = client
                .post(&routes::templates::create(type_id), &body)
                .await?;
            println!("Created {} ({})", created.data.name, created.data.template_id);
        }
        TemplateCommands::Update {
            template_id,
            name,
            file,
            notes,
            public,
        } => {
            let content = read_content(&file)?;
            let body = UpdateTemplateRequest {
                name,
                content,
                change_notes: notes,
                is_public: public,
            };
            let updated: ApiResponse<Template> = client
                .put(&routes::templates::update(type_id, &template_id), &body)
                .await?;
            println!("Updated {} to v{}", updated.data.name, updated.data.version);
        }
        TemplateCommands::Delete { template_id } => {
            let _: serde_json::Value = client
                .delete(&routes::templates::delete(type_id, &template_id))
                .await?;
            println!("Deleted {template_id}");
        }
    }
    Ok(())
}

fn print_templates(templates: &[Template]) {
    if templates.is_empty() {
        println!("no templates");
        return;
    }
    for t in templates {
        let visibility = if t.is_public { "public" } else { "private" };
        println!(
            "{}\tv{}\t{}\t{}",
            t.template_id, t.version, visibility, t.name
        );
    }
}

fn read_content(path: &std::path::Path) -> Result<serde_json::Value> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read content file {:?}", path))?;
    serde_json::from_str(&raw).with_context(|| format!("Content file {:?} is not valid JSON", path))
}
