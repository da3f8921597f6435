//! Conexia CLI - manage a company's projects and trainings

use std::sync::Arc;

use clap::{Parser, Subcommand};
use conexia_core::config::Config;
use conexia_core::gateway::{Gateway, RestGateway};
use conexia_core::navigation::{Screen, menu};
use conexia_core::preferences::{FilePreferences, PreferenceStore};
use conexia_core::session::{CompanyId, SessionContext};
use conexia_core::store::{ProjectStore, TrainingStore};
use conexia_core::view::{ListStatus, ProjectViewController, TrainingAction, TrainingBoard, ViewMode};
use conexia_core::Error;
use tracing::debug;


#[derive(Parser)]
#[command(name = "conexia")]
#[command(author, version, about = "Manage company projects and trainings", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Company whose records are managed
    #[arg(long, global = true, env = "CONEXIA_COMPANY")]
    company: Option<String>,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage projects
    Projects {
        #[command(subcommand)]
        action: ProjectAction,
    },

    /// Manage trainings
    Trainings {
        #[command(subcommand)]
        action: TrainingCommand,
    },

    /// Project list layout
    View {
        #[command(subcommand)]
        action: ViewAction,
    },

    /// Show the sidebar menu
    Menu {
        /// Highlighted screen
        #[arg(short, long, default_value = "dashboard")]
        active: String,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ProjectAction {
    /// List projects, six per page
    List {
        #[arg(short, long, default_value_t = 1)]
        page: usize,
    },
    /// Create a project
    Add { name: String },
    /// Delete a project
    Delete {
        id: String,
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum TrainingCommand {
    /// List trainings and their available actions
    List,
    /// Delete a training
    Delete {
        id: String,
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum ViewAction {
    /// Show the stored layout
    Get,
    /// Store a layout (grid or table)
    Set { mode: ViewMode },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a configuration value
    Get { key: String },
    /// Set a configuration value
    Set { key: String, value: String },
    /// List all configuration values
    List,
    /// Reset configuration to defaults
    Reset,
    /// Show config file path
    Path,
}

/// Shared wiring for commands that talk to the backend
struct App {
    config: Config,
    session: SessionContext,
    gateway: Arc<dyn Gateway>,
}

impl App {
    fn new(company: Option<String>) -> anyhow::Result<Self> {
        let config = Config::load()?;
        let mut builder = RestGateway::builder().config(&config.gateway);
        if let Some(key) = config.gateway.resolved_api_key()? {
            builder = builder.api_key(key);
        }
        let gateway: Arc<dyn Gateway> = Arc::new(builder.build()?);

        let session = SessionContext::new();
        if let Some(company) = company.filter(|c| !c.trim().is_empty()) {
            session.set_company(Some(CompanyId::new(company)));
        }
        debug!(company = ?session.company(), url = %config.gateway.url, "CLI session ready");

        Ok(Self {
            config,
            session,
            gateway,
        })
    }

    fn project_controller(&self) -> anyhow::Result<ProjectViewController> {
        let store = Arc::new(ProjectStore::new(
            self.gateway.clone(),
            &self.config.tables.projects,
            &self.config.tables.company_column,
        ));
        let preferences: Arc<dyn PreferenceStore> =
            Arc::new(FilePreferences::new(Config::preferences_path()?));
        Ok(ProjectViewController::new(
            store,
            self.session.clone(),
            preferences,
            &self.config.ui.view_mode_key,
        ))
    }

    fn training_board(&self) -> TrainingBoard {
        let store = Arc::new(TrainingStore::new(
            self.gateway.clone(),
            &self.config.tables.trainings,
            &self.config.tables.company_column,
        ));
        TrainingBoard::new(store, self.session.clone())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("conexia=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        report(&err);
        std::process::exit(1);
    }
    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let format = cli.format;
    let quiet = cli.quiet;

    match cli.command {
        Commands::Projects { action } => {
            let app = App::new(cli.company)?;
            cmd_projects(&app, action, format, quiet).await
        }

        Commands::Trainings { action } => {
            let app = App::new(cli.company)?;
            cmd_trainings(&app, action, format, quiet).await
        }

        Commands::View { action } => {
            let app = App::new(cli.company)?;
            cmd_view(&app, action, format, quiet)
        }

        Commands::Menu { active } => cmd_menu(&active, format),

        Commands::Config { action } => cmd_config(action, quiet),
    }
}

/// Print an error with its code and a suggested next command
fn report(err: &anyhow::Error) {
    match err.downcast_ref::<Error>() {
        Some(error) => {
            eprintln!("Error [{}]: {}", error.code(), error);
            if let Some(suggestion) = error.suggestion() {
                eprintln!("  Try: {}", suggestion);
            }
        }
        None => eprintln!("Error: {:#}", err),
    }
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ============================================================================
// Command Implementations
// ============================================================================

async fn cmd_projects(
    app: &App,
    action: ProjectAction,
    format: OutputFormat,
    quiet: bool,
) -> anyhow::Result<()> {
    let mut controller = app.project_controller()?;

    match action {
        ProjectAction::List { page } => {
            let company = app.session.require_company()?;
            controller.store().set_company(Some(company)).await;
            controller.go_to_page(page);
            let view = controller.refresh();

            if let ListStatus::Failed(message) = &view.status {
                anyhow::bail!("Failed to load projects: {}", message);
            }

            if format == OutputFormat::Json {
                return print_json(&serde_json::json!({
                    "page": view.current_page,
                    "total_pages": view.total_pages,
                    "total": view.total,
                    "view_mode": view.view_mode.as_str(),
                    "projects": view.projects,
                }));
            }

            if view.projects.is_empty() {
                if !quiet {
                    println!("No projects found.");
                    println!("\nCreate one with: conexia projects add <name>");
                }
                return Ok(());
            }

            if !quiet {
                println!(
                    "Projects (page {}/{}, {} total):",
                    view.current_page, view.total_pages, view.total
                );
            }
            for p in &view.projects {
                let status = if p.active { "" } else { " [inactive]" };
                match view.view_mode {
                    ViewMode::Table => println!("  {:<38} {}{}", p.id, p.name, status),
                    ViewMode::Grid => println!("  [{}] {}{}", p.name, p.id, status),
                }
            }
        }
        ProjectAction::Add { name } => {
            // The duplicate check needs the company's full list
            if let Some(company) = app.session.company() {
                controller.store().set_company(Some(company)).await;
                if let Some(message) = controller.store().error() {
                    anyhow::bail!("Failed to load projects: {}", message);
                }
            }
            let project = controller.add_project(&name).await?;

            if format == OutputFormat::Json {
                return print_json(&project);
            }
            if !quiet {
                println!("Project created successfully!");
                println!("  ID: {}", project.id);
                println!("  Name: {}", project.name);
            }
        }
        ProjectAction::Delete { id, force } => {
            if !force && !quiet {
                println!("Warning: This will permanently delete project '{}'.", id);
                println!("Use --force to confirm deletion.");
                return Ok(());
            }
            let removed = controller.delete_project(&id).await?;
            if !quiet {
                if removed == 0 {
                    println!("No project '{}' found for this company.", id);
                } else {
                    println!("Project '{}' deleted.", id);
                }
            }
        }
    }
    Ok(())
}

async fn cmd_trainings(
    app: &App,
    action: TrainingCommand,
    format: OutputFormat,
    quiet: bool,
) -> anyhow::Result<()> {
    let mut board = app.training_board();

    match action {
        TrainingCommand::List => {
            let company = app.session.require_company()?;
            board.store().set_company(Some(company)).await;
            if let Some(message) = board.store().error() {
                anyhow::bail!("Failed to load trainings: {}", message);
            }

            let rows = board.rows();
            if format == OutputFormat::Json {
                let trainings: Vec<_> = rows.iter().map(|(t, _)| t).collect();
                return print_json(&trainings);
            }

            if rows.is_empty() {
                if !quiet {
                    println!("No trainings found.");
                }
                return Ok(());
            }
            if !quiet {
                println!("Trainings:");
            }
            for (training, actions) in rows {
                let uploadable = actions
                    .iter()
                    .any(|a| matches!(a, TrainingAction::Upload { .. }));
                println!(
                    "  {} - {} ({}){}",
                    training.id,
                    training.name.as_deref().unwrap_or("-"),
                    training.phase,
                    if uploadable { "" } else { " [finished]" }
                );
            }
        }
        TrainingCommand::Delete { id, force } => {
            if !force && !quiet {
                println!("Warning: This will permanently delete training '{}'.", id);
                println!("Use --force to confirm deletion.");
                return Ok(());
            }
            board.open_delete(&id);
            let removed = board.confirm_delete().await?;
            if !quiet {
                if removed == 0 {
                    println!("No training '{}' found for this company.", id);
                } else {
                    println!("Training '{}' deleted.", id);
                }
            }
        }
    }
    Ok(())
}

fn cmd_view(app: &App, action: ViewAction, format: OutputFormat, quiet: bool) -> anyhow::Result<()> {
    let mut controller = app.project_controller()?;

    match action {
        ViewAction::Get => {
            let mode = controller.view_mode();
            if format == OutputFormat::Json {
                return print_json(&serde_json::json!({ "view_mode": mode.as_str() }));
            }
            println!("{}", mode);
        }
        ViewAction::Set { mode } => {
            controller.set_view_mode(mode)?;
            if !quiet {
                println!("View mode set to {}.", mode);
            }
        }
    }
    Ok(())
}

fn cmd_menu(active: &str, format: OutputFormat) -> anyhow::Result<()> {
    let screen = Screen::parse(active)
        .ok_or_else(|| Error::InvalidInput(format!("unknown screen '{}'", active)))?;
    let items = menu(screen);

    if format == OutputFormat::Json {
        return print_json(&items);
    }
    for item in items {
        let marker = if item.active { ">" } else { " " };
        let route = item
            .screen
            .map(|s| s.path().unwrap_or("(in place)"))
            .unwrap_or("(disabled)");
        println!("{} {:<14} {}", marker, item.label, route);
    }
    Ok(())
}

fn cmd_config(action: ConfigAction, quiet: bool) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            let value = config.get(&key)?;
            println!("{}", value);
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            if !quiet {
                println!("Set {} = {}", key, value);
            }
        }
        ConfigAction::List => {
            let config = Config::load()?;
            let items = config.list()?;
            for (key, value) in items {
                println!("{} = {}", key, value);
            }
        }
        ConfigAction::Reset => {
            Config::reset()?;
            if !quiet {
                println!("Configuration reset to defaults.");
            }
        }
        ConfigAction::Path => {
            let path = Config::config_path()?;
            println!("{}", path.display());
        }
    }
    Ok(())
}
