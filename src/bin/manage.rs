//! `cantina-manage`: management commands of the canteen service.
//!
//! ```bash
//! cantina-manage migrate
//! cantina-manage create-employee --username admin --password 'change-me-now' \
//!     --role ADMINISTRATOR --first-name Ana --last-name Benítez
//! cantina-manage runserver --port 8080
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use cantina::services::auth::{NewEmployeeInput, create_employee};
use cantina::state::AppState;
use cantina::tasks::{BalanceScanTask, OverdueFeesTask, TaskRunner};
use cantina::urls::build_handler;
use cantina_conf::{LogFormat, Settings};
use cantina_core::enums::Role;
use cantina_db::Database;
use cantina_db::repositories::audit::Actor;
use cantina_http::{HttpServer, ShutdownCoordinator, shutdown_signal};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cantina-manage")]
#[command(about = "School canteen management commands", long_about = None)]
#[command(version)]
struct Cli {
	/// Settings file (defaults to ./cantina.toml)
	#[arg(long, global = true, env = "CANTINA_SETTINGS")]
	settings: Option<PathBuf>,

	#[command(subcommand)]
	command: Commands,
}

#[derive(Subcommand)]
enum Commands {
	/// Start the HTTP server and the background tasks
	Runserver {
		/// Overrides server.host
		#[arg(long)]
		host: Option<String>,

		/// Overrides server.port
		#[arg(long)]
		port: Option<u16>,

		/// Do not start the background task runner
		#[arg(long)]
		no_tasks: bool,
	},

	/// Apply database migrations
	Migrate,

	/// Create an employee account
	CreateEmployee {
		#[arg(long)]
		username: String,

		#[arg(long)]
		password: String,

		/// CASHIER, MANAGER or ADMINISTRATOR
		#[arg(long, value_parser = parse_role)]
		role: Role,

		#[arg(long)]
		first_name: String,

		#[arg(long)]
		last_name: String,
	},

	/// Validate the settings and the database connection
	Check,

	/// Run one balance and overdue-fee notification scan
	NotifyBalances,
}

fn parse_role(raw: &str) -> Result<Role, String> {
	raw.trim().to_uppercase().parse::<Role>().map_err(|error| error.to_string())
}

fn init_logging(settings: &Settings) {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));
	let builder = tracing_subscriber::fmt().with_env_filter(filter);
	match settings.logging.format {
		LogFormat::Json => builder.json().init(),
		LogFormat::Pretty => builder.init(),
	}
}

async fn open_database(settings: &Settings) -> anyhow::Result<Database> {
	Database::connect(&settings.database.url, settings.database.max_connections)
		.await
		.with_context(|| format!("cannot open database {}", settings.database.url))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let cli = Cli::parse();
	let settings = Settings::load(cli.settings.as_deref()).context("invalid settings")?;
	init_logging(&settings);

	match cli.command {
		Commands::Runserver { host, port, no_tasks } => runserver(settings, host, port, no_tasks).await,
		Commands::Migrate => {
			let db = open_database(&settings).await?;
			db.migrate().await?;
			db.close().await;
			println!("Migrations applied.");
			Ok(())
		}
		Commands::CreateEmployee {
			username,
			password,
			role,
			first_name,
			last_name,
		} => {
			let db = open_database(&settings).await?;
			let state = AppState::new(db, settings);
			let input = NewEmployeeInput {
				username,
				password,
				first_name,
				last_name,
				role,
			};
			let employee = create_employee(&state, Actor::System, &input).await?;
			state.db.close().await;
			println!("Created employee '{}' ({}) with id {}.", employee.username, employee.role, employee.id);
			Ok(())
		}
		Commands::Check => {
			let db = open_database(&settings).await?;
			db.ping().await.context("database ping failed")?;
			db.close().await;
			println!(
				"Settings OK. Database {} reachable. Server would listen on {}.",
				settings.database.url,
				settings.server.address()
			);
			Ok(())
		}
		Commands::NotifyBalances => {
			let db = open_database(&settings).await?;
			let state = AppState::new(db, settings);
			TaskRunner::new(Duration::ZERO)
				.with_task(Arc::new(BalanceScanTask))
				.with_task(Arc::new(OverdueFeesTask))
				.run_once(&state)
				.await;
			state.db.close().await;
			Ok(())
		}
	}
}

async fn runserver(mut settings: Settings, host: Option<String>, port: Option<u16>, no_tasks: bool) -> anyhow::Result<()> {
	if let Some(host) = host {
		settings.server.host = host;
	}
	if let Some(port) = port {
		settings.server.port = port;
	}
	let addr: SocketAddr = match settings.server.address().parse() {
		Ok(addr) => addr,
		Err(_) => bail!("invalid listen address {}", settings.server.address()),
	};

	let db = open_database(&settings).await?;
	if settings.database.migrate_on_start {
		db.migrate().await?;
	}
	let coordinator = ShutdownCoordinator::new(Duration::from_secs(settings.server.shutdown_timeout_secs));
	let run_tasks = settings.tasks.enabled && !no_tasks;
	let interval = Duration::from_secs(settings.tasks.interval_secs);
	let state = AppState::new(db, settings);

	let tasks = run_tasks.then(|| {
		let runner = TaskRunner::standard(interval);
		tokio::spawn(runner.run(state.clone(), coordinator.subscribe()))
	});

	let server = HttpServer::new(build_handler(&state));
	let server_coordinator = coordinator.clone();
	let server_task = tokio::spawn(async move { server.listen_with_shutdown(addr, server_coordinator).await });

	tracing::info!(%addr, "cantina is up");
	shutdown_signal().await;
	coordinator.shutdown();

	if !coordinator.wait_for_shutdown().await {
		tracing::warn!(timeout_secs = coordinator.timeout().as_secs(), "shutdown timed out");
	}
	match server_task.await {
		Ok(Ok(())) => {}
		Ok(Err(error)) => tracing::error!(%error, "server stopped with an error"),
		Err(error) => tracing::error!(%error, "server task panicked"),
	}
	if let Some(tasks) = tasks
		&& let Err(error) = tasks.await
	{
		tracing::error!(%error, "task runner panicked");
	}
	state.db.close().await;
	tracing::info!("shutdown complete");
	Ok(())
}
