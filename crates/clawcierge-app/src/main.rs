#[cfg(target_os = "linux")]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use clap::Parser;
use clawcierge::Config;
use clawcierge_app::state::AppState;
use clawcierge_app::{build_router, spawn_expiry_sweeper};
use sqlx::postgres::PgPoolOptions;

#[derive(Parser, Debug)]
#[command(name = "clawcierge", about = "Clawcierge agent registry and dispatch platform")]
struct Args {
	/// Override the configured bind address (defaults to BIND_ADDR env / 0.0.0.0:8080).
	#[arg(long)]
	bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();
	let config = Config::from_env()?;
	clawcierge::telemetry::init(&config.log_level, &config.app_env);

	let pool = PgPoolOptions::new()
		.max_connections(20)
		.connect(&config.database_url)
		.await?;
	sqlx::migrate!("./migrations").run(&pool).await?;

	let state = AppState::new(pool, config.clone());
	spawn_expiry_sweeper(state.clone());

	let app = build_router(state);
	let bind_addr = args.bind.unwrap_or(config.bind_addr);
	tracing::info!(%bind_addr, app_env = %config.app_env, "clawcierge listening");
	let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
	axum::serve(listener, app).await?;
	Ok(())
}
