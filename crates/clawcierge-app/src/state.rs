use std::sync::Arc;

use clawcierge::Config;
use clawcierge::credential::CredentialStore;
use clawcierge::dispatch::Dispatcher;
use clawcierge::registry::ConnectionRegistry;
use clawcierge::store::Store;
use clawcierge::tracker::RequestTracker;
use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
	pub store: Store,
	pub credential: CredentialStore,
	pub registry: ConnectionRegistry,
	pub tracker: RequestTracker,
	pub dispatcher: Arc<Dispatcher>,
	pub config: Arc<Config>,
}

impl AppState {
	pub fn new(pool: PgPool, config: Config) -> Self {
		let store = Store::new(pool.clone());
		let credential = CredentialStore::new(pool.clone());
		let registry = ConnectionRegistry::new();
		let tracker = RequestTracker::new(pool, config.request_expiry());
		let dispatcher = Arc::new(Dispatcher::new(
			store.clone(),
			registry.clone(),
			tracker.clone(),
			config.pipeline_stage_timeout(),
		));
		Self {
			store,
			credential,
			registry,
			tracker,
			dispatcher,
			config: Arc::new(config),
		}
	}
}
