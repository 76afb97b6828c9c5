//! Structured logging bootstrap. Compact line output in `development`; JSON elsewhere, so
//! log aggregation in a real deployment gets parseable records without a separate toggle.

use tracing_subscriber::EnvFilter;

pub fn init(log_level: &str, app_env: &str) {
	let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
	let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
	if app_env == "development" {
		subscriber.compact().init();
	} else {
		subscriber.json().init();
	}
}
