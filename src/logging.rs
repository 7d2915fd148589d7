//! Tracing subscriber setup

use crate::states::Data;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Default filter when `RUST_LOG` is not set
const DEFAULT_FILTER: &str = "info,discord_devtools=debug";

/// Install the global subscriber, JSON formatted in production
pub(crate) fn setup_logging(data: &Data) -> anyhow::Result<()> {
	let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(DEFAULT_FILTER))?;
	let registry = tracing_subscriber::registry().with(filter);

	if data.config.production {
		registry.with(fmt::layer().json()).try_init()?;
	} else {
		registry.with(fmt::layer().with_target(false)).try_init()?;
	}

	Ok(())
}
