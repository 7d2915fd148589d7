//! The extension and bot control commands
//!
//! Every subcommand except `invite` silently ignores users that are not in
//! [`ALLOWED_USERS`](constants::authorization::ALLOWED_USERS).

use crate::{
	constants,
	extensions::Extension,
	paginator::Paginator,
	states::{Context, Data, InteractionResult},
};
use poise::{async_trait, command, serenity_prelude::UserId};
use std::error::Error as StdError;

mod extensions;
mod invite;
mod rtt;
mod shutdown;
pub(crate) mod sync;

use extensions::{jsk_load, jsk_unload};
use invite::jsk_invite;
use rtt::jsk_rtt;
use shutdown::jsk_shutdown;
use sync::jsk_sync;

/// Name of the extension owning the `jsk` commands
pub(crate) const TOOLKIT_EXTENSION: &str = "jsk";

/// The extension holding the toolkit commands themselves
pub(crate) struct Toolkit;

#[async_trait]
impl Extension for Toolkit {
	fn name(&self) -> &'static str {
		TOOLKIT_EXTENSION
	}

	async fn setup(&self, _data: &Data) -> anyhow::Result<()> {
		tracing::debug!("toolkit commands enabled");
		Ok(())
	}

	async fn teardown(&self, _data: &Data) -> anyhow::Result<()> {
		tracing::debug!("toolkit commands disabled");
		Ok(())
	}
}

/// Extension management and bot control
#[allow(clippy::unused_async)]
#[command(
	prefix_command,
	slash_command,
	hide_in_help,
	category = "jsk",
	subcommands(
		"jsk_load",
		"jsk_unload",
		"jsk_shutdown",
		"jsk_invite",
		"jsk_rtt",
		"jsk_sync"
	)
)]
pub(crate) async fn jsk(_: Context<'_>) -> InteractionResult {
	Ok(())
}

/// Whether the user may run the gated subcommands
pub(crate) fn is_authorized(user_id: UserId) -> bool {
	constants::authorization::ALLOWED_USERS.contains(&user_id.get())
}

/// Split a free text argument into words
fn split_arguments(arguments: Option<&str>) -> impl Iterator<Item = &str> + Send {
	arguments.unwrap_or_default().split_whitespace()
}

/// Render an error followed by its causes, one per line
fn error_report(error: &(dyn StdError + 'static)) -> String {
	let mut report = error.to_string();
	let mut source = error.source();

	while let Some(cause) = source {
		report.push_str("\ncaused by: ");
		report.push_str(&cause.to_string());
		source = cause.source();
	}

	report
}

/// Send each page as its own message
async fn send_pages(ctx: Context<'_>, paginator: Paginator) -> InteractionResult {
	for page in paginator.into_pages() {
		ctx.say(page).await?;
	}

	Ok(())
}
