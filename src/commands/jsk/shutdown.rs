//! Log the bot out

use super::is_authorized;
use crate::{
	states::{Context, InteractionResult},
	translation::Translate,
};
use poise::command;

/// Logs this bot out
#[command(prefix_command, slash_command, rename = "shutdown", aliases("logout"))]
#[tracing::instrument(skip(ctx), fields(caller_id = %ctx.author().id))]
pub(super) async fn jsk_shutdown(ctx: Context<'_>) -> InteractionResult {
	if !is_authorized(ctx.author().id) {
		return Ok(());
	}

	ctx.say(ctx.translate("jsk_shutdown-logging-out", None))
		.await?;

	let data = ctx.data();
	for name in data.extensions.loaded().await {
		if let Err(error) = data.extensions.unload(&name, data).await {
			tracing::warn!(error = ?error, "could not unload `{}` before shutdown", name);
		}
	}

	tracing::info!("shutting down every shard");
	ctx.framework().shard_manager().shutdown_all().await;

	Ok(())
}
