//! `Discord` client events handlers

use crate::{
	commands::jsk::sync::{overwrite_commands, ScopePayload, SyncTarget},
	states::{ArcData, FrameworkContext, InteractionResult},
};
use anyhow::Context;
use poise::serenity_prelude::{self, FullEvent};

/// Serenity listener to react to `Discord` events
pub(crate) async fn event_handler(
	ctx: &serenity_prelude::Context,
	event: &FullEvent,
	framework: FrameworkContext<'_>,
	data: &ArcData,
) -> InteractionResult {
	match event {
		FullEvent::Ready { data_about_bot } => {
			// Development commands must be reachable to run `jsk sync` at all
			let development_guild = data.config.discord_development_guild;
			let target = SyncTarget::Guild(development_guild);
			let payload =
				ScopePayload::collect(&framework.options.commands, development_guild, target);

			let registered = overwrite_commands(&ctx.http, target, payload.commands)
				.await
				.context("Could not register guild commands")?;

			tracing::info!(
				guild_id = development_guild.get(),
				count = registered.len(),
				"development commands registered",
			);
			tracing::info!("`{}` is ready!", data_about_bot.user.name);

			Ok(())
		}

		FullEvent::ShardsReady { total_shards } => {
			tracing::debug!(total_shards = *total_shards, "every shard is ready");

			Ok(())
		}

		_ => {
			tracing::trace!(event = ?event, "missed event");

			Ok(())
		}
	}
}
