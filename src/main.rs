//! Discord bot debugging toolkit

mod commands;
mod constants;
mod events;
mod extensions;
mod logging;
mod paginator;
mod states;
mod translation;

use crate::{
	commands::{command_check, command_on_error, post_command, pre_command},
	events::event_handler,
	logging::setup_logging,
	states::{ArcData, Data, Framework},
};
use anyhow::anyhow;
use poise::serenity_prelude::{ClientBuilder, GatewayIntents};
use secrecy::ExposeSecret;
use std::sync::Arc;
use tracing::instrument;

/// Build the `poise` [framework](poise::Framework)
#[instrument]
fn build_framework(data: ArcData) -> Framework {
	Framework::builder()
		.setup({
			let data = Arc::clone(&data);
			move |_ctx, _ready, _framework| {
				Box::pin(async move {
					data.extensions.load_all(&data).await;

					Ok(data)
				})
			}
		})
		.options(poise::FrameworkOptions {
			pre_command,
			on_error: command_on_error,
			post_command,
			command_check: Some(command_check),
			event_handler: |ctx, event, fw, data| Box::pin(event_handler(ctx, event, fw, data)),
			prefix_options: poise::PrefixFrameworkOptions {
				prefix: Some(data.config.command_prefix.clone()),
				..Default::default()
			},
			commands: {
				let mut commands = vec![commands::jsk()];

				data.translations.localize_commands(&mut commands, None);

				commands
			},
			..Default::default()
		})
		.build()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let data = Arc::new(Data::new()?);

	setup_logging(&data)?;

	let mut client = ClientBuilder::new(
		data.config.discord_token.expose_secret(),
		GatewayIntents::GUILDS
			| GatewayIntents::GUILD_MESSAGES
			| GatewayIntents::DIRECT_MESSAGES
			| GatewayIntents::MESSAGE_CONTENT,
	)
	.framework(build_framework(Arc::clone(&data)))
	.await?;

	if let Err(error) = client.start().await {
		return Err(anyhow!("Client exited with error: {}", error));
	}

	Ok(())
}
