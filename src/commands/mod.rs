//! `Discord` client commands

use crate::{
	states::{Context, ContextPolyfill, FrameworkError, InteractionError},
	translation::Translate,
};
use anyhow::Context as _;
use fluent::fluent_args;
use poise::{serenity_prelude, BoxFuture};
use uuid::Uuid;

pub(crate) mod jsk;

pub(crate) use jsk::jsk;

/// Execute before each command
pub(crate) fn pre_command(ctx: Context) -> BoxFuture<()> {
	Box::pin(async move {
		tracing::info!(
			user_id = ctx.author().id.get(),
			username = &ctx.author().name,
			command_id = ctx.command().identifying_name,
			"Command invocation",
		);
	})
}

/// Only let commands run while the extension they belong to is loaded
///
/// Commands without a `category` naming a registered extension are always allowed.
pub(crate) fn command_check(ctx: Context) -> BoxFuture<Result<bool, InteractionError>> {
	Box::pin(async move {
		let root = ctx
			.parent_commands()
			.first()
			.copied()
			.unwrap_or_else(|| ctx.command());

		let Some(extension) = root.category.as_deref() else {
			return Ok(true);
		};

		let extensions = &ctx.data().extensions;
		if !extensions.is_registered(extension) {
			return Ok(true);
		}

		Ok(extensions.is_loaded(extension).await)
	})
}

/// Execute on a error during code execution
pub(crate) fn command_on_error(error: FrameworkError) -> BoxFuture<()> {
	Box::pin(async move {
		let error = match error {
			FrameworkError::Command { error, ctx, .. } => handle_interaction_error(ctx, error)
				.await
				.context("failed to send error message"),

			FrameworkError::EventHandler { error, event, .. } => {
				tracing::error!(
					error = ?error,
					event = ?event,
					"event handler",
				);

				Ok(())
			}

			FrameworkError::CommandCheckFailed { ctx, error, .. } => match error {
				Some(err) => handle_interaction_error(ctx, err)
					.await
					.context("failed to send error message"),

				// Gated commands stay silent for everyone else
				None if jsk::is_authorized(ctx.author().id) => ctx
					.shout(ctx.translate("error-command-disabled", None))
					.await
					.map(|_| ())
					.context("Failed to send command disabled message"),

				None => Ok(()),
			},

			FrameworkError::ArgumentParse { ctx, input, error, .. } => {
				tracing::debug!(error = ?error, input = ?input, "argument parse");

				if jsk::is_authorized(ctx.author().id) {
					ctx.shout(ctx.translate(
						"error-invalid-argument",
						Some(fluent_args!["input" => input.unwrap_or_default()]),
					))
					.await
					.map(|_| ())
					.context("Failed to send invalid argument message")
				} else {
					Ok(())
				}
			}

			error => {
				tracing::error!(error = ?error, "framework");

				Ok(())
			}
		};

		if let Err(error) = error {
			tracing::error!(error = ?error);
		}
	})
}

/// Execute after every successful command
pub(crate) fn post_command(ctx: Context) -> BoxFuture<()> {
	Box::pin(async move {
		tracing::debug!(
			user_id = ctx.author().id.get(),
			username = &ctx.author().name,
			command_id = ctx.command().identifying_name,
			"Command invocation successful",
		);
	})
}

/// Handle our custom command interaction error
async fn handle_interaction_error(
	ctx: Context<'_>,
	error: InteractionError,
) -> serenity_prelude::Result<()> {
	let error_identifier = Uuid::new_v4().hyphenated().to_string();

	tracing::error!(
		user_id = ctx.author().id.get(),
		username = ctx.author().name,
		error_id = error_identifier,
		error = ?error,
		command_id = ctx.command().identifying_name,
		"interaction body or check",
	);

	ctx.shout(ctx.translate(
		"error-internal-with-id",
		Some(fluent_args!["id" => error_identifier]),
	))
	.await?;

	Ok(())
}
