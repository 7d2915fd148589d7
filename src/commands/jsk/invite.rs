//! Build the link used to add the bot to a guild

use super::split_arguments;
use crate::{
	constants::urls,
	states::{Context, InteractionResult},
	translation::Translate,
};
use anyhow::Context as _;
use fluent::fluent_args;
use poise::{
	command,
	serenity_prelude::{ApplicationId, Permissions},
};
use url::Url;

/// Combine permission names into a single set
///
/// Names are case insensitive and accept dashes or spaces as separators.
/// Without any name the administrator permission is requested.
fn parse_permissions<'a>(
	names: impl IntoIterator<Item = &'a str>,
) -> Result<Permissions, &'a str> {
	let mut permissions = None;

	for name in names {
		let flag_name = name.to_ascii_uppercase().replace(['-', ' '], "_");
		let flag = Permissions::from_name(&flag_name).ok_or(name)?;

		*permissions.get_or_insert_with(Permissions::empty) |= flag;
	}

	Ok(permissions.unwrap_or(Permissions::ADMINISTRATOR))
}

/// The `OAuth2` url adding the application as a bot with the given permissions
fn invite_url(client_id: ApplicationId, permissions: Permissions) -> Result<Url, url::ParseError> {
	Url::parse_with_params(
		urls::BOT_AUTHORIZE,
		&[
			("client_id", client_id.get().to_string()),
			("permissions", permissions.bits().to_string()),
			("scope", "bot".to_owned()),
		],
	)
}

/// Retrieve the invite URL for this bot
///
/// If the names of permissions are provided, they are requested as part of the invite.
#[command(prefix_command, slash_command, rename = "invite")]
#[tracing::instrument(skip(ctx), fields(caller_id = %ctx.author().id))]
pub(super) async fn jsk_invite(
	ctx: Context<'_>,
	#[description = "Permissions to request"]
	#[rest]
	permissions: Option<String>,
) -> InteractionResult {
	let permissions = match parse_permissions(split_arguments(permissions.as_deref())) {
		Ok(permissions) => permissions,
		Err(unknown) => {
			ctx.say(ctx.translate(
				"jsk_invite-unknown-permission",
				Some(fluent_args!["permission" => unknown]),
			))
			.await?;

			return Ok(());
		}
	};

	let application_info = ctx.http().get_current_application_info().await?;
	let url = invite_url(application_info.id, permissions).context("invalid invite url")?;

	ctx.say(ctx.translate(
		"jsk_invite-link",
		Some(fluent_args!["url" => url.to_string()]),
	))
	.await?;

	Ok(())
}
