//! Load, reload and unload extensions

use super::{error_report, is_authorized, send_pages, split_arguments, TOOLKIT_EXTENSION};
use crate::{
	extensions::ExtensionError,
	paginator::Paginator,
	states::{Context, InteractionResult},
	translation::Translate,
};
use fluent::fluent_args;
use poise::command;

/// Add an extension outcome to the output
fn report(paginator: &mut Paginator, line: &str, outcome: Result<(), ExtensionError>) {
	match outcome {
		Ok(()) => paginator.add_line(line, true),
		Err(error) => {
			tracing::warn!(error = ?error, "extension operation failed");

			paginator.add_line(&format!("{line}\n```\n{}\n```", error_report(&error)), true);
		}
	}
}

/// `jsk reload` without any argument reloads the toolkit
///
/// Arguments expanding to nothing, like `~` with nothing loaded, do not count.
fn reloads_toolkit(invoked_name: &str, arguments: Option<&str>) -> bool {
	invoked_name == "reload" && split_arguments(arguments).next().is_none()
}

/// Loads or reloads the given extensions
///
/// Reports any extensions that failed to load.
#[command(prefix_command, slash_command, rename = "load", aliases("reload"))]
#[tracing::instrument(skip(ctx), fields(caller_id = %ctx.author().id))]
pub(super) async fn jsk_load(
	ctx: Context<'_>,
	#[description = "Extensions to act on"]
	#[rest]
	extensions: Option<String>,
) -> InteractionResult {
	if !is_authorized(ctx.author().id) {
		return Ok(());
	}

	let data = ctx.data();
	let names = if reloads_toolkit(ctx.invoked_command_name(), extensions.as_deref()) {
		vec![TOOLKIT_EXTENSION.to_owned()]
	} else {
		data.extensions
			.resolve(split_arguments(extensions.as_deref()))
			.await
	};

	let mut paginator = Paginator::default();

	for name in names {
		let (key, outcome) = if data.extensions.is_loaded(&name).await {
			("jsk_load-reloaded", data.extensions.reload(&name, data).await)
		} else {
			("jsk_load-loaded", data.extensions.load(&name, data).await)
		};

		let line = ctx.translate(key, Some(fluent_args!["extension" => name.as_str()]));
		report(&mut paginator, &line, outcome);
	}

	send_pages(ctx, paginator).await
}

/// Unloads the given extensions
///
/// Reports any extensions that failed to unload.
#[command(prefix_command, slash_command, rename = "unload")]
#[tracing::instrument(skip(ctx), fields(caller_id = %ctx.author().id))]
pub(super) async fn jsk_unload(
	ctx: Context<'_>,
	#[description = "Extensions to act on"]
	#[rest]
	extensions: Option<String>,
) -> InteractionResult {
	if !is_authorized(ctx.author().id) {
		return Ok(());
	}

	let data = ctx.data();
	let names = data
		.extensions
		.resolve(split_arguments(extensions.as_deref()))
		.await;

	let mut paginator = Paginator::default();

	for name in names {
		let outcome = data.extensions.unload(&name, data).await;

		let line = ctx.translate(
			"jsk_unload-unloaded",
			Some(fluent_args!["extension" => name.as_str()]),
		);
		report(&mut paginator, &line, outcome);
	}

	send_pages(ctx, paginator).await
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn failures_are_reported_inline() {
		let mut paginator = Paginator::default();

		report(&mut paginator, "📥 `music`", Ok(()));
		report(
			&mut paginator,
			"📥 `ghost`",
			Err(ExtensionError::NotFound("ghost".into())),
		);
		report(&mut paginator, "📥 `games`", Ok(()));

		assert_eq!(
			paginator.into_pages(),
			vec!["📥 `music`\n\n📥 `ghost`\n```\nextension `ghost` could not be found\n```\n\n📥 `games`"]
		);
	}

	#[test]
	fn bare_reload_targets_the_toolkit() {
		assert!(reloads_toolkit("reload", None));
		assert!(reloads_toolkit("reload", Some("  ")));

		assert!(!reloads_toolkit("reload", Some("~")));
		assert!(!reloads_toolkit("reload", Some("games.*")));
		assert!(!reloads_toolkit("load", None));
	}
}
