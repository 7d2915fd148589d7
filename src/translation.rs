//! Localized strings for command replies and slash command metadata
//!
//! Every `.ftl` file of the translations folder is one locale. Replies go
//! through [`Translate`], either from a command [`Context`] (invoker locale) or
//! from [`Translations`] itself (fallback locale).

use crate::states::{Command, Context};
use anyhow::anyhow;
use fluent::{bundle, FluentArgs, FluentMessage, FluentResource};
use fluent_syntax::ast::Pattern;
use intl_memoizer::concurrent::IntlLangMemoizer as ConcurrentIntlLangMemoizer;
use std::{
	borrow::Cow,
	collections::HashMap,
	fmt::{Debug, Formatter},
	fs::{read_dir, read_to_string},
	path::Path,
};
use unic_langid::LanguageIdentifier;

/// A bundle shareable between the tasks running commands
type FluentBundle = bundle::FluentBundle<FluentResource, ConcurrentIntlLangMemoizer>;

/// Every loaded locale and the one used when a locale is missing
pub(crate) struct Translations {
	/// Locale used by prefix commands and unknown locales
	fallback: LanguageIdentifier,
	/// One bundle per `.ftl` file
	bundles: HashMap<LanguageIdentifier, FluentBundle>,
}

impl Debug for Translations {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Translations")
			.field("fallback", &self.fallback)
			.field("bundles", &self.bundles.keys())
			.finish()
	}
}

/// Parse a `<locale>.ftl` file into its bundle
fn read_fluent_file(path: &Path) -> anyhow::Result<(LanguageIdentifier, FluentBundle)> {
	let locale: LanguageIdentifier = path
		.file_stem()
		.ok_or_else(|| anyhow!("Invalid `.ftl` file"))?
		.to_str()
		.ok_or_else(|| anyhow!("Invalid UTF-8 filename"))?
		.parse()?;

	let file_contents = read_to_string(path)?;
	let resource = FluentResource::try_new(file_contents)
		.map_err(|(_, e)| anyhow!("failed to parse {:?}: {:?}", path, e))?;

	let mut bundle = FluentBundle::new_concurrent(vec![locale.clone()]);
	// Isolation marks end up inside code spans on `Discord`
	bundle.set_use_isolating(false);
	bundle
		.add_resource(resource)
		.map_err(|e| anyhow!("failed to add resource to bundle: {:?}", e))?;

	Ok((locale, bundle))
}

impl Translations {
	/// Load every `.ftl` file of `folder`, failing when `fallback` has none
	pub(crate) fn from_folder(folder: &str, fallback: LanguageIdentifier) -> anyhow::Result<Self> {
		let mut bundles = HashMap::new();

		for entry in read_dir(folder)? {
			let path = entry?.path();

			if matches!(path.extension(), Some(ext) if ext == "ftl") {
				let (locale, bundle) = read_fluent_file(&path)?;
				bundles.insert(locale, bundle);
			}
		}

		if !bundles.contains_key(&fallback) {
			return Err(anyhow!("fallback locale bundle not found"));
		}

		Ok(Self { fallback, bundles })
	}

	/// Format a pattern, logging fluent errors instead of failing
	fn format<'bundle>(
		bundle: &'bundle FluentBundle,
		pattern: &'bundle Pattern<&str>,
		args: Option<&'bundle FluentArgs>,
	) -> Cow<'bundle, str> {
		let mut errors = Vec::new();

		let formatted = bundle.format_pattern(pattern, args, &mut errors);

		for error in errors {
			tracing::error!("fluent format pattern error {}", error);
		}

		formatted
	}

	/// Resolve `key` in `locale`, or in the fallback locale when `locale` is not loaded
	pub(crate) fn translate_in<'bundle>(
		&'bundle self,
		locale: &LanguageIdentifier,
		key: &'bundle str,
		args: Option<&'bundle FluentArgs>,
	) -> anyhow::Result<Cow<'bundle, str>> {
		let bundle = self
			.bundles
			.get(locale)
			.or_else(|| self.bundles.get(&self.fallback))
			.ok_or_else(|| anyhow!("fallback locale bundle is missing"))?;

		bundle.get_message(key).map_or_else(
			|| Err(anyhow!("unknown fluent key `{}`", key)),
			|message| {
				message.value().map_or_else(
					|| Err(anyhow!("message `{}` has no value", key)),
					|pattern| Ok(Self::format(bundle, pattern, args)),
				)
			},
		)
	}

	/// Localize names, descriptions and parameters of slash commands and their subcommands
	///
	/// Keys are the command path joined with `_`, like `jsk_sync`.
	pub(crate) fn localize_commands(
		&self,
		commands: &mut [Command],
		parent_name: Option<&String>,
	) {
		for command in &mut *commands {
			// Skip prefix only commands
			if command.slash_action.is_none() && command.subcommands.is_empty() {
				continue;
			}

			self.localize_command(command, parent_name.cloned());
		}
	}

	/// Localize one command then recurse into its subcommands
	fn localize_command(&self, command: &mut Command, parent_name: Option<String>) {
		let full_command_name = match parent_name {
			Some(parent_name) => format!("{}_{}", parent_name, command.name),
			None => command.name.clone(),
		};

		for (locale, bundle) in &self.bundles {
			let Some(command_translation) = bundle.get_message(&full_command_name) else {
				tracing::error!(
					"translation for command `{}` with locale `{}` does not exist",
					full_command_name,
					locale
				);

				continue;
			};

			match command_translation.value() {
				Some(name) => {
					command
						.name_localizations
						.insert(locale.to_string(), Self::format(bundle, name, None).into());
				}
				None => {
					tracing::error!(
						"translation for command `{}` with locale `{}` does not have a name",
						full_command_name,
						locale
					);
				}
			}

			Self::localize_attributes(
				locale,
				bundle,
				&command_translation,
				command,
				&full_command_name,
			);
		}

		self.localize_commands(&mut command.subcommands, Some(&full_command_name));
	}

	/// Fill description and parameter localizations from the message attributes
	fn localize_attributes(
		locale: &LanguageIdentifier,
		bundle: &FluentBundle,
		command_translation: &FluentMessage,
		command: &mut Command,
		full_command_name: &String,
	) {
		let apply_attribute =
			|attribute: &str, hash_map: &mut HashMap<String, String>, description: &str| {
				command_translation.get_attribute(attribute).map_or_else(
					|| {
						tracing::error!(
							"translation for command `{}` with locale `{}` does not have a {}",
							full_command_name,
							locale,
							description
						);
					},
					|description| {
						hash_map.insert(
							locale.to_string(),
							Self::format(bundle, description.value(), None).into(),
						);
					},
				);
			};

		apply_attribute(
			"description",
			&mut command.description_localizations,
			"description",
		);

		for parameter in &mut command.parameters {
			apply_attribute(
				&parameter.name,
				&mut parameter.name_localizations,
				format!("name for the parameter `{}`", parameter.name).as_str(),
			);

			apply_attribute(
				&format!("{}-description", parameter.name),
				&mut parameter.description_localizations,
				&format!("description for the parameter `{}`", parameter.name),
			);
		}
	}
}

/// Something able to pick a locale for replies
pub(crate) trait Translate {
	/// Resolve `key` in the locale chosen by the implementor
	fn translate_checked<'bundle>(
		&'bundle self,
		key: &'bundle str,
		args: Option<&'bundle FluentArgs>,
	) -> anyhow::Result<Cow<'bundle, str>>;

	/// Resolve `key`, logging failures and answering with the key itself
	fn translate<'b>(&'b self, key: &'b str, args: Option<FluentArgs<'b>>) -> String {
		match self.translate_checked(key, args.as_ref()) {
			Ok(string) => string.into_owned(),
			Err(error) => {
				tracing::error!(key = key, args = ?args, error = ?error, "translation error");
				key.to_owned()
			}
		}
	}
}

impl Translate for Translations {
	fn translate_checked<'bundle>(
		&'bundle self,
		key: &'bundle str,
		args: Option<&'bundle FluentArgs>,
	) -> anyhow::Result<Cow<'bundle, str>> {
		self.translate_in(&self.fallback, key, args)
	}
}

impl Translate for Context<'_> {
	fn translate_checked<'bundle>(
		&'bundle self,
		key: &'bundle str,
		args: Option<&'bundle FluentArgs>,
	) -> anyhow::Result<Cow<'bundle, str>> {
		let translations = &self.data().translations;

		let locale: LanguageIdentifier = match self.locale() {
			Some(locale) => locale.parse()?,
			None => translations.fallback.clone(),
		};

		translations.translate_in(&locale, key, args)
	}
}
