//! Handles all the states of the bot and initial configuration

use crate::{extensions::ExtensionRegistry, translation::Translations};
use anyhow::{anyhow, Context as _};
use dotenvy::dotenv;
use poise::{
	async_trait,
	serenity_prelude::{self as serenity, GuildId},
	CreateReply, ReplyHandle,
};
use secrecy::SecretString;
use std::{
	env::{self, VarError},
	fmt,
	sync::Arc,
};
use unic_langid::LanguageIdentifier;

/// App global configuration
#[derive(Debug)]
pub(crate) struct Config {
	/// The token needed to access the `Discord` Api
	pub(crate) discord_token: SecretString,
	/// The guild on witch development commands are registered
	pub(crate) discord_development_guild: GuildId,
	/// The prefix used to invoke text commands
	pub(crate) command_prefix: String,

	/// The default locale to use
	pub(crate) default_locale: LanguageIdentifier,
	/// Whether or not to use production defaults
	///
	/// Currently only affects logging
	pub(crate) production: bool,
}

/// Resolve an environment variable or return an appropriate error
fn required_env_var(name: &str) -> anyhow::Result<String> {
	match env::var(name) {
		Ok(val) => Ok(val),
		Err(VarError::NotPresent) => Err(anyhow!("{} must be set in the environnement", name)),
		Err(VarError::NotUnicode(_)) => {
			Err(anyhow!("{} does not contains Unicode valid text", name))
		}
	}
}

impl Config {
	/// Parse the config from `.env` file
	fn from_dotenv() -> anyhow::Result<Self> {
		// A missing `.env` is fine as long as the variables are exported
		if let Err(error) = dotenv() {
			tracing::debug!(error = ?error, "no `.env` file loaded");
		}

		let discord_development_guild = required_env_var("DISCORD_DEV_GUILD")?
			.parse::<u64>()
			.ok()
			.filter(|id| *id != 0)
			.ok_or_else(|| anyhow!("DISCORD_DEV_GUILD environnement variable must be a non-zero `u64`"))?;

		let production = env::var("PRODUCTION")
			.unwrap_or_else(|_| "false".into())
			.parse::<bool>()
			.map_err(|_| anyhow!("PRODUCTION environnement variable must be a `bool`"))?;

		let default_locale = required_env_var("DEFAULT_LOCALE")?
			.parse::<LanguageIdentifier>()
			.map_err(|_| {
				anyhow!("DEFAULT_LOCALE environnement variable must be a `LanguageIdentifier`")
			})?;

		Ok(Self {
			discord_token: SecretString::from(required_env_var("DISCORD_TOKEN")?),
			discord_development_guild: GuildId::new(discord_development_guild),
			command_prefix: env::var("COMMAND_PREFIX").unwrap_or_else(|_| "!".into()),

			default_locale,
			production,
		})
	}
}

/// App global data
pub(crate) struct Data {
	/// An instance of the parsed initial config
	pub(crate) config: Config,
	/// The translations for the client
	pub(crate) translations: Translations,
	/// The extensions that can be loaded and unloaded at runtime
	pub(crate) extensions: ExtensionRegistry,
}

impl fmt::Debug for Data {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Data")
			.field("config", &&self.config)
			.field("translations", &&self.translations)
			.field("extensions", &&self.extensions)
			.finish()
	}
}

impl Data {
	/// Parse the bot data from the environment
	pub(crate) fn new() -> anyhow::Result<Self> {
		let config = Config::from_dotenv()?;

		let translations = Translations::from_folder("translations", config.default_locale.clone())
			.context("failed to load translations")?;

		Ok(Self {
			config,
			translations,
			extensions: ExtensionRegistry::with_builtins(),
		})
	}
}

#[cfg(test)]
impl Data {
	/// Bot data that doesn't need any environment
	pub(crate) fn for_tests() -> Self {
		let default_locale = unic_langid::langid!("en-US");

		Self {
			config: Config {
				discord_token: SecretString::from("token".to_owned()),
				discord_development_guild: GuildId::new(1),
				command_prefix: "!".into(),
				default_locale: default_locale.clone(),
				production: false,
			},
			translations: Translations::from_folder("translations", default_locale)
				.expect("translations folder to be valid"),
			extensions: ExtensionRegistry::default(),
		}
	}
}

/// Trait for sending ephemeral messages
#[async_trait]
pub(crate) trait ContextPolyfill: Send + Sync {
	/// Send an ephemeral message to the user
	async fn shout(
		&self,
		content: impl Into<String> + Send,
	) -> Result<ReplyHandle<'_>, serenity::Error>;
}

#[async_trait]
impl ContextPolyfill for Context<'_> {
	#[inline]
	async fn shout(
		&self,
		content: impl Into<String> + Send,
	) -> Result<ReplyHandle<'_>, serenity::Error> {
		self.send(CreateReply::default().content(content).ephemeral(true))
			.await
	}
}

/// Common wrapper for the [`Data`]
pub(crate) type ArcData = Arc<Data>;
/// Common interaction or event error type
pub(crate) type InteractionError = Error;
/// Common interaction or event return type
pub(crate) type InteractionResult = Result<(), InteractionError>;

/// A [`poise::Command`] type alias with our common types
pub(crate) type Command = poise::Command<ArcData, InteractionError>;
/// A [`poise::Context`] type alias with our common types, provided to each command
pub(crate) type Context<'a> = poise::Context<'a, ArcData, InteractionError>;

/// A [`poise::Framework`] type alias with our common types
pub(crate) type Framework = poise::Framework<ArcData, InteractionError>;
/// A [`poise::FrameworkContext`] type alias with our common types
pub(crate) type FrameworkContext<'a> = poise::FrameworkContext<'a, ArcData, InteractionError>;
/// A [`poise::FrameworkError`] type alias with our common types
pub(crate) type FrameworkError<'a> = poise::FrameworkError<'a, ArcData, InteractionError>;

/// An error in an interaction or an event
#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
	/// A serenity error
	#[error(transparent)]
	Serenity(#[from] serenity::Error),
	/// Collects any other general purpose error
	#[error(transparent)]
	Other(#[from] anyhow::Error),
}
