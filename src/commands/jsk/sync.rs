//! Overwrite the application commands known by `Discord`
//!
//! Commands hidden from help are development commands, they only live in the
//! development guild. Every other command is registered globally.

use super::{is_authorized, send_pages, split_arguments};
use crate::{
	paginator::Paginator,
	states::{Command, Context, InteractionResult},
	translation::Translate,
};
use fluent::fluent_args;
use poise::{
	command,
	serenity_prelude::{self as serenity, CreateCommand, GuildId, Http},
};
use regex::Regex;
use std::{collections::BTreeSet, fmt::Display, num::ParseIntError, sync::LazyLock};

/// Matches `Discord` field errors pointing inside the sent commands
static SLASH_COMMAND_ERROR: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"^In (\d+\.[a-z_]+(?:\.\d+\.[a-z_]+)*)").expect("slash command error pattern is valid")
});

/// Where application commands are registered
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) enum SyncTarget {
	/// Available everywhere
	Global,
	/// Only available in this guild
	Guild(GuildId),
}

/// A target argument that could not be understood
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub(crate) enum TargetError {
	/// `.` was used outside of a guild
	#[error("can't sync guild commands without guild information")]
	MissingGuild,
	/// Not a guild id
	#[error("`{0}` is not a valid guild ID")]
	InvalidGuildId(String),
}

/// Turn `jsk sync` arguments into deduplicated targets, global first then by id
///
/// `$` is global, `*` every guild in `scoped_guilds` and `.` the current guild.
/// No argument at all means global.
fn parse_targets<'a>(
	arguments: impl IntoIterator<Item = &'a str>,
	current_guild: Option<GuildId>,
	scoped_guilds: &[GuildId],
) -> Result<BTreeSet<SyncTarget>, TargetError> {
	let mut targets = BTreeSet::new();
	let mut any = false;

	for argument in arguments {
		any = true;

		match argument {
			"$" => {
				targets.insert(SyncTarget::Global);
			}
			"*" => targets.extend(scoped_guilds.iter().copied().map(SyncTarget::Guild)),
			"." => {
				let guild_id = current_guild.ok_or(TargetError::MissingGuild)?;
				targets.insert(SyncTarget::Guild(guild_id));
			}
			id => {
				let guild_id = id
					.parse::<u64>()
					.ok()
					.filter(|id| *id != 0)
					.map(GuildId::new)
					.ok_or_else(|| TargetError::InvalidGuildId(id.to_owned()))?;
				targets.insert(SyncTarget::Guild(guild_id));
			}
		}
	}

	if !any {
		targets.insert(SyncTarget::Global);
	}

	Ok(targets)
}

/// The shape of a registered command, used to name the culprit of a failed sync
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CommandDescriptor {
	/// Name sent to `Discord`
	pub(crate) name: String,
	/// Parameter names in declaration order
	pub(crate) parameters: Vec<String>,
	/// Nested subcommands in declaration order
	pub(crate) subcommands: Vec<CommandDescriptor>,
	/// Rust function implementing the command
	pub(crate) source: Option<String>,
}

impl From<&Command> for CommandDescriptor {
	fn from(command: &Command) -> Self {
		Self {
			name: command.name.clone(),
			parameters: command
				.parameters
				.iter()
				.map(|parameter| parameter.name.clone())
				.collect(),
			subcommands: command.subcommands.iter().map(Self::from).collect(),
			source: Some(command.source_code_name.clone()),
		}
	}
}

/// The commands to send for a target, with their descriptors at the same index
#[derive(Debug, Default)]
pub(crate) struct ScopePayload {
	/// Builders sent to `Discord`
	pub(crate) commands: Vec<CreateCommand>,
	/// Shape of each sent command
	pub(crate) descriptors: Vec<CommandDescriptor>,
}

impl ScopePayload {
	/// Collect the application commands registered in the target
	pub(crate) fn collect(
		commands: &[Command],
		development_guild: GuildId,
		target: SyncTarget,
	) -> Self {
		let mut payload = Self::default();

		let in_scope = |command: &&Command| match target {
			SyncTarget::Global => !command.hide_in_help,
			SyncTarget::Guild(guild_id) => command.hide_in_help && guild_id == development_guild,
		};

		for command in commands.iter().filter(in_scope) {
			if let Some(slash_command) = command.create_as_slash_command() {
				payload.commands.push(slash_command);
				payload.descriptors.push(CommandDescriptor::from(command));
			}

			if let Some(context_menu_command) = command.create_as_context_menu_command() {
				payload.commands.push(context_menu_command);
				payload.descriptors.push(CommandDescriptor {
					name: command
						.context_menu_name
						.clone()
						.unwrap_or_else(|| command.name.clone()),
					parameters: Vec::new(),
					subcommands: Vec::new(),
					source: Some(command.source_code_name.clone()),
				});
			}
		}

		payload
	}
}

/// Guilds having their own application commands
fn scoped_guilds(commands: &[Command], development_guild: GuildId) -> Vec<GuildId> {
	let payload = ScopePayload::collect(
		commands,
		development_guild,
		SyncTarget::Guild(development_guild),
	);

	if payload.commands.is_empty() {
		Vec::new()
	} else {
		vec![development_guild]
	}
}

/// Replace every application command of the target
pub(crate) async fn overwrite_commands(
	http: &Http,
	target: SyncTarget,
	commands: Vec<CreateCommand>,
) -> Result<Vec<serenity::Command>, serenity::Error> {
	match target {
		SyncTarget::Global => serenity::Command::set_global_commands(http, commands).await,
		SyncTarget::Guild(guild_id) => guild_id.set_commands(http, commands).await,
	}
}

/// Render a rejected request: a status line then one line per `(path, message)` field error
fn response_lines<'a>(
	status: impl Display,
	code: impl Display,
	message: &str,
	fields: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> Vec<String> {
	let mut lines = vec![format!("{status} (error code: {code}): {message}")];
	lines.extend(
		fields
			.into_iter()
			.map(|(path, message)| format!("In {path}: {message}")),
	);

	lines
}

/// Render a sync error, one line per field error
fn error_lines(error: &serenity::Error) -> Vec<String> {
	match error {
		serenity::Error::Http(serenity::HttpError::UnsuccessfulRequest(response)) => {
			response_lines(
				response.status_code,
				response.error.code,
				&response.error.message,
				response
					.error
					.errors
					.iter()
					.map(|error| (error.path.as_str(), error.message.as_str())),
			)
		}
		error => error.to_string().lines().map(str::to_owned).collect(),
	}
}

/// Why a field error could not be traced back to a command
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub(crate) enum DiagnosisError {
	/// The path does not alternate indexes and properties
	#[error("uneven path `{0}`")]
	UnevenPath(String),
	/// An index is not a number
	#[error("invalid index: {0}")]
	InvalidIndex(#[from] ParseIntError),
	/// The path points past the known commands
	#[error("no command at index {0}")]
	NoSuchCommand(usize),
	/// The path points past the parameters of a command
	#[error("command `{command}` has no parameter at index {index}")]
	NoSuchParameter {
		/// The selected command
		command: String,
		/// The requested parameter index
		index: usize,
	},
	/// The path names a parameter before any command
	#[error("no command selected")]
	NoCommand,
}

/// What probably caused a field error
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Diagnosis {
	/// The path led to a command or a parameter
	LikelyCause {
		/// Command names followed by the parameter, if any
		name: String,
		/// Function implementing the command
		source: Option<String>,
	},
	/// The path could not be followed
	Unknown(DiagnosisError),
}

/// Follow an error path like `0.options.1.name` through the sent commands
///
/// Indexes select commands then subcommands, and once a command without
/// subcommands is selected the next index selects one of its parameters.
fn walk(path: &str, pool: &[CommandDescriptor]) -> Result<Diagnosis, DiagnosisError> {
	let parts = path.split('.').collect::<Vec<_>>();
	if parts.len() % 2 != 0 {
		return Err(DiagnosisError::UnevenPath(path.to_owned()));
	}

	let mut pool = Some(pool);
	let mut selected: Option<&CommandDescriptor> = None;
	let mut names = Vec::new();

	for pair in parts.chunks_exact(2) {
		let index = pair[0].parse::<usize>()?;

		if let Some(commands) = pool.filter(|commands| !commands.is_empty()) {
			let command = commands
				.get(index)
				.ok_or(DiagnosisError::NoSuchCommand(index))?;

			names.push(command.name.clone());
			pool = Some(command.subcommands.as_slice());
			selected = Some(command);
		} else {
			let command = selected.ok_or(DiagnosisError::NoCommand)?;
			let parameter =
				command
					.parameters
					.get(index)
					.ok_or_else(|| DiagnosisError::NoSuchParameter {
						command: command.name.clone(),
						index,
					})?;

			names.push(format!("(parameter: {parameter})"));
			pool = None;
		}
	}

	let command = selected.ok_or(DiagnosisError::NoCommand)?;

	Ok(Diagnosis::LikelyCause {
		name: names.join(" "),
		source: command.source.clone(),
	})
}

/// Diagnose an error line, `None` when it doesn't point inside the commands
fn diagnose(line: &str, pool: &[CommandDescriptor]) -> Option<Diagnosis> {
	let path = SLASH_COMMAND_ERROR.captures(line)?.get(1)?.as_str();

	Some(walk(path, pool).unwrap_or_else(Diagnosis::Unknown))
}

/// Render a failed sync with a diagnosis after each matching line
fn describe_failure(
	translator: &impl Translate,
	error: &serenity::Error,
	pool: &[CommandDescriptor],
) -> String {
	let mut lines = Vec::new();

	for line in error_lines(error) {
		let diagnosis = diagnose(&line, pool);
		lines.push(line);

		let Some(diagnosis) = diagnosis else {
			continue;
		};

		lines.push(match diagnosis {
			Diagnosis::LikelyCause {
				name,
				source: Some(source),
			} => translator.translate(
				"jsk_sync-likely-cause-at",
				Some(fluent_args!["name" => name, "source" => source]),
			),
			Diagnosis::LikelyCause { name, source: None } => translator.translate(
				"jsk_sync-likely-cause",
				Some(fluent_args!["name" => name]),
			),
			Diagnosis::Unknown(reason) => translator.translate(
				"jsk_sync-unknown-cause",
				Some(fluent_args!["reason" => reason.to_string()]),
			),
		});
	}

	lines.join("\n")
}

/// Sync global or guild application commands to Discord
///
/// Targets are `$` for global, `*` for every guild with its own commands,
/// `.` for the current guild or guild ids. Defaults to global.
#[command(prefix_command, slash_command, rename = "sync")]
#[tracing::instrument(skip(ctx), fields(caller_id = %ctx.author().id))]
pub(super) async fn jsk_sync(
	ctx: Context<'_>,
	#[description = "Where to sync commands"]
	#[rest]
	targets: Option<String>,
) -> InteractionResult {
	if !is_authorized(ctx.author().id) {
		return Ok(());
	}

	if ctx.serenity_context().http.application_id().is_none() {
		ctx.say(ctx.translate("jsk_sync-no-application", None))
			.await?;

		return Ok(());
	}

	let commands = &ctx.framework().options().commands;
	let development_guild = ctx.data().config.discord_development_guild;

	let targets = match parse_targets(
		split_arguments(targets.as_deref()),
		ctx.guild_id(),
		&scoped_guilds(commands, development_guild),
	) {
		Ok(targets) => targets,
		Err(TargetError::MissingGuild) => {
			ctx.say(ctx.translate("jsk_sync-no-guild", None)).await?;

			return Ok(());
		}
		Err(TargetError::InvalidGuildId(target)) => {
			ctx.say(ctx.translate(
				"jsk_sync-invalid-guild",
				Some(fluent_args!["target" => target]),
			))
			.await?;

			return Ok(());
		}
	};

	let mut paginator = Paginator::default();

	for target in targets {
		let ScopePayload {
			commands: payload,
			descriptors,
		} = ScopePayload::collect(commands, development_guild, target);

		let line = match (overwrite_commands(ctx.http(), target, payload).await, target) {
			(Ok(synced), SyncTarget::Global) => ctx.translate(
				"jsk_sync-global-synced",
				Some(fluent_args!["count" => synced.len()]),
			),
			(Ok(synced), SyncTarget::Guild(guild_id)) => ctx.translate(
				"jsk_sync-guild-synced",
				Some(fluent_args!["guild" => guild_id.to_string(), "count" => synced.len()]),
			),
			(Err(error), target) => {
				tracing::warn!(error = ?error, target = ?target, "failed to sync application commands");

				let error = describe_failure(&ctx, &error, &descriptors);

				match target {
					SyncTarget::Global => ctx.translate(
						"jsk_sync-global-failed",
						Some(fluent_args!["error" => error]),
					),
					SyncTarget::Guild(guild_id) => ctx.translate(
						"jsk_sync-guild-failed",
						Some(fluent_args!["guild" => guild_id.to_string(), "error" => error]),
					),
				}
			}
		};

		paginator.add_line(&line, true);
	}

	send_pages(ctx, paginator).await
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{commands::jsk, translation::Translations};
	use unic_langid::langid;

	/// Greet someone
	#[command(slash_command)]
	async fn hello(_: Context<'_>, #[description = "Who to greet"] name: String) -> InteractionResult {
		let _ = name;
		Ok(())
	}

	/// Show details about a user
	#[command(slash_command, context_menu_command = "Inspect user")]
	async fn inspect(
		_: Context<'_>,
		#[description = "User to inspect"] user: serenity::User,
	) -> InteractionResult {
		let _ = user;
		Ok(())
	}

	fn names(descriptors: &[CommandDescriptor]) -> Vec<&str> {
		descriptors.iter().map(|descriptor| descriptor.name.as_str()).collect()
	}

	fn guild(id: u64) -> GuildId {
		GuildId::new(id)
	}

	fn descriptor(name: &str, parameters: &[&str], subcommands: Vec<CommandDescriptor>) -> CommandDescriptor {
		CommandDescriptor {
			name: name.to_owned(),
			parameters: parameters.iter().map(|&p| p.to_owned()).collect(),
			subcommands,
			source: Some(format!("{name}_fn")),
		}
	}

	fn pool() -> Vec<CommandDescriptor> {
		vec![
			descriptor("ping", &[], Vec::new()),
			descriptor(
				"levels",
				&[],
				vec![
					descriptor("add", &["name", "role"], Vec::new()),
					descriptor("remove", &["name"], Vec::new()),
				],
			),
			descriptor("echo", &["text", "times"], Vec::new()),
		]
	}

	#[test]
	fn no_targets_means_global() {
		let targets = parse_targets([], None, &[]).unwrap();

		assert_eq!(targets.into_iter().collect::<Vec<_>>(), vec![SyncTarget::Global]);
	}

	#[test]
	fn targets_are_deduplicated_and_global_first() {
		let targets = parse_targets(
			["30", ".", "$", "10", "*", "30"],
			Some(guild(20)),
			&[guild(10), guild(5)],
		)
		.unwrap();

		assert_eq!(
			targets.into_iter().collect::<Vec<_>>(),
			vec![
				SyncTarget::Global,
				SyncTarget::Guild(guild(5)),
				SyncTarget::Guild(guild(10)),
				SyncTarget::Guild(guild(20)),
				SyncTarget::Guild(guild(30)),
			]
		);
	}

	#[test]
	fn invalid_targets_are_rejected() {
		assert_eq!(
			parse_targets(["."], None, &[]),
			Err(TargetError::MissingGuild)
		);
		assert_eq!(
			parse_targets(["$", "guild"], None, &[]),
			Err(TargetError::InvalidGuildId("guild".into()))
		);
		assert_eq!(
			parse_targets(["0"], None, &[]),
			Err(TargetError::InvalidGuildId("0".into()))
		);
	}

	#[test]
	fn hidden_commands_only_go_to_the_development_guild() {
		let commands = vec![hello(), jsk(), inspect()];

		let global = ScopePayload::collect(&commands, guild(1), SyncTarget::Global);
		assert_eq!(global.commands.len(), global.descriptors.len());
		assert_eq!(names(&global.descriptors), ["hello", "inspect", "Inspect user"]);
		assert_eq!(global.descriptors[0].parameters, ["name"]);
		assert_eq!(global.descriptors[2].source.as_deref(), Some("inspect"));

		let development = ScopePayload::collect(&commands, guild(1), SyncTarget::Guild(guild(1)));
		assert_eq!(development.commands.len(), 1);
		assert_eq!(names(&development.descriptors), ["jsk"]);

		let toolkit = &development.descriptors[0];
		assert_eq!(
			names(&toolkit.subcommands),
			["load", "unload", "shutdown", "invite", "rtt", "sync"]
		);
		assert_eq!(toolkit.subcommands[0].parameters, ["extensions"]);
		assert_eq!(toolkit.subcommands[0].source.as_deref(), Some("jsk_load"));

		let other = ScopePayload::collect(&commands, guild(1), SyncTarget::Guild(guild(2)));
		assert!(other.commands.is_empty());
		assert!(other.descriptors.is_empty());
	}

	#[test]
	fn wildcard_guilds_need_development_commands() {
		assert!(scoped_guilds(&[hello(), inspect()], guild(1)).is_empty());
		assert_eq!(scoped_guilds(&[hello(), jsk()], guild(1)), [guild(1)]);
	}

	#[test]
	fn rejected_requests_list_field_errors() {
		assert_eq!(
			response_lines(
				"400 Bad Request",
				50035,
				"Invalid Form Body",
				[
					("0.options.1.name", "Must be 32 or fewer in length."),
					("1.description", "This field is required"),
				],
			),
			[
				"400 Bad Request (error code: 50035): Invalid Form Body",
				"In 0.options.1.name: Must be 32 or fewer in length.",
				"In 1.description: This field is required",
			]
		);
	}

	#[test]
	fn unrelated_lines_are_not_diagnosed() {
		assert_eq!(diagnose("400 Bad Request (error code: 50035)", &pool()), None);
	}

	#[test]
	fn path_to_a_parameter() {
		assert_eq!(
			diagnose("In 2.options.1.name: Must be 32 or fewer in length.", &pool()),
			Some(Diagnosis::LikelyCause {
				name: "echo (parameter: times)".into(),
				source: Some("echo_fn".into()),
			})
		);
	}

	#[test]
	fn path_through_subcommands() {
		assert_eq!(
			diagnose("In 1.options.0.options.1.description: This field is required", &pool()),
			Some(Diagnosis::LikelyCause {
				name: "levels add (parameter: role)".into(),
				source: Some("add_fn".into()),
			})
		);
		assert_eq!(
			diagnose("In 1.options.1.name: Invalid string", &pool()),
			Some(Diagnosis::LikelyCause {
				name: "levels remove".into(),
				source: Some("remove_fn".into()),
			})
		);
	}

	#[test]
	fn localization_paths_stop_at_the_locale() {
		assert_eq!(
			diagnose("In 0.description_localizations.fr: Must be 100 or fewer in length.", &pool()),
			Some(Diagnosis::LikelyCause {
				name: "ping".into(),
				source: Some("ping_fn".into()),
			})
		);
		assert_eq!(
			diagnose("In 2.options.0.name_localizations.en-US: Invalid string", &pool()),
			Some(Diagnosis::LikelyCause {
				name: "echo (parameter: text)".into(),
				source: Some("echo_fn".into()),
			})
		);
	}

	#[test]
	fn broken_paths_are_explained() {
		assert_eq!(
			diagnose("In 7.name: Invalid string", &pool()),
			Some(Diagnosis::Unknown(DiagnosisError::NoSuchCommand(7)))
		);
		assert_eq!(
			diagnose("In 0.options.0.name: Invalid string", &pool()),
			Some(Diagnosis::Unknown(DiagnosisError::NoSuchParameter {
				command: "ping".into(),
				index: 0,
			}))
		);
		assert_eq!(
			diagnose("In 0.name: Invalid string", &[]),
			Some(Diagnosis::Unknown(DiagnosisError::NoCommand))
		);
	}

	#[test]
	fn failures_are_annotated_line_by_line() {
		let translations = Translations::from_folder("translations", langid!("en-US")).unwrap();
		let error = serenity::Error::Other("In 2.options.0.type: Invalid type");

		assert_eq!(
			describe_failure(&translations, &error, &pool()),
			"In 2.options.0.type: Invalid type\n\
			 🧲 This is likely caused by: `echo (parameter: text)` at `echo_fn`"
		);
	}
}
