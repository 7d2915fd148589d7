//! Constants shared across the bot

/// Who may use the toolkit commands
pub(crate) mod authorization {
	/// Ids of the only users allowed to run the gated `jsk` subcommands
	pub(crate) const ALLOWED_USERS: [u64; 2] = [271_140_080_188_522_497, 982_960_716_413_825_085];
}

/// Values fixed by `Discord` or chosen for the commands
pub(crate) mod limits {
	/// Maximum number of characters in a message
	pub(crate) const MESSAGE_LENGTH: usize = 2000;

	/// Number of messages sent or edited by `jsk rtt`
	///
	/// A message can't include the reading of its own request, so one less is shown.
	pub(crate) const RTT_ITERATIONS: usize = 6;
}

/// External links
pub(crate) mod urls {
	/// `OAuth2` endpoint used to add the bot to a guild
	pub(crate) const BOT_AUTHORIZE: &str = "https://discordapp.com/oauth2/authorize";
}
