//! Measure the round-trip time to the `Discord` API

use super::is_authorized;
use crate::{
	constants::limits,
	states::{Context, InteractionResult},
	translation::Translate,
};
use fluent::fluent_args;
use poise::{command, CreateReply};
use std::time::Duration;
use tokio::time::Instant;

/// Mean and sample standard deviation, `None` without any value
fn mean_stddev(values: &[f64]) -> Option<(f64, f64)> {
	if values.is_empty() {
		return None;
	}

	#[allow(clippy::cast_precision_loss)]
	let count = values.len() as f64;
	let mean = values.iter().sum::<f64>() / count;

	let stddev = if values.len() > 1 {
		let squares = values.iter().map(|value| (value - mean).powi(2)).sum::<f64>();
		(squares / (count - 1.0)).sqrt()
	} else {
		0.0
	};

	Some((mean, stddev))
}

/// Format a duration as milliseconds
fn millis(duration: Duration) -> String {
	format!("{:.2}", duration.as_secs_f64() * 1000.0)
}

/// Latencies collected over one `jsk rtt` invocation
#[derive(Debug, Default)]
struct Readings {
	/// Time taken by each message send or edit
	api: Vec<Duration>,
	/// Positive shard heartbeat latencies
	websocket: Vec<Duration>,
}

impl Readings {
	/// Record a request duration and the shard latency seen after it
	fn record(&mut self, api: Duration, websocket: Duration) {
		self.api.push(api);

		// Zero means no heartbeat was acknowledged yet
		if !websocket.is_zero() {
			self.websocket.push(websocket);
		}
	}

	/// Average of the websocket readings or the current latency when there are none
	fn websocket_latency(&self, current: Duration) -> Duration {
		match u32::try_from(self.websocket.len()) {
			Ok(count) if count > 0 => self.websocket.iter().sum::<Duration>() / count,
			_ => current,
		}
	}

	/// The message content for the current state
	fn render(&self, translator: &impl Translate, current_websocket: Duration) -> String {
		let mut text = translator.translate("jsk_rtt-calculating", None);
		text.push_str("\n\n");

		for (index, reading) in self.api.iter().enumerate() {
			text.push_str(&translator.translate(
				"jsk_rtt-reading",
				Some(fluent_args!["index" => index + 1, "latency" => millis(*reading)]),
			));
			text.push('\n');
		}

		let millis_readings = self
			.api
			.iter()
			.map(|reading| reading.as_secs_f64() * 1000.0)
			.collect::<Vec<_>>();

		match mean_stddev(&millis_readings) {
			Some((average, deviation)) => {
				text.push('\n');
				text.push_str(&translator.translate(
					"jsk_rtt-average",
					Some(fluent_args![
						"average" => format!("{average:.2}"),
						"deviation" => format!("{deviation:.2}")
					]),
				));
			}
			None => text.push_str(&translator.translate("jsk_rtt-no-readings", None)),
		}

		text.push('\n');
		text.push_str(&translator.translate(
			"jsk_rtt-websocket",
			Some(fluent_args!["latency" => millis(self.websocket_latency(current_websocket))]),
		));

		text
	}
}

/// Calculates round-trip time to the API
#[command(prefix_command, slash_command, rename = "rtt", aliases("ping"))]
#[tracing::instrument(skip(ctx), fields(caller_id = %ctx.author().id))]
pub(super) async fn jsk_rtt(ctx: Context<'_>) -> InteractionResult {
	if !is_authorized(ctx.author().id) {
		return Ok(());
	}

	let mut readings = Readings::default();

	let before = Instant::now();
	let message = ctx.say(readings.render(&ctx, ctx.ping().await)).await?;
	readings.record(before.elapsed(), ctx.ping().await);

	for _ in 1..limits::RTT_ITERATIONS {
		let text = readings.render(&ctx, ctx.ping().await);

		let before = Instant::now();
		message.edit(ctx, CreateReply::default().content(text)).await?;
		readings.record(before.elapsed(), ctx.ping().await);
	}

	tracing::debug!(readings = ?readings, "round-trip time measured");

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::translation::Translations;
	use unic_langid::langid;

	fn translations() -> Translations {
		Translations::from_folder("translations", langid!("en-US")).unwrap()
	}

	#[test]
	fn mean_and_sample_deviation() {
		assert_eq!(mean_stddev(&[]), None);
		assert_eq!(mean_stddev(&[4.0]), Some((4.0, 0.0)));

		let (mean, stddev) = mean_stddev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
		assert!((mean - 5.0).abs() < f64::EPSILON);
		assert!((stddev - 2.138_089_935).abs() < 1e-9);
	}

	#[test]
	fn zero_websocket_latencies_are_ignored() {
		let mut readings = Readings::default();
		readings.record(Duration::from_millis(10), Duration::ZERO);

		assert_eq!(
			readings.websocket_latency(Duration::from_millis(42)),
			Duration::from_millis(42)
		);

		readings.record(Duration::from_millis(10), Duration::from_millis(30));
		readings.record(Duration::from_millis(10), Duration::from_millis(50));

		assert_eq!(
			readings.websocket_latency(Duration::from_millis(42)),
			Duration::from_millis(40)
		);
	}

	#[test]
	fn first_message_has_no_readings() {
		let text = Readings::default().render(&translations(), Duration::from_millis(41));

		assert_eq!(
			text,
			"Calculating round-trip time...\n\nNo readings yet.\nWebsocket latency: 41.00ms"
		);
	}

	#[test]
	fn readings_are_listed_with_their_average() {
		let mut readings = Readings::default();
		readings.record(Duration::from_millis(100), Duration::from_millis(20));
		readings.record(Duration::from_millis(200), Duration::from_millis(40));

		let text = readings.render(&translations(), Duration::ZERO);

		assert_eq!(
			text,
			"Calculating round-trip time...\n\n\
			 Reading 1: 100.00ms\n\
			 Reading 2: 200.00ms\n\n\
			 Average: 150.00 ± 70.71ms\n\
			 Websocket latency: 30.00ms"
		);
	}
}
