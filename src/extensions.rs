//! Units of bot functionality that can be loaded, reloaded and unloaded at runtime

use crate::states::Data;
use poise::async_trait;
use std::{
	collections::{BTreeMap, BTreeSet},
	error::Error as StdError,
	fmt,
	sync::Arc,
};
use tokio::sync::{Mutex, RwLock};

/// Boxed error raised by an extension hook
type HookError = Box<dyn StdError + Send + Sync + 'static>;

/// A named set of commands with hooks ran when it changes state
///
/// Commands belong to the extension named by their root command `category`.
#[async_trait]
pub(crate) trait Extension: Send + Sync {
	/// The unique name used to refer to this extension
	fn name(&self) -> &'static str;

	/// Called before the extension is marked as loaded
	async fn setup(&self, _data: &Data) -> anyhow::Result<()> {
		Ok(())
	}

	/// Called before the extension is marked as unloaded
	async fn teardown(&self, _data: &Data) -> anyhow::Result<()> {
		Ok(())
	}
}

/// An error while changing the state of an extension
#[derive(Debug, thiserror::Error)]
pub(crate) enum ExtensionError {
	/// No extension is registered under that name
	#[error("extension `{0}` could not be found")]
	NotFound(String),
	/// Tried to load an extension twice
	#[error("extension `{0}` is already loaded")]
	AlreadyLoaded(String),
	/// Tried to reload or unload an extension that is not loaded
	#[error("extension `{0}` has not been loaded")]
	NotLoaded(String),
	/// A setup or teardown hook failed
	#[error("extension `{name}` raised an error during {stage}")]
	Failed {
		/// The extension that failed
		name: String,
		/// Which hook failed
		stage: &'static str,
		/// The hook error
		#[source]
		source: HookError,
	},
}

impl ExtensionError {
	/// Wrap a hook error
	fn failed(name: &str, stage: &'static str, error: anyhow::Error) -> Self {
		Self::Failed {
			name: name.to_owned(),
			stage,
			source: error.into(),
		}
	}
}

/// Keeps track of the available extensions and of the loaded ones
pub(crate) struct ExtensionRegistry {
	/// Every registered extension by name
	available: BTreeMap<&'static str, Arc<dyn Extension>>,
	/// Names of the loaded extensions
	loaded: RwLock<BTreeSet<String>>,
	/// Serializes state changes so hooks never run concurrently
	operations: Mutex<()>,
}

impl fmt::Debug for ExtensionRegistry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ExtensionRegistry")
			.field("available", &self.available.keys())
			.finish_non_exhaustive()
	}
}

impl Default for ExtensionRegistry {
	fn default() -> Self {
		Self {
			available: BTreeMap::new(),
			loaded: RwLock::new(BTreeSet::new()),
			operations: Mutex::new(()),
		}
	}
}

impl ExtensionRegistry {
	/// A registry containing the extensions shipped with the bot
	pub(crate) fn with_builtins() -> Self {
		let mut registry = Self::default();
		registry.register(Arc::new(crate::commands::jsk::Toolkit));
		registry
	}

	/// Make an extension available, it still needs to be loaded
	pub(crate) fn register(&mut self, extension: Arc<dyn Extension>) {
		if self
			.available
			.insert(extension.name(), extension)
			.is_some()
		{
			tracing::warn!("an extension was registered twice, keeping the last one");
		}
	}

	/// Whether an extension with that name is registered
	pub(crate) fn is_registered(&self, name: &str) -> bool {
		self.available.contains_key(name)
	}

	/// Whether the extension is currently loaded
	pub(crate) async fn is_loaded(&self, name: &str) -> bool {
		self.loaded.read().await.contains(name)
	}

	/// Names of all the loaded extensions, sorted
	pub(crate) async fn loaded(&self) -> Vec<String> {
		self.loaded.read().await.iter().cloned().collect()
	}

	/// Names of all the registered extensions, sorted
	pub(crate) fn available(&self) -> impl Iterator<Item = &'static str> + '_ {
		self.available.keys().copied()
	}

	/// Get a registered extension
	fn get(&self, name: &str) -> Result<&Arc<dyn Extension>, ExtensionError> {
		self.available
			.get(name)
			.ok_or_else(|| ExtensionError::NotFound(name.to_owned()))
	}

	/// Runs the extension setup hook and marks it as loaded
	#[tracing::instrument(skip(self, data))]
	pub(crate) async fn load(&self, name: &str, data: &Data) -> Result<(), ExtensionError> {
		let extension = self.get(name)?;
		let _guard = self.operations.lock().await;

		if self.is_loaded(name).await {
			return Err(ExtensionError::AlreadyLoaded(name.to_owned()));
		}

		extension
			.setup(data)
			.await
			.map_err(|error| ExtensionError::failed(name, "setup", error))?;

		self.loaded.write().await.insert(name.to_owned());
		tracing::info!("extension `{}` loaded", name);

		Ok(())
	}

	/// Runs the teardown then the setup hook of a loaded extension
	///
	/// A failing setup leaves the extension unloaded.
	#[tracing::instrument(skip(self, data))]
	pub(crate) async fn reload(&self, name: &str, data: &Data) -> Result<(), ExtensionError> {
		let extension = self.get(name)?;
		let _guard = self.operations.lock().await;

		if !self.is_loaded(name).await {
			return Err(ExtensionError::NotLoaded(name.to_owned()));
		}

		extension
			.teardown(data)
			.await
			.map_err(|error| ExtensionError::failed(name, "teardown", error))?;

		if let Err(error) = extension.setup(data).await {
			self.loaded.write().await.remove(name);
			return Err(ExtensionError::failed(name, "setup", error));
		}

		tracing::info!("extension `{}` reloaded", name);

		Ok(())
	}

	/// Runs the extension teardown hook and marks it as unloaded
	#[tracing::instrument(skip(self, data))]
	pub(crate) async fn unload(&self, name: &str, data: &Data) -> Result<(), ExtensionError> {
		let extension = self.get(name)?;
		let _guard = self.operations.lock().await;

		if !self.is_loaded(name).await {
			return Err(ExtensionError::NotLoaded(name.to_owned()));
		}

		extension
			.teardown(data)
			.await
			.map_err(|error| ExtensionError::failed(name, "teardown", error))?;

		self.loaded.write().await.remove(name);
		tracing::info!("extension `{}` unloaded", name);

		Ok(())
	}

	/// Load every registered extension, failures are only logged
	pub(crate) async fn load_all(&self, data: &Data) {
		for name in self.available() {
			if let Err(error) = self.load(name, data).await {
				tracing::error!(error = ?error, "could not load extension `{}`", name);
			}
		}
	}

	/// Expand command arguments into extension names
	///
	/// `~` stands for every loaded extension and `prefix.*` for every registered
	/// extension under `prefix`. Other arguments are kept as is.
	pub(crate) async fn resolve<'a>(
		&self,
		arguments: impl IntoIterator<Item = &'a str> + Send,
	) -> Vec<String> {
		let mut names = Vec::new();

		for argument in arguments {
			if argument == "~" {
				names.extend(self.loaded().await);
			} else if let Some(prefix) = argument.strip_suffix('*').filter(|p| p.ends_with('.')) {
				names.extend(
					self.available()
						.filter(|name| name.starts_with(prefix))
						.map(str::to_owned),
				);
			} else {
				names.push(argument.to_owned());
			}
		}

		names
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicUsize, Ordering};

	#[derive(Default)]
	struct Recorder {
		name: &'static str,
		setups: AtomicUsize,
		teardowns: AtomicUsize,
		failing_setup: bool,
		failing_teardown: bool,
	}

	#[async_trait]
	impl Extension for Recorder {
		fn name(&self) -> &'static str {
			self.name
		}

		async fn setup(&self, _data: &Data) -> anyhow::Result<()> {
			self.setups.fetch_add(1, Ordering::SeqCst);

			if self.failing_setup {
				Err(anyhow::anyhow!("database unreachable")).map_err(|e| e.context("setup hook"))
			} else {
				Ok(())
			}
		}

		async fn teardown(&self, _data: &Data) -> anyhow::Result<()> {
			self.teardowns.fetch_add(1, Ordering::SeqCst);

			if self.failing_teardown {
				Err(anyhow::anyhow!("connections still open"))
			} else {
				Ok(())
			}
		}
	}

	fn recorder(name: &'static str) -> Arc<Recorder> {
		Arc::new(Recorder {
			name,
			..Recorder::default()
		})
	}

	fn registry(extensions: &[Arc<Recorder>]) -> ExtensionRegistry {
		let mut registry = ExtensionRegistry::default();
		for extension in extensions {
			registry.register(Arc::clone(extension) as Arc<dyn Extension>);
		}
		registry
	}

	#[tokio::test]
	async fn load_then_unload() {
		let data = Data::for_tests();
		let music = recorder("music");
		let registry = registry(&[Arc::clone(&music)]);

		registry.load("music", &data).await.unwrap();
		assert!(registry.is_loaded("music").await);
		assert!(matches!(
			registry.load("music", &data).await,
			Err(ExtensionError::AlreadyLoaded(_))
		));

		registry.unload("music", &data).await.unwrap();
		assert!(!registry.is_loaded("music").await);
		assert!(matches!(
			registry.unload("music", &data).await,
			Err(ExtensionError::NotLoaded(_))
		));

		assert_eq!(music.setups.load(Ordering::SeqCst), 1);
		assert_eq!(music.teardowns.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn unknown_extensions_are_not_found() {
		let data = Data::for_tests();
		let registry = registry(&[]);

		assert!(matches!(
			registry.load("ghost", &data).await,
			Err(ExtensionError::NotFound(name)) if name == "ghost"
		));
		assert!(matches!(
			registry.reload("ghost", &data).await,
			Err(ExtensionError::NotFound(_))
		));
	}

	#[tokio::test]
	async fn reload_runs_both_hooks() {
		let data = Data::for_tests();
		let music = recorder("music");
		let registry = registry(&[Arc::clone(&music)]);

		assert!(matches!(
			registry.reload("music", &data).await,
			Err(ExtensionError::NotLoaded(_))
		));

		registry.load("music", &data).await.unwrap();
		registry.reload("music", &data).await.unwrap();

		assert!(registry.is_loaded("music").await);
		assert_eq!(music.setups.load(Ordering::SeqCst), 2);
		assert_eq!(music.teardowns.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn failing_setup_keeps_extension_unloaded() {
		let data = Data::for_tests();
		let broken = Arc::new(Recorder {
			name: "broken",
			failing_setup: true,
			..Recorder::default()
		});
		let registry = registry(&[broken]);

		let error = registry.load("broken", &data).await.unwrap_err();

		assert!(!registry.is_loaded("broken").await);
		let ExtensionError::Failed { stage, source, .. } = error else {
			panic!("expected a hook failure");
		};
		assert_eq!(stage, "setup");
		assert_eq!(source.to_string(), "setup hook");
	}

	#[tokio::test]
	async fn failing_teardown_keeps_extension_loaded() {
		let data = Data::for_tests();
		let stuck = Arc::new(Recorder {
			name: "stuck",
			failing_teardown: true,
			..Recorder::default()
		});
		let registry = registry(&[Arc::clone(&stuck)]);

		registry.load("stuck", &data).await.unwrap();
		let error = registry.reload("stuck", &data).await.unwrap_err();

		assert!(registry.is_loaded("stuck").await);
		assert_eq!(stuck.setups.load(Ordering::SeqCst), 1);
		let ExtensionError::Failed { stage, .. } = error else {
			panic!("expected a hook failure");
		};
		assert_eq!(stage, "teardown");
	}

	#[tokio::test]
	async fn load_all_skips_failures() {
		let data = Data::for_tests();
		let broken = Arc::new(Recorder {
			name: "broken",
			failing_setup: true,
			..Recorder::default()
		});
		let registry = registry(&[broken, recorder("music")]);

		registry.load_all(&data).await;

		assert_eq!(registry.loaded().await, vec!["music".to_owned()]);
	}

	#[tokio::test]
	async fn resolve_expands_patterns() {
		let data = Data::for_tests();
		let registry = registry(&[
			recorder("games.chess"),
			recorder("games.go"),
			recorder("music"),
			recorder("gamesroom"),
		]);
		registry.load("music", &data).await.unwrap();
		registry.load("games.go", &data).await.unwrap();

		let names = registry.resolve(["music", "games.*", "~", "unknown"]).await;

		assert_eq!(
			names,
			vec![
				"music",
				"games.chess",
				"games.go",
				"games.go",
				"music",
				"unknown",
			]
		);
	}
}
