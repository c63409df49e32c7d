use crate::ai::{ApiClient, GenerationRequest, LLMBackend};
use crate::config::{ApiType, Config, ConfigStore, DEFAULT_PRESET};
use crate::error::{OutputError, SessionError};
use crate::example_set::ExampleSet;
use crate::output::OutputWriter;
use crate::presets::PresetManager;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::thread::JoinHandle;

/// Partial settings change; `None` fields keep their current value
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsUpdate {
    pub endpoint: Option<String>,
    pub api_type: Option<ApiType>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub request_timeout_secs: Option<u64>,
}

impl SettingsUpdate {
    pub fn is_empty(&self) -> bool {
        *self == SettingsUpdate::default()
    }

    fn apply(&self, config: &Config) -> Config {
        let mut updated = config.clone();
        if let Some(endpoint) = &self.endpoint {
            updated.endpoint = endpoint.trim().to_string();
        }
        if let Some(api_type) = self.api_type {
            updated.api_type = api_type;
        }
        if let Some(api_key) = &self.api_key {
            updated.api_key = api_key.trim().to_string();
        }
        if let Some(model) = &self.model {
            updated.model = model.trim().to_string();
        }
        if let Some(secs) = self.request_timeout_secs {
            updated.request_timeout_secs = secs;
        }
        updated
    }
}

/// Marks a generation as in flight until dropped
struct InFlightGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Everything a user interaction needs, passed explicitly instead of living in globals
///
/// A session owns the config store, the preset manager, the current config
/// and the output target. It is cheap to clone; clones share state, which is
/// how a generation worker thread sees the same session as the shell.
///
/// At most one generation runs at a time. Each generation works on a copy
/// of the config taken when it starts, so settings edited meanwhile only
/// affect the next request.
#[derive(Clone)]
pub struct Session {
    store: ConfigStore,
    presets: PresetManager,
    config: Arc<RwLock<Config>>,
    output: Arc<Mutex<OutputWriter>>,
    in_flight: Arc<AtomicBool>,
    backend: Option<Arc<dyn LLMBackend>>,
}

impl Session {
    /// Open a session: load the config and make sure a preset exists
    pub fn open(store: ConfigStore, presets: PresetManager) -> Self {
        let mut config = store.load();
        match presets.ensure_default() {
            Ok(true) => info!("Created default preset in {}", presets.dir().display()),
            Ok(false) => {}
            Err(e) => warn!("Could not create default preset: {}", e),
        }
        if !presets.exists(&config.active_preset) {
            repair_active_preset(&store, &presets, &mut config);
        }
        debug!("Session opened with {:?}", config);

        Self {
            store,
            presets,
            config: Arc::new(RwLock::new(config)),
            output: Arc::new(Mutex::new(OutputWriter::new())),
            in_flight: Arc::new(AtomicBool::new(false)),
            backend: None,
        }
    }

    /// Route every API call through `backend` instead of the configured endpoint
    pub fn with_backend(mut self, backend: Arc<dyn LLMBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Snapshot of the current configuration
    pub fn config(&self) -> Config {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn config_store(&self) -> &ConfigStore {
        &self.store
    }

    pub fn presets(&self) -> &PresetManager {
        &self.presets
    }

    /// Apply a settings change and persist it immediately
    ///
    /// Nothing changes if the result is invalid or cannot be written.
    pub fn update_settings(&self, update: &SettingsUpdate) -> Result<Config, SessionError> {
        let mut config = self.config.write().unwrap_or_else(PoisonError::into_inner);
        let updated = update.apply(&config);
        self.store.save(&updated)?;
        *config = updated.clone();
        info!(
            "Settings updated: {} at {}",
            updated.api_type, updated.endpoint
        );
        Ok(updated)
    }

    /// Make `name` the active preset
    pub fn set_active_preset(&self, name: &str) -> Result<(), SessionError> {
        let mut config = self.config.write().unwrap_or_else(PoisonError::into_inner);
        self.presets.set_active(name, &self.store, &mut *config)?;
        Ok(())
    }

    /// Delete a preset; the active one is protected
    pub fn delete_preset(&self, name: &str) -> Result<(), SessionError> {
        let active = self.config().active_preset;
        self.presets.delete(name, &active)?;
        Ok(())
    }

    /// Instruction text of the active preset
    pub fn active_preset_text(&self) -> Result<String, SessionError> {
        let active = self.config().active_preset;
        Ok(self.presets.read(&active)?)
    }

    /// Whether a generation is currently running
    pub fn is_generating(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Generate a prompt from `examples` and `topic` using the active preset
    ///
    /// Never touches the output file; see [`Session::save_generated`].
    ///
    /// # Errors
    ///
    /// * `Busy` if another generation is running
    /// * `InvalidInput` for a blank topic, no examples or a blank preset
    /// * `Preset` if the active preset cannot be read
    /// * `Api` for every failure of the request itself
    pub async fn generate(&self, examples: &ExampleSet, topic: &str) -> Result<String, SessionError> {
        let guard = self.begin_generation()?;
        self.run_generation(guard, examples, topic).await
    }

    /// Run a generation on a worker thread with its own runtime
    ///
    /// The busy check happens before the thread starts, so a second call
    /// while one is pending fails right away.
    pub fn spawn_generation(
        &self,
        examples: ExampleSet,
        topic: String,
    ) -> Result<JoinHandle<Result<String, SessionError>>, SessionError> {
        let guard = self.begin_generation()?;
        let session = self.clone();

        let handle = std::thread::spawn(move || {
            let rt = tokio::runtime::Runtime::new()
                .map_err(|e| SessionError::Worker(format!("failed to start runtime: {}", e)))?;
            rt.block_on(session.run_generation(guard, &examples, &topic))
        });
        Ok(handle)
    }

    /// List models available at the configured endpoint
    pub async fn list_models(&self) -> Result<Vec<String>, SessionError> {
        let client = self.client_for(&self.config())?;
        Ok(client.list_models().await?)
    }

    /// Append a generated prompt to the output file
    pub fn save_generated(&self, text: &str) -> Result<(), SessionError> {
        if text.trim().is_empty() {
            return Err(SessionError::InvalidInput(
                "there is no generated prompt to save".to_string(),
            ));
        }
        self.output().append(text)?;
        Ok(())
    }

    pub fn set_output_path(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        info!("Output file set to {}", path.display());
        self.output().set_path(path);
    }

    pub fn clear_output_path(&self) {
        self.output().clear_path();
    }

    pub fn output_path(&self) -> Option<PathBuf> {
        self.output().path().map(Path::to_path_buf)
    }

    pub fn read_output(&self) -> Result<String, OutputError> {
        self.output().read()
    }

    pub fn overwrite_output(&self, text: &str) -> Result<(), OutputError> {
        self.output().overwrite(text)
    }

    fn output(&self) -> MutexGuard<'_, OutputWriter> {
        self.output.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin_generation(&self) -> Result<InFlightGuard, SessionError> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| SessionError::Busy)?;
        Ok(InFlightGuard {
            flag: Arc::clone(&self.in_flight),
        })
    }

    async fn run_generation(
        &self,
        guard: InFlightGuard,
        examples: &ExampleSet,
        topic: &str,
    ) -> Result<String, SessionError> {
        let _guard = guard;

        let topic = topic.trim();
        if topic.is_empty() {
            return Err(SessionError::InvalidInput(
                "describe the topic or goal first".to_string(),
            ));
        }
        if examples.is_empty() {
            return Err(SessionError::InvalidInput(
                "load at least one non-empty examples file".to_string(),
            ));
        }

        let snapshot = self.config();
        let system_prompt = self.presets.read(&snapshot.active_preset)?;
        if system_prompt.trim().is_empty() {
            return Err(SessionError::InvalidInput(format!(
                "active preset '{}' is empty",
                snapshot.active_preset
            )));
        }

        let client = self.client_for(&snapshot)?;
        let request = GenerationRequest::new(system_prompt, examples.texts(), topic);
        Ok(client.generate(&request).await?)
    }

    fn client_for(&self, config: &Config) -> Result<ApiClient, SessionError> {
        match &self.backend {
            Some(backend) => Ok(ApiClient::with_backend(Arc::clone(backend))),
            None => Ok(ApiClient::from_config(config)?),
        }
    }
}

/// Point a dangling active preset at `default`, or the first listed preset
///
/// The choice is persisted; if saving fails it still applies to this session.
fn repair_active_preset(store: &ConfigStore, presets: &PresetManager, config: &mut Config) {
    let fallback = if presets.exists(DEFAULT_PRESET) {
        Some(DEFAULT_PRESET.to_string())
    } else {
        presets.list().ok().and_then(|names| names.into_iter().next())
    };
    let Some(fallback) = fallback else {
        warn!("No presets available in {}", presets.dir().display());
        return;
    };

    warn!(
        "Active preset '{}' does not exist in {}, using '{}'",
        config.active_preset,
        presets.dir().display(),
        fallback
    );
    if let Err(e) = presets.set_active(&fallback, store, config) {
        warn!("Could not persist active preset '{}': {}", fallback, e);
        config.active_preset = fallback;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::MockBackend;
    use crate::error::{ApiError, PresetError};
    use std::time::Duration;
    use tempfile::TempDir;

    fn open_session(backend: Arc<MockBackend>) -> (TempDir, Session) {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::at_path(dir.path().join("config.json"));
        let presets = PresetManager::new(dir.path().join("system_prompts"));
        presets.write("default", "Write vivid prompts.").unwrap();
        let session = Session::open(store, presets).with_backend(backend);
        (dir, session)
    }

    fn examples() -> ExampleSet {
        let mut set = ExampleSet::new();
        set.insert(
            "examples.txt",
            "a red fox in snow\na blue whale underwater\n",
        );
        set
    }

    #[tokio::test]
    async fn test_generate_uses_active_preset_and_examples() {
        let backend = Arc::new(MockBackend::success("a green parrot"));
        let (_dir, session) = open_session(backend.clone());

        let text = session
            .generate(&examples(), "  a green parrot in a jungle ")
            .await
            .unwrap();

        assert_eq!(text, "a green parrot");
        let request = backend.last_request().unwrap();
        assert_eq!(request.system_prompt, "Write vivid prompts.");
        assert_eq!(
            request.examples,
            vec!["a red fox in snow\na blue whale underwater"]
        );
        assert_eq!(request.topic, "a green parrot in a jungle");
        assert!(!session.is_generating());
    }

    #[tokio::test]
    async fn test_generate_validates_input() {
        let backend = Arc::new(MockBackend::success("unused"));
        let (_dir, session) = open_session(backend.clone());

        let blank_topic = session.generate(&examples(), "   ").await;
        assert!(matches!(blank_topic, Err(SessionError::InvalidInput(_))));

        let no_examples = session.generate(&ExampleSet::new(), "topic").await;
        assert!(matches!(no_examples, Err(SessionError::InvalidInput(_))));

        assert_eq!(backend.call_count(), 0);
        assert!(!session.is_generating());
    }

    #[tokio::test]
    async fn test_api_error_leaves_output_untouched() {
        let backend = Arc::new(MockBackend::status_error(503, "overloaded"));
        let (dir, session) = open_session(backend);
        let output = dir.path().join("output.txt");
        session.set_output_path(&output);

        let result = session.generate(&examples(), "topic").await;

        assert!(matches!(
            result,
            Err(SessionError::Api(ApiError::Status { status: 503, .. }))
        ));
        assert!(!output.exists());
    }

    #[test]
    fn test_second_generation_while_pending_is_busy() {
        let backend =
            Arc::new(MockBackend::success("done").with_delay(Duration::from_millis(300)));
        let (_dir, session) = open_session(backend.clone());

        let first = session
            .spawn_generation(examples(), "topic".to_string())
            .unwrap();
        assert!(session.is_generating());

        let second = session.spawn_generation(examples(), "topic".to_string());
        assert!(matches!(second, Err(SessionError::Busy)));

        assert_eq!(first.join().unwrap().unwrap(), "done");
        assert!(!session.is_generating());

        let third = session
            .spawn_generation(examples(), "topic".to_string())
            .unwrap();
        assert!(third.join().unwrap().is_ok());
        assert_eq!(backend.call_count(), 2);
    }

    #[test]
    fn test_save_generated_requires_output_path() {
        let (_dir, session) = open_session(Arc::new(MockBackend::success("x")));

        let result = session.save_generated("a prompt");
        assert!(matches!(
            result,
            Err(SessionError::Output(OutputError::PathNotSet))
        ));
    }

    #[test]
    fn test_save_generated_appends_line() {
        let (dir, session) = open_session(Arc::new(MockBackend::success("x")));
        let output = dir.path().join("output.txt");
        session.set_output_path(&output);

        session.save_generated("first prompt").unwrap();
        session.save_generated("second prompt").unwrap();

        assert_eq!(
            session.read_output().unwrap(),
            "first prompt\nsecond prompt\n"
        );
        assert!(matches!(
            session.save_generated("  "),
            Err(SessionError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_update_settings_persists_immediately() {
        let (_dir, session) = open_session(Arc::new(MockBackend::success("x")));

        let update = SettingsUpdate {
            endpoint: Some("http://127.0.0.1:1234".to_string()),
            api_type: Some(ApiType::OpenAICompatible),
            api_key: Some("lm-studio".to_string()),
            ..SettingsUpdate::default()
        };
        let updated = session.update_settings(&update).unwrap();

        assert_eq!(updated.endpoint, "http://127.0.0.1:1234");
        assert_eq!(session.config(), updated);
        assert_eq!(session.config_store().try_load().unwrap(), updated);
    }

    #[test]
    fn test_invalid_settings_are_rejected_and_not_applied() {
        let (_dir, session) = open_session(Arc::new(MockBackend::success("x")));
        let before = session.config();

        let update = SettingsUpdate {
            endpoint: Some("not a url".to_string()),
            ..SettingsUpdate::default()
        };
        assert!(matches!(
            session.update_settings(&update),
            Err(SessionError::Config(_))
        ));
        assert_eq!(session.config(), before);
    }

    #[test]
    fn test_preset_activation_and_deletion_policy() {
        let (_dir, session) = open_session(Arc::new(MockBackend::success("x")));
        session.presets().write("poetry", "Write haiku.").unwrap();

        session.set_active_preset("poetry").unwrap();
        assert_eq!(session.active_preset_text().unwrap(), "Write haiku.");

        assert!(matches!(
            session.delete_preset("poetry"),
            Err(SessionError::Preset(PresetError::InvalidOperation(_)))
        ));

        session.set_active_preset("default").unwrap();
        session.delete_preset("poetry").unwrap();
        assert_eq!(session.presets().list().unwrap(), vec!["default"]);

        assert!(matches!(
            session.delete_preset("default"),
            Err(SessionError::Preset(PresetError::InvalidOperation(_)))
        ));
    }

    #[test]
    fn test_open_falls_back_from_missing_active_preset() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::at_path(dir.path().join("config.json"));
        store
            .save(&Config {
                active_preset: "ghost".to_string(),
                ..Config::default()
            })
            .unwrap();
        let presets = PresetManager::new(dir.path().join("system_prompts"));
        presets.write("poetry", "Write haiku.").unwrap();
        presets.write("default", "Write vivid prompts.").unwrap();

        let session = Session::open(store, presets);

        assert_eq!(session.config().active_preset, "default");
        assert_eq!(session.config_store().load().active_preset, "default");
        assert_eq!(session.active_preset_text().unwrap(), "Write vivid prompts.");
    }

    #[test]
    fn test_open_falls_back_to_first_listed_preset() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::at_path(dir.path().join("config.json"));
        store
            .save(&Config {
                active_preset: "ghost".to_string(),
                ..Config::default()
            })
            .unwrap();
        let presets = PresetManager::new(dir.path().join("system_prompts"));
        presets.write("poetry", "Write haiku.").unwrap();
        presets.write("cinematic", "Write film stills.").unwrap();

        let session = Session::open(store, presets);

        assert_eq!(session.config().active_preset, "cinematic");
        assert_eq!(session.config_store().load().active_preset, "cinematic");
    }

    #[tokio::test]
    async fn test_list_models_through_backend() {
        let backend =
            Arc::new(MockBackend::success("x").with_models(vec!["llama3.2".to_string()]));
        let (_dir, session) = open_session(backend);

        assert_eq!(session.list_models().await.unwrap(), vec!["llama3.2"]);
    }
}
