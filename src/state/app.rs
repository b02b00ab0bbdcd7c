//! Application state shared by the request path and background tasks

use crate::config::Config;
use crate::pattern::PatternCompiler;
use crate::provider::{LogEntry, ProviderList, RequestMeta, RuleEngine, RuleFile};
use crate::rules::{ResolvedRules, RuleSourceResolver};
use crate::state::counters::Counters;
use crate::state::log_buffer::LogBuffer;
use crate::storage::{CounterRecord, SharedStorage, Storage, StorageResult};
use crate::whitelist::{FrameTree, WhitelistMatcher};
use crate::ConfigError;
use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Resource type of a top-level navigation
pub const MAIN_FRAME: &str = "main_frame";

/// Resource type of a document loaded in a sub frame
pub const SUB_FRAME: &str = "sub_frame";

/// Navigates a browser tab
///
/// Used for providers that must redirect top-level navigations by
/// navigating the tab instead of answering with a redirect.
pub trait TabNavigator: Send + Sync {
    fn navigate(&self, tab_id: i64, url: &str);
}

/// Navigator for hosts without tabs
#[derive(Debug, Default)]
pub struct NoopNavigator;

impl TabNavigator for NoopNavigator {
    fn navigate(&self, tab_id: i64, url: &str) {
        tracing::debug!("No navigator: tab {} would load {}", tab_id, url);
    }
}

/// An intercepted request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterceptRequest {
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(rename = "type", default = "default_type")]
    pub resource_type: String,
    #[serde(default = "no_id")]
    pub tab_id: i64,
    #[serde(default)]
    pub frame_id: i64,
    #[serde(default = "no_id")]
    pub parent_frame_id: i64,
    #[serde(default)]
    pub referer: Option<String>,
    #[serde(default)]
    pub initiator: Option<String>,
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_type() -> String {
    MAIN_FRAME.to_string()
}

fn no_id() -> i64 {
    -1
}

impl InterceptRequest {
    /// A top-level GET navigation outside any tab
    pub fn navigation(url: &str) -> Self {
        Self {
            url: url.to_string(),
            method: default_method(),
            resource_type: default_type(),
            tab_id: no_id(),
            frame_id: 0,
            parent_frame_id: no_id(),
            referer: None,
            initiator: None,
        }
    }
}

/// Decision for an intercepted request
///
/// Serializes to `{}`, `{"redirectUrl": ...}` or `{"cancel": true}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InterceptResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub cancel: bool,
}

impl InterceptResponse {
    pub fn pass() -> Self {
        Self::default()
    }

    pub fn redirect(url: String) -> Self {
        Self {
            redirect_url: Some(url),
            cancel: false,
        }
    }

    pub fn cancel() -> Self {
        Self {
            redirect_url: None,
            cancel: true,
        }
    }

    pub fn is_pass(&self) -> bool {
        self.redirect_url.is_none() && !self.cancel
    }
}

/// Everything the interceptor needs, constructed once at startup
///
/// The provider list is replaced wholesale on every rule resolution and the
/// engine on every whitelist edit; requests in flight keep the snapshot they
/// started with and never wait on a writer.
pub struct AppState {
    config: Config,
    compiler: Arc<PatternCompiler>,
    providers: ArcSwap<ProviderList>,
    engine: ArcSwap<RuleEngine>,
    frames: RwLock<FrameTree>,
    log: Mutex<LogBuffer>,
    counters: Counters,
    storage: Option<SharedStorage>,
    navigator: Arc<dyn TabNavigator>,
}

impl AppState {
    /// Creates the state, restoring the whitelist, log and counters from
    /// storage when available
    pub fn new(
        config: Config,
        compiler: Arc<PatternCompiler>,
        storage: Option<SharedStorage>,
        navigator: Arc<dyn TabNavigator>,
    ) -> Self {
        let whitelist = WhitelistMatcher::default().with_resolver(compiler.resolver());
        let mut state = Self {
            engine: ArcSwap::from_pointee(RuleEngine::new(config.engine.clone(), whitelist)),
            log: Mutex::new(LogBuffer::new(config.log.limit)),
            config,
            compiler,
            providers: ArcSwap::from_pointee(ProviderList::default()),
            frames: RwLock::new(FrameTree::new()),
            counters: Counters::default(),
            storage,
            navigator,
        };

        if let Some(entries) = state.with_storage(|s| s.load_whitelist()) {
            let mut engine = RuleEngine::clone(&state.engine.load());
            for entry in entries {
                if let Err(e) = engine.whitelist_mut().add(&entry) {
                    tracing::warn!("Ignoring stored whitelist entry: {}", e);
                }
            }
            state.engine.store(Arc::new(engine));
        }
        if let Some(entries) = state.with_storage(|s| s.load_log()) {
            state.log = Mutex::new(LogBuffer::restore(state.config.log.limit, entries));
        }
        if let Some(record) = state.with_storage(|s| s.load_counters()) {
            state.counters = Counters::restore(record);
        }

        state
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn compiler(&self) -> &Arc<PatternCompiler> {
        &self.compiler
    }

    /// The current provider list
    pub fn providers(&self) -> Arc<ProviderList> {
        self.providers.load_full()
    }

    /// Builds providers from `rules` and swaps them in
    pub fn install_rules(&self, rules: &RuleFile) {
        let list = Arc::new(ProviderList::from_rule_file(rules, Arc::clone(&self.compiler)));
        tracing::info!("Installing {} providers", list.len());
        self.providers.store(list);
    }

    /// Resolves the rule sources and installs the result
    pub async fn reload(&self, resolver: &RuleSourceResolver) -> ResolvedRules {
        let resolved = resolver.resolve().await;
        self.install_rules(&resolved.rules);
        resolved
    }

    /// Decides what happens to an intercepted request
    ///
    /// Synchronous: only in-memory state is consulted.
    pub fn handle_request(&self, request: &InterceptRequest) -> InterceptResponse {
        if request.resource_type == MAIN_FRAME || request.resource_type == SUB_FRAME {
            self.frames
                .write()
                .unwrap_or_else(|e| e.into_inner())
                .record(
                    request.tab_id,
                    request.frame_id,
                    request.parent_frame_id,
                    &request.url,
                );
        }

        let providers = self.providers();
        let engine = self.engine.load();

        let Some(provider) = providers.find(
            &request.url,
            &request.method,
            &request.resource_type,
            &engine.settings().resource_types,
        ) else {
            return InterceptResponse::pass();
        };

        let meta = RequestMeta::new(&request.method, &request.resource_type)
            .with_context(self.context_urls(request));
        let outcome = engine.apply(provider, &request.url, &meta);
        drop(engine);

        self.counters.record(&outcome);
        if !outcome.log.is_empty() {
            self.log
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .extend(outcome.log.iter().cloned());
        }

        if outcome.cancel {
            return InterceptResponse::cancel();
        }
        if !outcome.changed {
            return InterceptResponse::pass();
        }

        if provider.should_force_redirect() && request.resource_type == MAIN_FRAME {
            tracing::debug!("Forcing navigation of tab {} to {}", request.tab_id, outcome.url);
            self.navigator.navigate(request.tab_id, &outcome.url);
            return InterceptResponse::cancel();
        }

        InterceptResponse::redirect(outcome.url)
    }

    /// Handles one request encoded as JSON and returns the encoded response
    pub fn handle_json_request(&self, line: &str) -> serde_json::Result<String> {
        let request: InterceptRequest = serde_json::from_str(line)?;
        serde_json::to_string(&self.handle_request(&request))
    }

    fn context_urls(&self, request: &InterceptRequest) -> Vec<String> {
        let mut urls = self
            .frames
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .context_urls(request.tab_id, request.frame_id, request.parent_frame_id);
        urls.extend(request.referer.iter().cloned());
        urls.extend(request.initiator.iter().cloned());
        urls
    }

    /// Forgets a closed tab
    pub fn tab_removed(&self, tab_id: i64) {
        self.frames
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove_tab(tab_id);
    }

    // ===== Whitelist =====

    pub fn whitelist_entries(&self) -> Vec<String> {
        self.engine
            .load()
            .whitelist()
            .entries()
            .to_vec()
    }

    /// Adds a whitelist entry; returns `Ok(false)` when already present
    pub fn add_whitelist_entry(&self, entry: &str) -> Result<bool, ConfigError> {
        let mut added = Ok(false);
        self.engine.rcu(|current| {
            let mut engine = RuleEngine::clone(current);
            added = engine.whitelist_mut().add(entry);
            engine
        });
        let added = added?;
        if added {
            self.persist_whitelist();
        }
        Ok(added)
    }

    /// Removes a whitelist entry; returns whether it was present
    pub fn remove_whitelist_entry(&self, entry: &str) -> bool {
        let mut removed = false;
        self.engine.rcu(|current| {
            let mut engine = RuleEngine::clone(current);
            removed = engine.whitelist_mut().remove(entry);
            engine
        });
        if removed {
            self.persist_whitelist();
        }
        removed
    }

    fn persist_whitelist(&self) {
        let entries = self.whitelist_entries();
        self.with_storage(|s| s.save_whitelist(&entries));
    }

    // ===== Rule administration =====

    /// Stores the user's custom rule document; takes effect on next reload
    pub fn set_custom_rules(&self, json: &str) -> Result<usize, serde_json::Error> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        let rules = RuleFile::from_value(value);
        self.with_storage(|s| s.save_custom_rules(json));
        Ok(rules.len())
    }

    /// Disables providers by identity key; takes effect on next reload
    pub fn disable_providers(&self, signatures: &[String]) {
        self.with_storage(|s| {
            let mut stored = s.load_disabled_signatures()?;
            for signature in signatures {
                if !stored.contains(signature) {
                    stored.push(signature.clone());
                }
            }
            s.save_disabled_signatures(&stored)
        });
    }

    /// Re-enables providers by identity key; takes effect on next reload
    pub fn enable_providers(&self, signatures: &[String]) {
        self.with_storage(|s| {
            let mut stored = s.load_disabled_signatures()?;
            stored.retain(|existing| !signatures.contains(existing));
            s.save_disabled_signatures(&stored)
        });
    }

    // ===== Log & Counters =====

    pub fn log_snapshot(&self) -> Vec<LogEntry> {
        self.log.lock().unwrap_or_else(|e| e.into_inner()).snapshot()
    }

    pub fn clear_log(&self) {
        self.log.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    pub fn counters(&self) -> CounterRecord {
        self.counters.snapshot()
    }

    pub fn reset_counters(&self) {
        self.counters.reset();
    }

    /// Persists the log and counters if they changed since the last flush
    pub fn flush(&self) {
        let log = self.log.lock().unwrap_or_else(|e| e.into_inner()).take_dirty();
        if let Some(entries) = log {
            tracing::trace!("Flushing {} log entries", entries.len());
            self.with_storage(|s| s.replace_log(&entries));
        }
        if let Some(counters) = self.counters.take_dirty() {
            self.with_storage(|s| s.save_counters(&counters));
        }
    }

    /// Flushes on a fixed interval, coalescing every change made in between
    pub fn spawn_flush_loop(self: Arc<Self>) -> JoinHandle<()> {
        let period = Duration::from_millis(self.config.log.flush_interval_ms.max(1));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                self.flush();
            }
        })
    }

    /// Runs a storage operation, logging and swallowing failures
    fn with_storage<T, F>(&self, op: F) -> Option<T>
    where
        F: FnOnce(&mut (dyn Storage + Send)) -> StorageResult<T>,
    {
        let storage = self.storage.as_ref()?;
        let mut guard = storage.lock().unwrap_or_else(|e| e.into_inner());
        match op(&mut *guard) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Storage operation failed: {}", e);
                None
            }
        }
    }
}
