//! Best-effort synchronisation run before user-facing commands.
//!
//! Each invocation walks a small state machine:
//!
//! ```text
//! Idle ─┬─ disabled / throttled ─────────────────────────► Skipped
//!       └─ Scanning ─┬─ ScanFailed
//!                    └─ ScanOk ─┬─ SkipRebuild
//!                               └─ Rebuilding ─┬─ RebuildFailed
//!                                              └─ RebuildOk
//! ```
//!
//! [`Synchronizer::on_invocation`] takes the persisted [`SyncState`] by
//! value and returns the updated copy alongside the outcome; it never
//! touches the state file itself. [`run_auto_sync`] is the adapter that
//! loads the state, runs one invocation, persists the result, and
//! swallows every error so the user's command always proceeds.

use anyhow::Context;

use crate::builder::IndexBuilder;
use crate::config::Config;
use crate::embedding::{self, EmbeddingModel};
use crate::index_store::IndexPaths;
use crate::models::ScanResult;
use crate::scanner::{unix_now, DocumentFilter, ScanMode, Scanner};
use crate::staleness::{self, RebuildReason};
use crate::state::{ConfigProvider, FileConfigProvider, SyncState};
use crate::store::FileStateStore;

/// Effective auto-update knobs for one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    pub enabled: bool,
    pub interval_secs: u64,
    /// Minimum `added + modified` before staleness is evaluated.
    pub rebuild_threshold: u64,
    /// False when no embedding provider is configured: scans still run,
    /// rebuilds never do.
    pub rebuild_enabled: bool,
}

impl SyncSettings {
    /// Whether a scan is due at `now` given the last scan time.
    pub fn scan_due(&self, last_scan_timestamp: f64, now: f64) -> bool {
        self.enabled && now - last_scan_timestamp >= self.interval_secs as f64
    }
}

/// Terminal state of one invocation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SyncOutcome {
    /// Auto-update disabled or the interval has not elapsed.
    Skipped,
    ScanFailed,
    /// Scan succeeded; too few changes or the index is fresh.
    SkipRebuild { scan: ScanResult },
    RebuildOk { scan: ScanResult, reason: RebuildReason },
    RebuildFailed { scan: ScanResult, reason: RebuildReason },
}

impl SyncOutcome {
    /// The scan result as seen by the caller; a skipped scan counts as a
    /// successful scan with no changes.
    pub fn scan_result(&self) -> ScanResult {
        match self {
            SyncOutcome::Skipped => ScanResult {
                success: true,
                added: 0,
                modified: 0,
            },
            SyncOutcome::ScanFailed => ScanResult::failed(),
            SyncOutcome::SkipRebuild { scan }
            | SyncOutcome::RebuildOk { scan, .. }
            | SyncOutcome::RebuildFailed { scan, .. } => *scan,
        }
    }
}

/// Orchestrates scan → staleness → build for one invocation.
///
/// The embedding model is only loaded when a rebuild is actually needed.
pub struct Synchronizer<'a, F> {
    store: &'a FileStateStore,
    scanner: &'a Scanner,
    builder: &'a IndexBuilder,
    load_model: F,
    settings: SyncSettings,
}

impl<'a, F> Synchronizer<'a, F>
where
    F: Fn() -> anyhow::Result<Box<dyn EmbeddingModel>>,
{
    pub fn new(
        store: &'a FileStateStore,
        scanner: &'a Scanner,
        builder: &'a IndexBuilder,
        load_model: F,
        settings: SyncSettings,
    ) -> Self {
        Self {
            store,
            scanner,
            builder,
            load_model,
            settings,
        }
    }

    pub async fn on_invocation(&self, state: SyncState, now: f64) -> (SyncState, SyncOutcome) {
        let mut state = state;

        if !self.settings.scan_due(state.last_scan_timestamp, now) {
            tracing::debug!(
                enabled = self.settings.enabled,
                last_scan = state.last_scan_timestamp,
                "auto-sync skipped"
            );
            return (state, SyncOutcome::Skipped);
        }

        let scan = self.scanner.scan(self.store, ScanMode::Incremental).await;
        if !scan.success {
            return (state, SyncOutcome::ScanFailed);
        }
        state.last_scan_timestamp = now;

        if !self.settings.rebuild_enabled || scan.changes() < self.settings.rebuild_threshold {
            return (state, SyncOutcome::SkipRebuild { scan });
        }

        let max_mtime = self.store.get_max_mtime().await;
        let reason = match staleness::rebuild_reason(max_mtime, state.last_build_timestamp, false)
        {
            Some(reason) => reason,
            None => return (state, SyncOutcome::SkipRebuild { scan }),
        };

        tracing::info!(%reason, added = scan.added, modified = scan.modified, "rebuilding embedding index");
        let built = match (self.load_model)() {
            Ok(model) => self.builder.build(self.store, model.as_ref()).await,
            Err(e) => {
                tracing::error!("could not load embedding model: {:#}", e);
                false
            }
        };

        if built {
            state.last_build_timestamp = now;
            (state, SyncOutcome::RebuildOk { scan, reason })
        } else {
            (state, SyncOutcome::RebuildFailed { scan, reason })
        }
    }
}

/// Run one synchronisation against the configured vault.
///
/// Never fails: errors are logged at `warn` and reported as `None`.
pub async fn run_auto_sync(config: &Config) -> Option<SyncOutcome> {
    match try_auto_sync(config).await {
        Ok(outcome) => {
            match outcome {
                SyncOutcome::ScanFailed => {
                    tracing::warn!("auto-sync scan failed; run `vidx index scan --full` for details")
                }
                SyncOutcome::RebuildFailed { .. } => {
                    tracing::warn!("auto-sync rebuild failed; run `vidx index build --force`")
                }
                _ => {}
            }
            Some(outcome)
        }
        Err(e) => {
            tracing::warn!("auto-sync skipped: {:#}", e);
            None
        }
    }
}

async fn try_auto_sync(config: &Config) -> anyhow::Result<SyncOutcome> {
    let mut provider = FileConfigProvider::new(config.clone());
    let auto = provider.auto_update_settings();
    let settings = SyncSettings {
        enabled: auto.enabled,
        interval_secs: auto.interval_secs,
        rebuild_threshold: provider.rebuild_threshold(),
        rebuild_enabled: config.embedding.is_enabled(),
    };
    let now = unix_now();

    if !settings.scan_due(auto.last_scan_timestamp, now) {
        return Ok(SyncOutcome::Skipped);
    }

    let root = provider
        .root_path()
        .context("no vault root configured")?;
    let store = FileStateStore::open(&config.store_path())
        .await
        .context("failed to open state store")?;
    let scanner = Scanner::new(root.clone(), DocumentFilter::from_config(&config.vault)?);
    let builder = IndexBuilder::new(root, IndexPaths::from_config(config));
    let embedding_config = config.embedding.clone();
    let sync = Synchronizer::new(
        &store,
        &scanner,
        &builder,
        move || embedding::create_model(&embedding_config),
        settings,
    );

    let before = provider.state();
    let (after, outcome) = sync.on_invocation(before, now).await;
    store.close().await;

    if after != before {
        provider
            .store_state(after)
            .context("failed to persist sync state")?;
    }
    Ok(outcome)
}
