//! Decides whether the embedding index must be rebuilt.
//!
//! Pure functions only: the inputs are the newest known document mtime,
//! the timestamp of the last successful build, and a force flag.

use std::fmt;

/// Why a rebuild was requested, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildReason {
    Forced,
    NeverBuilt,
    DocumentsChanged,
}

impl fmt::Display for RebuildReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RebuildReason::Forced => "forced rebuild",
            RebuildReason::NeverBuilt => "no previous build",
            RebuildReason::DocumentsChanged => "vault changes detected since last build",
        };
        f.write_str(text)
    }
}

/// Evaluate the rebuild rules and return the first that applies.
///
/// `max_mtime = None` means the store had no current records or could
/// not be read; it is never evidence of change on its own.
pub fn rebuild_reason(
    max_mtime: Option<f64>,
    last_build_ts: f64,
    force: bool,
) -> Option<RebuildReason> {
    if force {
        return Some(RebuildReason::Forced);
    }
    if last_build_ts == 0.0 {
        return Some(RebuildReason::NeverBuilt);
    }
    match max_mtime {
        Some(mtime) if mtime > last_build_ts => Some(RebuildReason::DocumentsChanged),
        _ => None,
    }
}

pub fn needs_rebuild(max_mtime: Option<f64>, last_build_ts: f64, force: bool) -> bool {
    rebuild_reason(max_mtime, last_build_ts, force).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_mtime_is_not_stale() {
        assert!(!needs_rebuild(None, 100.0, false));
    }

    #[test]
    fn test_older_documents_are_not_stale() {
        assert!(!needs_rebuild(Some(50.0), 100.0, false));
        assert!(!needs_rebuild(Some(100.0), 100.0, false));
    }

    #[test]
    fn test_newer_documents_are_stale() {
        assert_eq!(
            rebuild_reason(Some(150.0), 100.0, false),
            Some(RebuildReason::DocumentsChanged)
        );
    }

    #[test]
    fn test_never_built_always_rebuilds() {
        for mtime in [None, Some(0.0), Some(1e12)] {
            assert_eq!(
                rebuild_reason(mtime, 0.0, false),
                Some(RebuildReason::NeverBuilt)
            );
        }
    }

    #[test]
    fn test_force_wins() {
        for (mtime, ts) in [(None, 100.0), (Some(50.0), 100.0), (Some(150.0), 0.0)] {
            assert_eq!(rebuild_reason(mtime, ts, true), Some(RebuildReason::Forced));
        }
    }
}
