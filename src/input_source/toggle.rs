//! Toggle engine
//!
//! Decides the target input source for a gesture and activates it. The
//! Korean/Latin pair is resolved from cached handles because it runs on the
//! intercepting tap's hot path; the Korean/Japanese pair enumerates the
//! installed sources every time.

use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info};

use super::{
    is_latin, InputSource, InputSourceDirectory, JAPANESE_SOURCE_ID, KOREAN_SOURCE_ID,
    LATIN_SOURCE_IDS,
};
use crate::events::MonitorEvent;

/// Which pair of sources a gesture toggles between
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TogglePolicy {
    /// Option+Shift chord
    KoreanJapanese,
    /// Shift+Space chord
    KoreanLatin,
}

impl std::fmt::Display for TogglePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TogglePolicy::KoreanJapanese => write!(f, "korean<->japanese"),
            TogglePolicy::KoreanLatin => write!(f, "korean<->latin"),
        }
    }
}

/// Handles kept for the hot path
struct SourceCache<S> {
    korean: Option<S>,
    latin: Option<S>,
}

impl<S> Default for SourceCache<S> {
    fn default() -> Self {
        Self {
            korean: None,
            latin: None,
        }
    }
}

/// Switches input sources on behalf of the chord listeners
pub struct ToggleEngine<D: InputSourceDirectory> {
    directory: D,
    cache: Mutex<SourceCache<D::Source>>,
    event_tx: broadcast::Sender<MonitorEvent>,
}

impl<D: InputSourceDirectory> ToggleEngine<D> {
    pub fn new(directory: D, event_tx: broadcast::Sender<MonitorEvent>) -> Self {
        Self {
            directory,
            cache: Mutex::new(SourceCache::default()),
            event_tx,
        }
    }

    /// Identifier of the active source, as reported by the directory
    pub fn current_id(&self) -> Option<String> {
        self.directory.current_id()
    }

    /// Re-resolve the cached Korean and Latin handles
    pub fn refresh_cache(&self) {
        let sources = self.directory.sources();
        let korean = sources
            .iter()
            .find(|source| source.id() == KOREAN_SOURCE_ID)
            .cloned();
        let latin = LATIN_SOURCE_IDS
            .iter()
            .find_map(|id| sources.iter().find(|source| source.id() == *id))
            .cloned();

        info!(
            korean = ?korean.as_ref().map(|s| s.id()),
            latin = ?latin.as_ref().map(|s| s.id()),
            "input source cache refreshed"
        );

        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        cache.korean = korean;
        cache.latin = latin;
    }

    /// Forget the cached handles
    pub fn clear_cache(&self) {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        *cache = SourceCache::default();
        debug!("input source cache cleared");
    }

    /// Korean -> Japanese, Japanese -> Korean, anything else untouched
    pub fn toggle_korean_japanese(&self) -> bool {
        let Some(current) = self.directory.current_id() else {
            return false;
        };

        let target_id = match current.as_str() {
            KOREAN_SOURCE_ID => JAPANESE_SOURCE_ID,
            JAPANESE_SOURCE_ID => KOREAN_SOURCE_ID,
            _ => {
                debug!(%current, "current source is neither Korean nor Japanese");
                return false;
            }
        };

        let Some(target) = self.directory.find(target_id) else {
            debug!(target_id, "target input source is not installed");
            return false;
        };

        self.activate(TogglePolicy::KoreanJapanese, current, &target)
    }

    /// Korean -> cached Latin, Latin -> cached Korean, anything else untouched
    ///
    /// Returns whether the active source actually changed; the caller uses
    /// this to decide whether to swallow the triggering key.
    pub fn toggle_korean_latin(&self) -> bool {
        let Some(current) = self.directory.current_id() else {
            return false;
        };

        let target = {
            let cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
            if current == KOREAN_SOURCE_ID {
                cache.latin.clone()
            } else if is_latin(&current) {
                cache.korean.clone()
            } else {
                debug!(%current, "current source is neither Korean nor Latin");
                return false;
            }
        };

        let Some(target) = target else {
            debug!(%current, "no cached target input source");
            return false;
        };

        self.activate(TogglePolicy::KoreanLatin, current, &target)
    }

    fn activate(&self, policy: TogglePolicy, from: String, target: &D::Source) -> bool {
        if let Err(e) = self.directory.select(target) {
            debug!(?e, %policy, "input source switch did not happen");
            return false;
        }

        info!(%policy, from = %from, to = target.id(), "input source switched");
        let _ = self.event_tx.send(MonitorEvent::SourceSwitched {
            policy,
            from,
            to: target.id().to_string(),
        });
        true
    }
}
