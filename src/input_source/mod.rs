//! Input source module
//!
//! The OS keeps the list of installed keyboard input sources; this module
//! only consumes it through [`InputSourceDirectory`] and decides which
//! source a gesture should switch to.

mod toggle;

#[cfg(target_os = "macos")]
mod macos;

#[cfg(test)]
pub(crate) mod testing;

pub use toggle::{TogglePolicy, ToggleEngine};

/// 2-Set Korean
pub const KOREAN_SOURCE_ID: &str = "com.apple.inputmethod.Korean.2SetKorean";
/// Japanese Romaji typing
pub const JAPANESE_SOURCE_ID: &str = "com.apple.inputmethod.Kotoeri.RomajiTyping.Japanese";
/// Latin/English layouts, in order of preference
pub const LATIN_SOURCE_IDS: [&str; 2] = ["com.apple.keylayout.ABC", "com.apple.keylayout.US"];

/// Check if an identifier names one of the known Latin/English layouts
pub fn is_latin(id: &str) -> bool {
    LATIN_SOURCE_IDS.contains(&id)
}

/// Short human-readable name for an input source identifier
pub fn display_name(id: &str) -> &str {
    match id {
        KOREAN_SOURCE_ID => "Korean",
        JAPANESE_SOURCE_ID => "Japanese",
        "com.apple.keylayout.ABC" => "ABC",
        "com.apple.keylayout.US" => "U.S.",
        other => other.rsplit('.').next().unwrap_or(other),
    }
}

/// A handle to one installed input source
pub trait InputSource: Clone + Send + Sync {
    /// Stable identifier, e.g. `com.apple.keylayout.ABC`
    fn id(&self) -> &str;
}

impl InputSource for String {
    fn id(&self) -> &str {
        self
    }
}

/// The OS's registry of installed input sources
pub trait InputSourceDirectory: Send + Sync {
    type Source: InputSource;

    /// Enumerate installed sources
    fn sources(&self) -> Vec<Self::Source>;

    /// Identifier of the currently active keyboard source
    fn current_id(&self) -> Option<String>;

    /// Make a source the active one
    fn select(&self, source: &Self::Source) -> Result<(), InputSourceError>;

    /// Look up an installed source by identifier
    fn find(&self, id: &str) -> Option<Self::Source> {
        self.sources().into_iter().find(|source| source.id() == id)
    }
}

/// Errors that can occur while activating an input source
#[derive(Debug, thiserror::Error)]
pub enum InputSourceError {
    #[error("failed to select input source {id} (status {status})")]
    SelectFailed { id: String, status: i32 },

    #[error("input sources are not available on this platform")]
    Unavailable,
}

/// Directory used where the OS offers no input sources
#[cfg(not(target_os = "macos"))]
#[derive(Debug, Default)]
pub struct NoInputSources;

#[cfg(not(target_os = "macos"))]
impl InputSourceDirectory for NoInputSources {
    type Source = String;

    fn sources(&self) -> Vec<String> {
        Vec::new()
    }

    fn current_id(&self) -> Option<String> {
        None
    }

    fn select(&self, _source: &String) -> Result<(), InputSourceError> {
        Err(InputSourceError::Unavailable)
    }
}

/// The input source directory for the platform this daemon was built for
#[cfg(target_os = "macos")]
pub fn platform_directory() -> macos::TisDirectory {
    macos::TisDirectory::new()
}

/// The input source directory for the platform this daemon was built for
#[cfg(not(target_os = "macos"))]
pub fn platform_directory() -> NoInputSources {
    NoInputSources
}
