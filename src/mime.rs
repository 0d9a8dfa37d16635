use std::fmt::Debug;

/// Extension to content type lookup.
pub trait MimeRegistry: Debug + Send + Sync {
    /// The content type registered for `extension`, without the leading dot.
    /// Lookups are case sensitive.
    fn find_type(&self, extension: &str) -> Option<&str>;
}

/// The `mime_guess` extension table. Its keys are lowercase, so only
/// lowercase extensions resolve.
#[derive(Debug, Default, Clone, Copy)]
pub struct MimeTypes;

impl MimeRegistry for MimeTypes {
    fn find_type(&self, extension: &str) -> Option<&str> {
        if extension.chars().any(|c| c.is_ascii_uppercase()) {
            return None;
        }

        mime_guess::from_ext(extension).first_raw()
    }
}
