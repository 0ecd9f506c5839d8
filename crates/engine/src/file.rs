use crate::error::EngineError;
use std::path::{Path, PathBuf};

/// A local file offered for ingestion.
///
/// The engine only reads it. MIME type and extension come from the file name unless
/// overridden, since uploads usually arrive under temporary names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHandle {
    path: PathBuf,
    mime: String,
    original_name: String,
}

impl FileHandle {
    /// Wraps `path`, guessing its MIME type from the extension.
    ///
    /// # Errors
    /// Returns [`EngineError::InvalidFileName`] when the path has no UTF-8 file name.
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self, EngineError> {
        let path = path.into();
        let original_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| EngineError::InvalidFileName {
                message: path.display().to_string().into(),
                context: Some("Path has no UTF-8 file name".into()),
            })?
            .to_owned();
        let mime = guess_mime(&original_name);
        Ok(Self { path, mime, original_name })
    }

    #[must_use]
    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = mime.into();
        self
    }

    /// Replaces the client-side name; the MIME type is re-guessed from it.
    #[must_use]
    pub fn with_original_name(mut self, name: impl Into<String>) -> Self {
        self.original_name = name.into();
        self.mime = guess_mime(&self.original_name);
        self
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn mime(&self) -> &str {
        &self.mime
    }

    #[must_use]
    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    /// Extension of the original name, without the dot.
    #[must_use]
    pub fn extension(&self) -> Option<&str> {
        Path::new(&self.original_name).extension().and_then(|ext| ext.to_str())
    }
}

fn guess_mime(name: &str) -> String {
    mime_guess::from_path(name).first_or_octet_stream().essence_str().to_owned()
}

/// File name without its final extension.
pub(crate) fn stem(filename: &str) -> &str {
    Path::new(filename).file_stem().and_then(|s| s.to_str()).unwrap_or(filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_mime_and_extension() {
        let file = FileHandle::from_path("/tmp/upload/cat.PNG").unwrap();
        assert_eq!(file.mime(), "image/png");
        assert_eq!(file.extension(), Some("PNG"));
        assert_eq!(file.original_name(), "cat.PNG");
    }

    #[test]
    fn unknown_extension_is_octet_stream() {
        let file = FileHandle::from_path("blob").unwrap();
        assert_eq!(file.mime(), "application/octet-stream");
        assert_eq!(file.extension(), None);
    }

    #[test]
    fn overrides_apply() {
        let file = FileHandle::from_path("/tmp/php4Fa9")
            .unwrap()
            .with_original_name("holiday.mp4");
        assert_eq!(file.mime(), "video/mp4");
        assert_eq!(file.extension(), Some("mp4"));

        let file = file.with_mime("video/quicktime");
        assert_eq!(file.mime(), "video/quicktime");
        assert_eq!(file.path(), Path::new("/tmp/php4Fa9"));
    }

    #[test]
    fn rejects_paths_without_name() {
        assert!(matches!(FileHandle::from_path("/"), Err(EngineError::InvalidFileName { .. })));
    }

    #[test]
    fn stem_strips_last_extension() {
        assert_eq!(stem("clip.final.mp4"), "clip.final");
        assert_eq!(stem("noext"), "noext");
    }
}
