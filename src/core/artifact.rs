use std::{
    fmt,
    path::{Path, PathBuf},
};

use uuid::Uuid;

use crate::core::domain::Language;

/// A compiled executable on local storage.
///
/// The file is removed when the handle is dropped unless [`Artifact::keep`]
/// releases it first.
pub struct Artifact {
    id: Uuid,
    language: Language,
    path: PathBuf,
    kept: bool,
}

impl Artifact {
    pub fn new(id: Uuid, language: Language, path: PathBuf) -> Self {
        Self {
            id,
            language,
            path,
            kept: false,
        }
    }

    /// Builds the unique output path for a new artifact inside `dir`.
    pub fn path_for(dir: &Path, language: Language, id: Uuid) -> PathBuf {
        dir.join(format!("{}{}", language.artifact_prefix(), id))
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Releases ownership of the file; it will no longer be deleted.
    pub fn keep(mut self) -> PathBuf {
        self.kept = true;
        std::mem::take(&mut self.path)
    }
}

impl AsRef<Path> for Artifact {
    fn as_ref(&self) -> &Path {
        self.path()
    }
}

impl fmt::Debug for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Artifact")
            .field("id", &self.id)
            .field("language", &self.language)
            .field("path", &self.path)
            .field("kept", &self.kept)
            .finish()
    }
}

impl Drop for Artifact {
    fn drop(&mut self) {
        if self.kept {
            return;
        }
        let path = &self.path;
        match std::fs::remove_file(path) {
            Ok(()) => tracing::debug!("Removed artifact {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to remove artifact {}: {}", path.display(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch_artifact(dir: &Path) -> Artifact {
        let id = Uuid::new_v4();
        let path = Artifact::path_for(dir, Language::Cpp, id);
        std::fs::write(&path, b"binary").unwrap();
        Artifact::new(id, Language::Cpp, path)
    }

    #[test]
    fn test_drop_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = touch_artifact(dir.path());
        let path = artifact.path().to_path_buf();
        assert!(path.exists());

        drop(artifact);
        assert!(!path.exists());
    }

    #[test]
    fn test_keep_preserves_file() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = touch_artifact(dir.path());

        let path = artifact.keep();
        assert!(path.exists());
    }

    #[test]
    fn test_drop_tolerates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = touch_artifact(dir.path());
        std::fs::remove_file(artifact.path()).unwrap();

        drop(artifact);
    }

    #[test]
    fn test_path_naming() {
        let id = Uuid::new_v4();
        let path = Artifact::path_for(Path::new("/tmp"), Language::C, id);
        assert_eq!(path, PathBuf::from(format!("/tmp/c_out_{}", id)));
    }
}
