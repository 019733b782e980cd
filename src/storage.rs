use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::debug;
use uuid::Uuid;

/// Local directory holding uploaded PDF files under random names.
#[derive(Debug, Clone)]
pub struct Storage {
    pub directory: PathBuf,
}

impl Storage {
    pub fn new(directory: PathBuf) -> Self {
        Self { directory }
    }

    pub async fn save_pdf(&self, content: &[u8]) -> anyhow::Result<PathBuf> {
        fs::create_dir_all(&self.directory).await?;
        let path = self.directory.join(format!("{}.pdf", Uuid::new_v4()));
        fs::write(&path, content).await?;
        debug!(path = %path.display(), size = content.len(), "Stored uploaded file");
        Ok(path)
    }

    /// Removes a stored file. A file that is already gone is not an error.
    pub async fn remove(&self, path: &Path) -> anyhow::Result<()> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "File already removed");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn test_save_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path().join("nested"));
        let path = storage.save_pdf(b"%PDF-1.4").await.unwrap();
        assert_eq!(path.extension().unwrap(), "pdf");
        assert!(path.starts_with(dir.path().join("nested")));
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"%PDF-1.4");

        storage.remove(&path).await.unwrap();
        assert!(!path.exists());
        // removing twice is fine
        storage.remove(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_saved_files_get_distinct_names() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path().to_path_buf());
        let a = storage.save_pdf(b"a").await.unwrap();
        let b = storage.save_pdf(b"b").await.unwrap();
        assert_ne!(a, b);
    }
}
