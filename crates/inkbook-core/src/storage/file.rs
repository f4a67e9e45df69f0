//! File-based storage implementation.

use super::{BoxFuture, PageStorage, StorageError, StorageResult, StoredPage, duplicate_page_index};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const PAGE_PREFIX: &str = "page-";
const META_FILE: &str = "meta.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct DocumentMeta {
    updated_at: Option<u64>,
}

/// File-based page storage.
///
/// Each document gets a directory holding one JSON file per page plus a
/// small metadata file.
pub struct FilePageStorage {
    /// Base directory for document storage.
    base_path: PathBuf,
}

impl FilePageStorage {
    /// Create a new file storage with the given base directory.
    ///
    /// Creates the directory if it doesn't exist.
    pub fn new(base_path: PathBuf) -> StorageResult<Self> {
        if !base_path.exists() {
            fs::create_dir_all(&base_path).map_err(|e| {
                StorageError::Io(format!("Failed to create storage directory: {}", e))
            })?;
        }
        Ok(Self { base_path })
    }

    /// Create file storage in the default location.
    ///
    /// On Unix: `~/.local/share/inkbook/documents/`
    /// On Windows: `%LOCALAPPDATA%\inkbook\documents\`
    pub fn default_location() -> StorageResult<Self> {
        let base = dirs::data_local_dir()
            .or_else(dirs::home_dir)
            .ok_or_else(|| StorageError::Io("Could not determine home directory".to_string()))?;

        Self::new(base.join("inkbook").join("documents"))
    }

    /// Get the base path.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Directory for a document ID.
    ///
    /// ASCII letters, digits and `-` are kept; every other byte becomes
    /// `_XX` (uppercase hex), so distinct IDs never share a directory. The
    /// empty ID maps to `_`.
    fn document_dir(&self, id: &str) -> PathBuf {
        self.base_path.join(encode_document_id(id))
    }

    fn page_files(dir: &Path) -> StorageResult<Vec<PathBuf>> {
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(dir)
            .map_err(|e| StorageError::Io(format!("Failed to read {}: {}", dir.display(), e)))?;
        Ok(entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension().is_some_and(|e| e == "json")
                    && path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| n.starts_with(PAGE_PREFIX))
            })
            .collect())
    }

    fn read_meta(dir: &Path) -> StorageResult<DocumentMeta> {
        let path = dir.join(META_FILE);
        if !path.exists() {
            return Ok(DocumentMeta::default());
        }
        let json = fs::read_to_string(&path)
            .map_err(|e| StorageError::Io(format!("Failed to read {}: {}", path.display(), e)))?;
        serde_json::from_str(&json).map_err(|e| {
            StorageError::Serialization(format!("Failed to parse {}: {}", path.display(), e))
        })
    }
}

fn encode_document_id(id: &str) -> String {
    if id.is_empty() {
        return "_".to_string();
    }
    let mut out = String::with_capacity(id.len());
    for byte in id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("_{:02X}", byte));
        }
    }
    out
}

impl PageStorage for FilePageStorage {
    fn load_pages(&self, document_id: &str) -> BoxFuture<'_, StorageResult<Vec<StoredPage>>> {
        let dir = self.document_dir(document_id);

        Box::pin(async move {
            let mut pages = Vec::new();
            for path in Self::page_files(&dir)? {
                let json = fs::read_to_string(&path).map_err(|e| {
                    StorageError::Io(format!("Failed to read {}: {}", path.display(), e))
                })?;
                let page: StoredPage = serde_json::from_str(&json).map_err(|e| {
                    StorageError::Serialization(format!(
                        "Failed to parse {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                pages.push(page);
            }
            pages.sort_by_key(|p| p.page_index);
            Ok(pages)
        })
    }

    fn delete_pages(&self, document_id: &str) -> BoxFuture<'_, StorageResult<()>> {
        let dir = self.document_dir(document_id);

        Box::pin(async move {
            for path in Self::page_files(&dir)? {
                fs::remove_file(&path).map_err(|e| {
                    StorageError::Io(format!("Failed to delete {}: {}", path.display(), e))
                })?;
            }
            Ok(())
        })
    }

    fn insert_pages(
        &self,
        document_id: &str,
        pages: Vec<StoredPage>,
    ) -> BoxFuture<'_, StorageResult<()>> {
        let dir = self.document_dir(document_id);

        Box::pin(async move {
            if let Some(index) = duplicate_page_index(&pages) {
                return Err(StorageError::DuplicatePage(index));
            }
            fs::create_dir_all(&dir).map_err(|e| {
                StorageError::Io(format!("Failed to create {}: {}", dir.display(), e))
            })?;
            for page in &pages {
                let path = dir.join(format!("{}{:04}.json", PAGE_PREFIX, page.page_index));
                let json = serde_json::to_string(page)?;
                fs::write(&path, json).map_err(|e| {
                    StorageError::Io(format!("Failed to write {}: {}", path.display(), e))
                })?;
            }
            Ok(())
        })
    }

    fn touch_document(
        &self,
        document_id: &str,
        modified_ms: u64,
    ) -> BoxFuture<'_, StorageResult<()>> {
        let dir = self.document_dir(document_id);

        Box::pin(async move {
            fs::create_dir_all(&dir).map_err(|e| {
                StorageError::Io(format!("Failed to create {}: {}", dir.display(), e))
            })?;
            let meta = DocumentMeta {
                updated_at: Some(modified_ms),
            };
            let path = dir.join(META_FILE);
            fs::write(&path, serde_json::to_string(&meta)?).map_err(|e| {
                StorageError::Io(format!("Failed to write {}: {}", path.display(), e))
            })
        })
    }

    fn last_modified(&self, document_id: &str) -> BoxFuture<'_, StorageResult<Option<u64>>> {
        let dir = self.document_dir(document_id);
        Box::pin(async move { Ok(Self::read_meta(&dir)?.updated_at) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn page(index: usize, marker: &str) -> StoredPage {
        StoredPage {
            page_index: index,
            data: json!({ "objects": [{ "type": "textbox", "text": marker }] }),
        }
    }

    #[tokio::test]
    async fn test_insert_and_load() {
        let dir = tempdir().unwrap();
        let storage = FilePageStorage::new(dir.path().to_path_buf()).unwrap();

        storage
            .insert_pages("doc/1", vec![page(1, "b"), page(0, "a")])
            .await
            .unwrap();
        let loaded = storage.load_pages("doc/1").await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0], page(0, "a"));
        assert_eq!(loaded[1].data["objects"][0]["text"], "b");
        assert!(dir.path().join("doc_2F1").join("page-0000.json").exists());
    }

    #[tokio::test]
    async fn test_delete_keeps_meta() {
        let dir = tempdir().unwrap();
        let storage = FilePageStorage::new(dir.path().to_path_buf()).unwrap();

        storage.insert_pages("doc", vec![page(0, "a")]).await.unwrap();
        storage.touch_document("doc", 1234).await.unwrap();
        storage.delete_pages("doc").await.unwrap();

        assert!(storage.load_pages("doc").await.unwrap().is_empty());
        assert_eq!(storage.last_modified("doc").await.unwrap(), Some(1234));
    }

    #[tokio::test]
    async fn test_missing_document() {
        let dir = tempdir().unwrap();
        let storage = FilePageStorage::new(dir.path().join("nested")).unwrap();
        assert!(storage.base_path().exists());
        assert!(storage.load_pages("ghost").await.unwrap().is_empty());
        assert!(storage.delete_pages("ghost").await.is_ok());
        assert_eq!(storage.last_modified("ghost").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_corrupt_page_is_an_error() {
        let dir = tempdir().unwrap();
        let storage = FilePageStorage::new(dir.path().to_path_buf()).unwrap();
        let doc_dir = dir.path().join("doc");
        fs::create_dir_all(&doc_dir).unwrap();
        fs::write(doc_dir.join("page-0000.json"), "{not json").unwrap();

        let err = storage.load_pages("doc").await.unwrap_err();
        assert!(matches!(err, StorageError::Serialization(_)));
    }

    #[test]
    fn test_document_id_encoding() {
        assert_eq!(encode_document_id("abc-123"), "abc-123");
        assert_eq!(encode_document_id("team/notes"), "team_2Fnotes");
        assert_eq!(encode_document_id("team_notes"), "team_5Fnotes");
        assert_eq!(encode_document_id(".."), "_2E_2E");
        assert_eq!(encode_document_id("é"), "_C3_A9");
        assert_eq!(encode_document_id(""), "_");
    }

    #[tokio::test]
    async fn test_similar_ids_stay_separate() {
        let dir = tempdir().unwrap();
        let storage = FilePageStorage::new(dir.path().to_path_buf()).unwrap();

        storage
            .insert_pages("team/notes", vec![page(0, "a")])
            .await
            .unwrap();
        assert!(storage.load_pages("team_notes").await.unwrap().is_empty());
        assert!(storage.load_pages("team notes").await.unwrap().is_empty());

        storage
            .insert_pages("team_notes", vec![page(0, "b")])
            .await
            .unwrap();
        storage.delete_pages("team_notes").await.unwrap();
        let kept = storage.load_pages("team/notes").await.unwrap();
        assert_eq!(kept, vec![page(0, "a")]);
    }

    #[tokio::test]
    async fn test_duplicate_index_rejected() {
        let dir = tempdir().unwrap();
        let storage = FilePageStorage::new(dir.path().to_path_buf()).unwrap();

        let err = storage
            .insert_pages("doc", vec![page(0, "a"), page(0, "b")])
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::DuplicatePage(0)));
        assert!(storage.load_pages("doc").await.unwrap().is_empty());
    }
}
