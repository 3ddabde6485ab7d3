use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, error};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// ストレージ操作のエラー。
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to read key {key}")]
    Read {
        key: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to write key {key}")]
    Write {
        key: String,
        #[source]
        source: io::Error,
    },
}

/// キーで値を読み書きする永続ストレージ。
///
/// 値はJSON文字列で保存される。キーが存在しない場合は`Ok(None)`を返す。
#[cfg_attr(test, mockall::automock)]
pub trait KeyValueStorage {
    /// キーに対応する値を取得する。
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// キーに値を保存する。
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// ディレクトリ内に`<key>.json`のファイルとして保存するストレージ。
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// 新しい`FileStorage`を返す。ディレクトリは最初の書き込み時に作成する。
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl KeyValueStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Read {
                key: key.to_string(),
                source,
            }),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let to_write_error = |source| StorageError::Write {
            key: key.to_string(),
            source,
        };
        fs::create_dir_all(&self.dir).map_err(to_write_error)?;
        fs::write(self.path_for(key), value).map_err(to_write_error)
    }
}

/// テスト用のメモリ上のストレージ。
#[cfg(test)]
#[derive(Default)]
pub struct MemoryStorage {
    values: std::cell::RefCell<std::collections::HashMap<String, String>>,
}

#[cfg(test)]
impl MemoryStorage {
    pub fn with_value(key: &str, value: &str) -> Self {
        let storage = Self::default();
        storage
            .values
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        storage
    }

    pub fn value(&self, key: &str) -> Option<String> {
        self.values.borrow().get(key).cloned()
    }
}

#[cfg(test)]
impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.value(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.values
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// キーに保存されたJSONを読み込む。
///
/// 値が無い、読めない、壊れている場合はいずれも`None`を返し、呼び出し側の既定値に任せる。
/// 読み込みの失敗はログに残すだけでエラーにはしない。
pub fn load_json<S, T>(storage: &S, key: &str) -> Option<T>
where
    S: KeyValueStorage + ?Sized,
    T: DeserializeOwned,
{
    let stored = match storage.get(key) {
        Ok(Some(stored)) => stored,
        Ok(None) => {
            debug!("No stored data for key {}", key);
            return None;
        }
        Err(e) => {
            error!("Error loading {}: {}", key, e);
            return None;
        }
    };

    match serde_json::from_str(&stored) {
        Ok(value) => Some(value),
        Err(e) => {
            error!("Error parsing stored data for {}: {}", key, e);
            None
        }
    }
}

/// 値をJSONにしてキーへ保存する。
///
/// 失敗はログに残すだけで、メモリ上の状態はそのまま残る。
pub fn save_json<S, T>(storage: &S, key: &str, value: &T)
where
    S: KeyValueStorage + ?Sized,
    T: Serialize + ?Sized,
{
    let json = match serde_json::to_string(value) {
        Ok(json) => json,
        Err(e) => {
            error!("Error serializing {}: {}", key, e);
            return;
        }
    };

    if let Err(e) = storage.set(key, &json) {
        error!("Error saving {}: {}", key, e);
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use tempfile::TempDir;

    use super::{
        load_json, save_json, FileStorage, KeyValueStorage, MemoryStorage, MockKeyValueStorage,
        StorageError,
    };

    #[test]
    fn test_file_storage_missing_key() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::new(dir.path());

        assert!(storage.get("affaires-time-entries").unwrap().is_none());
    }

    /// 存在しないディレクトリにも書き込めることを確認する。
    #[test]
    fn test_file_storage_creates_directory() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::new(dir.path().join("nested").join("data"));

        storage.set("affaires-projects", "[]").unwrap();

        assert_eq!(
            storage.get("affaires-projects").unwrap().as_deref(),
            Some("[]")
        );
        assert!(storage.dir().join("affaires-projects.json").exists());
    }

    #[test]
    fn test_load_json_roundtrip() {
        let storage = MemoryStorage::default();

        save_json(&storage, "numbers", &vec![1, 2, 3]);
        let loaded: Option<Vec<i32>> = load_json(&storage, "numbers");

        assert_eq!(loaded, Some(vec![1, 2, 3]));
    }

    /// 壊れたJSONは`None`として扱われることを確認する。
    #[test]
    fn test_load_json_corrupt_data() {
        let storage = MemoryStorage::with_value("numbers", "{not json");

        let loaded: Option<Vec<i32>> = load_json(&storage, "numbers");

        assert_eq!(loaded, None);
    }

    /// 読み込みエラーは`None`として扱われることを確認する。
    #[test]
    fn test_load_json_read_error() {
        let mut storage = MockKeyValueStorage::new();
        storage.expect_get().times(1).returning(|key| {
            Err(StorageError::Read {
                key: key.to_string(),
                source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
            })
        });

        let loaded: Option<Vec<i32>> = load_json(&storage, "numbers");

        assert_eq!(loaded, None);
    }

    /// 書き込みエラーでもパニックせずに戻ることを確認する。
    #[test]
    fn test_save_json_write_error_is_swallowed() {
        let mut storage = MockKeyValueStorage::new();
        storage.expect_set().times(1).returning(|key, _| {
            Err(StorageError::Write {
                key: key.to_string(),
                source: io::Error::new(io::ErrorKind::Other, "quota exceeded"),
            })
        });

        save_json(&storage, "numbers", &vec![1]);
    }
}
