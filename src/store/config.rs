//! Store configuration.

use std::path::PathBuf;

/// File name of the SQLite database inside the data directory.
pub const DB_FILE_NAME: &str = "gallery.db";

/// Configuration for the entry store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Directory holding the database (and the upload signing key).
    pub data_dir: PathBuf,
}

impl StoreConfig {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    /// Full path of the database file.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(DB_FILE_NAME)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new(default_data_dir())
    }
}

/// Platform data directory, falling back to `./.zarvault`.
pub fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("com", "zarvault", "zarvault")
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".zarvault"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_path_is_inside_data_dir() {
        let config = StoreConfig::new(PathBuf::from("/tmp/zv"));
        assert_eq!(config.db_path(), PathBuf::from("/tmp/zv/gallery.db"));
    }
}
