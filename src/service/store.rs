//! Client-local persistence of the known server list.
//!
//! The address list lives outside the backend, in a small JSON file holding
//! an ordered sequence of address strings under a single key. It is read
//! once at startup and rewritten on every add or remove.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const STORE_KEY: &str = "proxy_servers";

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    #[serde(rename = "proxy_servers", default)]
    addresses: Vec<String>,
}

/// File-backed ordered list of registered server addresses.
#[derive(Debug)]
pub struct AddressBook {
    path: PathBuf,
}

impl AddressBook {
    /// Create a store over the given file path. The file is not touched
    /// until the first load or save.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Returns the backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored address list. A missing file reads as an empty list;
    /// a corrupt file is an error, not silently discarded data.
    pub fn load(&self) -> Result<Vec<String>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("reading {}", self.path.display()))?;
        let store: StoreFile = serde_json::from_str(&content)
            .with_context(|| format!("parsing {} key from {}", STORE_KEY, self.path.display()))?;
        Ok(store.addresses)
    }

    /// Write the full address list, preserving order.
    pub fn save(&self, addresses: &[String]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
        }
        let store = StoreFile {
            addresses: addresses.to_vec(),
        };
        let json = serde_json::to_string_pretty(&store)?;
        fs::write(&self.path, json)
            .with_context(|| format!("writing {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_reads_as_empty() {
        let dir = tempdir().unwrap();
        let book = AddressBook::new(dir.path().join("servers.json"));
        assert!(book.load().unwrap().is_empty());
    }

    #[test]
    fn save_then_load_preserves_order() {
        let dir = tempdir().unwrap();
        let book = AddressBook::new(dir.path().join("servers.json"));

        let addresses = vec![
            "10.0.0.2".to_string(),
            "10.0.0.1".to_string(),
            "proxy.example".to_string(),
        ];
        book.save(&addresses).unwrap();
        assert_eq!(book.load().unwrap(), addresses);
    }

    #[test]
    fn list_is_stored_under_the_single_key() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("servers.json");
        let book = AddressBook::new(&path);
        book.save(&["10.0.0.1".to_string()]).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(raw.get("proxy_servers").is_some());
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("servers.json");
        std::fs::write(&path, "not json").unwrap();

        let book = AddressBook::new(&path);
        assert!(book.load().is_err());
    }

    #[test]
    fn creates_parent_directories() {
        let dir = tempdir().unwrap();
        let book = AddressBook::new(dir.path().join("nested/state/servers.json"));
        book.save(&["10.0.0.1".to_string()]).unwrap();
        assert_eq!(book.load().unwrap().len(), 1);
    }
}
