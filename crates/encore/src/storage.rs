use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use thiserror::Error;

/// Built files keyed by URL path, e.g. `/css/styles.css`.
pub type SiteContent = Arc<RwLock<HashMap<String, Vec<u8>>>>;

/// A destination for build output. Paths are relative to the output root.
pub trait Store {
    type Error: std::error::Error;

    fn store_html(&self, path: &Path, html: String) -> Result<(), Self::Error>;

    fn store_css(&self, path: &Path, css: String) -> Result<(), Self::Error>;

    fn store_asset(&self, path: &Path, bytes: Vec<u8>) -> Result<(), Self::Error>;

    /// Removes a stored file. Removing a file that isn't there is a no-op.
    fn remove(&self, path: &Path) -> Result<(), Self::Error>;

    /// Removes every file stored under the directory `path`.
    fn remove_dir(&self, path: &Path) -> Result<(), Self::Error>;
}

pub struct DiskStorage {
    output_path: PathBuf,
}

impl DiskStorage {
    pub fn new(output_path: PathBuf) -> Self {
        Self { output_path }
    }

    fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        let output_path = self.output_path.join(path);

        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut output_file = File::create(&output_path)?;
        output_file.write_all(bytes)?;

        Ok(())
    }
}

fn ignore_not_found(result: io::Result<()>) -> io::Result<()> {
    match result {
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        result => result,
    }
}

impl Store for DiskStorage {
    type Error = io::Error;

    fn store_html(&self, path: &Path, html: String) -> Result<(), Self::Error> {
        self.write(path, html.as_bytes())
    }

    fn store_css(&self, path: &Path, css: String) -> Result<(), Self::Error> {
        self.write(path, css.as_bytes())
    }

    fn store_asset(&self, path: &Path, bytes: Vec<u8>) -> Result<(), Self::Error> {
        self.write(path, &bytes)
    }

    fn remove(&self, path: &Path) -> Result<(), Self::Error> {
        ignore_not_found(fs::remove_file(self.output_path.join(path)))
    }

    fn remove_dir(&self, path: &Path) -> Result<(), Self::Error> {
        ignore_not_found(fs::remove_dir_all(self.output_path.join(path)))
    }
}

#[derive(Clone, Default)]
pub struct InMemoryStorage {
    storage: SiteContent,
}

impl InMemoryStorage {
    pub fn new(storage: SiteContent) -> Self {
        Self { storage }
    }

    pub fn content(&self) -> SiteContent {
        self.storage.clone()
    }

    pub fn get(&self, url_path: &str) -> Option<Vec<u8>> {
        self.storage.read().ok()?.get(url_path).cloned()
    }

    fn insert(&self, path: &Path, bytes: Vec<u8>) -> Result<(), InMemoryStorageError> {
        self.storage
            .write()
            .map_err(|_| InMemoryStorageError::Poisoned)?
            .insert(url_path(path), bytes);

        Ok(())
    }
}

#[derive(Error, Debug)]
pub enum InMemoryStorageError {
    #[error("poisoned")]
    Poisoned,
}

impl Store for InMemoryStorage {
    type Error = InMemoryStorageError;

    fn store_html(&self, path: &Path, html: String) -> Result<(), Self::Error> {
        self.insert(path, html.into_bytes())
    }

    fn store_css(&self, path: &Path, css: String) -> Result<(), Self::Error> {
        self.insert(path, css.into_bytes())
    }

    fn store_asset(&self, path: &Path, bytes: Vec<u8>) -> Result<(), Self::Error> {
        self.insert(path, bytes)
    }

    fn remove(&self, path: &Path) -> Result<(), Self::Error> {
        self.storage
            .write()
            .map_err(|_| InMemoryStorageError::Poisoned)?
            .remove(&url_path(path));

        Ok(())
    }

    fn remove_dir(&self, path: &Path) -> Result<(), Self::Error> {
        let prefix = format!("{}/", url_path(path));

        self.storage
            .write()
            .map_err(|_| InMemoryStorageError::Poisoned)?
            .retain(|url_path, _| !url_path.starts_with(&prefix));

        Ok(())
    }
}

/// Converts an output-relative file path into the URL path it is served at.
pub fn url_path(path: &Path) -> String {
    let segments = path
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>();

    format!("/{}", segments.join("/"))
}
