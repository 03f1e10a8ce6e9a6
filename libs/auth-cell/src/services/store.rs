use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::debug;

use shared_config::AppConfig;

/// Persisted bearer-token slot shared by every view of one user.
pub trait TokenStore: Send + Sync {
    fn load(&self) -> io::Result<Option<String>>;
    fn save(&self, token: &str) -> io::Result<()>;
    fn clear(&self) -> io::Result<()>;
}

pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.token_path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> io::Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => {
                let token = contents.trim();
                Ok((!token.is_empty()).then(|| token.to_string()))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn save(&self, token: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, token.trim())?;
        debug!("Persisted token to {}", self.path.display());
        Ok(())
    }

    fn clear(&self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!("Removed token at {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[derive(Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: &str) -> Self {
        Self {
            token: Mutex::new(Some(token.to_string())),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> io::Result<Option<String>> {
        let guard = self.token.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(guard.clone())
    }

    fn save(&self, token: &str) -> io::Result<()> {
        let mut guard = self.token.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> io::Result<()> {
        let mut guard = self.token.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = None;
        Ok(())
    }
}
