use std::path::PathBuf;

/// Prefix of every working directory name
pub const DEFAULT_PREFIX: &str = "zipfs-";

/// Settings shared by the backend and the [`ZipFs`](crate::ZipFs) client.
#[derive(Debug, Clone)]
pub struct Config {
    /// Parent of the working directories; the system temp dir when `None`
    pub temp_dir: Option<PathBuf>,
    pub prefix: String,
    /// Close (without saving) any archive still open when the client drops
    pub auto_clean: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            temp_dir: None,
            prefix: DEFAULT_PREFIX.to_string(),
            auto_clean: true,
        }
    }
}

impl Config {
    pub fn temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn auto_clean(mut self, clean: bool) -> Self {
        self.auto_clean = clean;
        self
    }

    /// Directory in which working directories are created
    pub fn working_root(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}
