use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Paths {
    pub base: PathBuf,
}

impl Paths {
    pub fn new() -> Self {
        let base = dirs::home_dir()
            .map(|h| h.join(".webcell"))
            .unwrap_or_else(|| PathBuf::from(".webcell"));
        Self { base }
    }

    pub fn with_base(base: PathBuf) -> Self {
        Self { base }
    }

    pub fn config_file(&self) -> PathBuf {
        self.base.join("config.json")
    }

    pub fn workspace(&self) -> PathBuf {
        self.base.join("workspace")
    }

    /// Per-session browser profiles live here unless `userDataDir` is set.
    pub fn profiles_dir(&self) -> PathBuf {
        self.base.join("profiles")
    }

    pub fn downloads_dir(&self) -> PathBuf {
        self.base.join("downloads")
    }

    /// Uploads resolve against `./uploads` of the process working directory.
    pub fn uploads_dir(&self) -> PathBuf {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join("uploads")
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_under_base() {
        let paths = Paths::with_base(PathBuf::from("/tmp/wc"));
        assert_eq!(paths.config_file(), PathBuf::from("/tmp/wc/config.json"));
        assert_eq!(paths.downloads_dir(), PathBuf::from("/tmp/wc/downloads"));
        assert_eq!(paths.profiles_dir(), PathBuf::from("/tmp/wc/profiles"));
    }

    #[test]
    fn test_uploads_dir_is_relative_to_cwd() {
        let paths = Paths::new();
        assert!(paths.uploads_dir().ends_with("uploads"));
    }
}
