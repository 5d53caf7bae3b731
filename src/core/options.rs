//! Options resolved once per update operation
//!
//! The version, platform and installation layout come from injected providers
//! rather than ambient statics, so tests and hosts can substitute their own.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use semver::Version;
use serde::{Deserialize, Serialize};

use super::utils::current_platform_id;

/// Provider for the running application's version
pub type VersionProvider = Arc<dyn Fn() -> Version + Send + Sync>;

/// Provider for the platform identifier (e.g. "linux-x64")
pub type PlatformProvider = Arc<dyn Fn() -> String + Send + Sync>;

/// Provider for a filesystem location that may not be resolvable
pub type PathProvider = Arc<dyn Fn() -> std::io::Result<PathBuf> + Send + Sync>;

/// Helper executable file name per operating system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelperExecutable {
    pub windows: String,
    pub unix: String,
}

impl HelperExecutable {
    /// File name for the OS this process is running on
    pub fn for_current_os(&self) -> &str {
        if cfg!(windows) {
            &self.windows
        } else {
            &self.unix
        }
    }
}

impl Default for HelperExecutable {
    fn default() -> Self {
        Self {
            windows: "updater.exe".to_string(),
            unix: "updater".to_string(),
        }
    }
}

/// Configuration for a check/apply operation
#[derive(Clone)]
pub struct UpdateOptions {
    /// Helper directory, relative to the application root
    pub helper_relative_dir: PathBuf,
    /// Helper executable name per OS
    pub helper_executable: HelperExecutable,
    /// Current application version
    pub current_version: VersionProvider,
    /// Platform identifier used to pick artifacts
    pub platform_id: PlatformProvider,
    /// Root directory of the installation that gets replaced
    pub app_dir: PathProvider,
    /// Executable restarted once the swap is done
    pub entry_executable: PathProvider,
    /// Where downloads and the staged helper live
    pub temp_root: PathBuf,
    /// HTTP request timeout
    pub http_timeout: Duration,
    /// User agent sent with every request
    pub user_agent: String,
}

impl Default for UpdateOptions {
    fn default() -> Self {
        Self {
            helper_relative_dir: PathBuf::from("updater"),
            helper_executable: HelperExecutable::default(),
            current_version: Arc::new(|| {
                Version::parse(env!("CARGO_PKG_VERSION")).unwrap_or_else(|_| Version::new(0, 0, 0))
            }),
            platform_id: Arc::new(|| current_platform_id().to_string()),
            app_dir: Arc::new(|| {
                let exe = std::env::current_exe()?;
                exe.parent().map(|p| p.to_path_buf()).ok_or_else(|| {
                    std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        "current executable has no parent directory",
                    )
                })
            }),
            entry_executable: Arc::new(std::env::current_exe),
            temp_root: std::env::temp_dir(),
            http_timeout: Duration::from_secs(60),
            user_agent: format!("app-update/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl UpdateOptions {
    /// Create options with the default providers
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a fixed current version
    pub fn with_current_version(mut self, version: Version) -> Self {
        self.current_version = Arc::new(move || version.clone());
        self
    }

    /// Use a fixed platform identifier
    pub fn with_platform_id(mut self, platform_id: impl Into<String>) -> Self {
        let platform_id = platform_id.into();
        self.platform_id = Arc::new(move || platform_id.clone());
        self
    }

    /// Use a fixed application root
    pub fn with_app_dir(mut self, app_dir: PathBuf) -> Self {
        self.app_dir = Arc::new(move || Ok(app_dir.clone()));
        self
    }

    /// Use a fixed entry executable
    pub fn with_entry_executable(mut self, entry: PathBuf) -> Self {
        self.entry_executable = Arc::new(move || Ok(entry.clone()));
        self
    }

    /// Set the temporary root for downloads and helper staging
    pub fn with_temp_root(mut self, temp_root: PathBuf) -> Self {
        self.temp_root = temp_root;
        self
    }

    /// Set the helper location inside the installation
    pub fn with_helper(mut self, relative_dir: PathBuf, executable: HelperExecutable) -> Self {
        self.helper_relative_dir = relative_dir;
        self.helper_executable = executable;
        self
    }

    /// Build the HTTP client every source and the stager share
    pub fn http_client(&self) -> reqwest::Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.http_timeout)
            .user_agent(self.user_agent.clone())
            .build()
    }
}

impl std::fmt::Debug for UpdateOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateOptions")
            .field("helper_relative_dir", &self.helper_relative_dir)
            .field("helper_executable", &self.helper_executable)
            .field("current_version", &(self.current_version)())
            .field("platform_id", &(self.platform_id)())
            .field("temp_root", &self.temp_root)
            .field("http_timeout", &self.http_timeout)
            .field("user_agent", &self.user_agent)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = UpdateOptions::default();
        assert_eq!(options.helper_relative_dir, PathBuf::from("updater"));
        assert_eq!(
            (options.current_version)(),
            Version::parse(env!("CARGO_PKG_VERSION")).unwrap()
        );
        assert_eq!((options.platform_id)(), current_platform_id());
        assert!((options.entry_executable)().unwrap().exists());
        assert!((options.app_dir)().unwrap().is_dir());
    }

    #[test]
    fn test_injected_providers() {
        let options = UpdateOptions::new()
            .with_current_version(Version::new(1, 2, 3))
            .with_platform_id("linux-x64")
            .with_app_dir(PathBuf::from("/opt/app"))
            .with_entry_executable(PathBuf::from("/opt/app/app"));

        assert_eq!((options.current_version)(), Version::new(1, 2, 3));
        assert_eq!((options.platform_id)(), "linux-x64");
        assert_eq!((options.app_dir)().unwrap(), PathBuf::from("/opt/app"));
        assert_eq!(
            (options.entry_executable)().unwrap(),
            PathBuf::from("/opt/app/app")
        );
    }

    #[test]
    fn test_helper_executable_per_os() {
        let helper = HelperExecutable::default();
        if cfg!(windows) {
            assert_eq!(helper.for_current_os(), "updater.exe");
        } else {
            assert_eq!(helper.for_current_os(), "updater");
        }
    }
}
