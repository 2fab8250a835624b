/// Platform tag resolved once at startup and injected into the coordinator's
/// configuration, so install-path decisions never query the OS inline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Platform {
    /// Updates are downloaded and run as an installer.
    Windows,
    /// Updates are handed to the default browser; installer formats off
    /// Windows are package-manager specific.
    Generic,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Self::Windows
        } else {
            Self::Generic
        }
    }
}
