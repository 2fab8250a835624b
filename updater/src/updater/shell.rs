use std::error::Error;
use std::fmt::{Debug, Display, Formatter, Result as FmtResult};
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;

/// Everything that leaves the process: installer launch, browser handoff and
/// the post-install exit. A seam so the coordinator can be driven in tests
/// without spawning real processes.
pub trait Shell {
    fn launch_installer(&self, path: &Path) -> anyhow::Result<()>;

    fn open_external(&self, url: &str) -> anyhow::Result<()>;

    /// Terminate the current process after `grace`, leaving the installer
    /// time to take over.
    fn schedule_exit(&self, grace: Duration);
}

pub struct SystemShell;

impl Shell for SystemShell {
    fn launch_installer(&self, path: &Path) -> anyhow::Result<()> {
        Command::new(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map(|_| ())
            .map_err(|e| LaunchError::new(path, &e).into())
    }

    fn open_external(&self, url: &str) -> anyhow::Result<()> {
        let parsed = parse_openable_url(url)?;
        open_with_system_browser(parsed.as_str())
    }

    fn schedule_exit(&self, grace: Duration) {
        std::thread::spawn(move || {
            std::thread::sleep(grace);
            std::process::exit(0);
        });
    }
}

fn parse_openable_url(raw_url: &str) -> Result<url::Url, OpenError> {
    let trimmed = raw_url.trim();
    if trimmed.is_empty() {
        return Err(OpenError::Empty);
    }

    let parsed = url::Url::parse(trimmed).map_err(|_| OpenError::Invalid)?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        _ => Err(OpenError::UnsupportedScheme),
    }
}

#[cfg(target_os = "macos")]
fn open_with_system_browser(url: &str) -> anyhow::Result<()> {
    spawn_detached(Command::new("open").arg(url))
}

#[cfg(target_os = "windows")]
fn open_with_system_browser(url: &str) -> anyhow::Result<()> {
    spawn_detached(Command::new("rundll32").args(["url.dll,FileProtocolHandler", url]))
}

#[cfg(all(unix, not(target_os = "macos")))]
fn open_with_system_browser(url: &str) -> anyhow::Result<()> {
    spawn_detached(Command::new("xdg-open").arg(url))
}

#[cfg(not(any(target_os = "windows", unix)))]
fn open_with_system_browser(_url: &str) -> anyhow::Result<()> {
    Err(OpenError::NoHandler.into())
}

#[cfg(any(target_os = "windows", unix))]
fn spawn_detached(command: &mut Command) -> anyhow::Result<()> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map(|_| ())
        .map_err(|e| LaunchError::new(Path::new(command.get_program()), &e).into())
}

pub struct LaunchError {
    message: String,
}

impl LaunchError {
    fn new(program: &Path, err: &std::io::Error) -> Self {
        Self {
            message: format!("Failed to start {}: {err}", program.display()),
        }
    }
}

impl Display for LaunchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.message)
    }
}

impl Debug for LaunchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.message)
    }
}

impl Error for LaunchError {}

pub enum OpenError {
    Empty,
    Invalid,
    UnsupportedScheme,
    #[allow(dead_code)]
    NoHandler,
}

impl OpenError {
    fn message(&self) -> &str {
        match self {
            Self::Empty => "Missing external URL",
            Self::Invalid => "External URL could not be parsed",
            Self::UnsupportedScheme => "Only http and https URLs can be opened",
            Self::NoHandler => "Opening external URLs is not supported on this platform",
        }
    }
}

impl Display for OpenError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.message())
    }
}

impl Debug for OpenError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.message())
    }
}

impl Error for OpenError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_https_urls() {
        let parsed = parse_openable_url("https://example.com/download").unwrap();
        assert_eq!(parsed.as_str(), "https://example.com/download");
    }

    #[test]
    fn trims_surrounding_whitespace() {
        let parsed = parse_openable_url("  http://example.com/  ").unwrap();
        assert_eq!(parsed.scheme(), "http");
    }

    #[test]
    fn rejects_empty_urls() {
        assert!(matches!(parse_openable_url("   "), Err(OpenError::Empty)));
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            parse_openable_url("not a url"),
            Err(OpenError::Invalid)
        ));
    }

    #[test]
    fn rejects_non_web_schemes() {
        assert!(matches!(
            parse_openable_url("file:///etc/passwd"),
            Err(OpenError::UnsupportedScheme)
        ));
    }
}
