use crate::updater::http;
use crate::updater::manifest::{self, VersionDescriptor};
use crate::updater::platform::Platform;
use crate::updater::prompt::PromptSurface;
use crate::updater::shell::Shell;
use log::{debug, info, warn};
use semver::Version;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const DEFAULT_MANIFEST_URL: &str = "https://duploader.tech/desktop/latest.json";

const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(15);
const DEFAULT_EXIT_GRACE: Duration = Duration::from_secs(2);
const FALLBACK_ARTIFACT_NAME: &str = "duploader-setup.exe";

/// Built once at startup; the coordinator never queries its environment
/// behind the caller's back.
pub struct UpdaterConfig {
    pub manifest_url: String,
    pub running_version: String,
    pub platform: Platform,
    pub fetch_timeout: Duration,
    pub exit_grace: Duration,
    pub download_dir: PathBuf,
}

impl UpdaterConfig {
    pub fn new(running_version: &str, platform: Platform) -> Self {
        Self {
            manifest_url: DEFAULT_MANIFEST_URL.to_string(),
            running_version: running_version.to_string(),
            platform,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            exit_grace: DEFAULT_EXIT_GRACE,
            download_dir: std::env::temp_dir().join("duploader-update"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpdateState {
    Idle,
    CheckPending,
    UpdateAvailable(VersionDescriptor),
    Downloading,
    Installing,
    Failed(String),
}

/// Owns the update state for one running shell instance. One explicit
/// instance, constructed at startup; there is no ambient singleton.
pub struct UpdateCoordinator<P: PromptSurface, S: Shell> {
    config: UpdaterConfig,
    state: UpdateState,
    prompt: P,
    shell: S,
    prompt_open: bool,
    /// Descriptor behind the currently open prompt, kept so an accept after a
    /// failed install can retry.
    offered: Option<VersionDescriptor>,
    cancel: Arc<Mutex<bool>>,
}

impl<P: PromptSurface, S: Shell> UpdateCoordinator<P, S> {
    pub fn new(config: UpdaterConfig, prompt: P, shell: S) -> Self {
        Self {
            config,
            state: UpdateState::Idle,
            prompt,
            shell,
            prompt_open: false,
            offered: None,
            cancel: Arc::new(Mutex::new(false)),
        }
    }

    pub fn state(&self) -> &UpdateState {
        &self.state
    }

    pub fn prompt_open(&self) -> bool {
        self.prompt_open
    }

    /// Shared flag a host can flip from another thread to abort an in-flight
    /// download. Aborted downloads discard partial output and never install.
    pub fn cancel_flag(&self) -> Arc<Mutex<bool>> {
        Arc::clone(&self.cancel)
    }

    /// Fetch the manifest and offer an update if the remote version string
    /// differs from the running one. Best-effort: a dead or garbled manifest
    /// logs a warning and leaves the coordinator idle. While a prompt is open
    /// this is a no-op, so repeated checks can never stack prompts.
    pub fn check_for_updates(&mut self) {
        if self.prompt_open {
            debug!("update prompt already open, skipping check");
            return;
        }

        self.state = UpdateState::CheckPending;
        let descriptor = match manifest::fetch_version_descriptor(
            self.config.manifest_url.as_str(),
            self.config.fetch_timeout,
        ) {
            Ok(descriptor) => descriptor,
            Err(e) => {
                warn!("update check failed: {e}");
                self.state = UpdateState::Idle;
                return;
            }
        };

        self.evaluate_descriptor(descriptor);
    }

    fn evaluate_descriptor(&mut self, descriptor: VersionDescriptor) {
        if descriptor.version == self.config.running_version {
            debug!("already on version {}", descriptor.version);
            self.state = UpdateState::Idle;
            return;
        }

        flag_apparent_downgrade(
            descriptor.version.as_str(),
            self.config.running_version.as_str(),
        );

        info!(
            "update available: {} -> {}",
            self.config.running_version, descriptor.version
        );
        // Fresh offer, fresh cancellation flag.
        if let Ok(mut cancel) = self.cancel.lock() {
            *cancel = false;
        }
        self.prompt.open(&descriptor);
        self.prompt_open = true;
        self.offered = Some(descriptor.clone());
        self.state = UpdateState::UpdateAvailable(descriptor);
    }

    /// The user took the offer. On Windows with a dedicated installer URL the
    /// artifact is downloaded and run; everywhere else the download link goes
    /// to the default browser. Also the retry entry point after a failure.
    pub fn on_user_accept(&mut self) {
        let descriptor = match (&self.state, self.offered.clone()) {
            (UpdateState::UpdateAvailable(_) | UpdateState::Failed(_), Some(descriptor)) => {
                descriptor
            }
            _ => {
                debug!("accept outside of an update offer, ignoring");
                return;
            }
        };

        match (self.config.platform, descriptor.win_url.as_deref()) {
            (Platform::Windows, Some(win_url)) => {
                let win_url = win_url.to_string();
                self.download_and_install(win_url.as_str());
            }
            // No Windows installer in this rollout, or not on Windows at all:
            // hand the generic link to the browser instead of guessing at
            // installer formats.
            _ => self.redirect_to_download(descriptor.url.as_str()),
        }
    }

    /// The user dismissed the prompt. No reminder timer exists; the next
    /// check happens on the next launch.
    pub fn on_user_defer(&mut self) {
        if !self.prompt_open {
            debug!("defer with no prompt open, ignoring");
            return;
        }

        if let Ok(mut cancel) = self.cancel.lock() {
            *cancel = true;
        }

        info!("update deferred until next launch");
        self.close_prompt();
        self.state = UpdateState::Idle;
    }

    /// Forward a status line to the prompt surface. Silently does nothing
    /// when no prompt is open.
    pub fn report_status(&self, message: &str) {
        if self.prompt_open {
            self.prompt.status(message);
        }
    }

    fn download_and_install(&mut self, artifact_url: &str) {
        self.state = UpdateState::Downloading;
        self.report_status("Downloading update...");

        if let Err(e) = std::fs::create_dir_all(self.config.download_dir.as_path()) {
            warn!("couldn't create download directory: {e}");
            self.fail(format!("Couldn't save the update: {e}"));
            return;
        }

        let artifact_path = self
            .config
            .download_dir
            .join(artifact_file_name(artifact_url));
        let download_path = artifact_path.with_extension("part");

        if let Err(e) = self.stream_artifact(artifact_url, download_path.as_path()) {
            // Partial output never survives a failed or cancelled transfer.
            let _ = std::fs::remove_file(download_path.as_path());
            if http::is_user_abort(&e) {
                info!("update download cancelled");
                self.close_prompt();
                self.state = UpdateState::Idle;
            } else {
                warn!("artifact download failed: {e}");
                self.fail(format!("Update download failed: {e}"));
            }
            return;
        }

        if let Err(e) = std::fs::rename(download_path.as_path(), artifact_path.as_path()) {
            let _ = std::fs::remove_file(download_path.as_path());
            warn!("couldn't move downloaded artifact into place: {e}");
            self.fail(format!("Couldn't save the update: {e}"));
            return;
        }

        self.state = UpdateState::Installing;
        self.report_status("Starting the installer...");
        if let Err(e) = self.shell.launch_installer(artifact_path.as_path()) {
            let _ = std::fs::remove_file(artifact_path.as_path());
            warn!("installer launch failed: {e}");
            self.fail(format!("Couldn't start the installer: {e}"));
            return;
        }

        info!(
            "installer launched, exiting in {:?}",
            self.config.exit_grace
        );
        self.report_status("Installer started, Duploader will close now.");
        self.shell.schedule_exit(self.config.exit_grace);
        self.close_prompt();
    }

    fn redirect_to_download(&mut self, url: &str) {
        match self.shell.open_external(url) {
            Ok(()) => {
                info!("opened download page {url}");
                self.close_prompt();
                self.state = UpdateState::Idle;
            }
            Err(e) => {
                warn!("failed to open download page: {e}");
                self.fail(format!("Couldn't open the download page: {e}"));
            }
        }
    }

    fn stream_artifact(&self, url: &str, path: &Path) -> anyhow::Result<()> {
        let cancel = Arc::clone(&self.cancel);
        let progress = http::ProgressCallback::new(move |_percent| match cancel.lock() {
            Ok(cancel) => !*cancel,
            _ => true, // keep going
        });

        http::download_file(url, path, &progress)
    }

    /// Failures keep the prompt open so the user can retry or dismiss.
    fn fail(&mut self, reason: String) {
        self.report_status(reason.as_str());
        self.state = UpdateState::Failed(reason);
    }

    fn close_prompt(&mut self) {
        if self.prompt_open {
            self.prompt.close();
            self.prompt_open = false;
        }
        self.offered = None;
    }
}

/// Versions are compared for exact string equality, so a manifest that went
/// backwards still reads as an update. Warn loudly when that happens instead
/// of guessing which side is right.
fn flag_apparent_downgrade(remote: &str, running: &str) {
    if let (Ok(remote), Ok(running)) = (Version::parse(remote), Version::parse(running)) {
        if remote < running {
            warn!(
                "manifest version {remote} is older than running version {running}; \
                 offering it anyway"
            );
        }
    }
}

fn artifact_file_name(url: &str) -> String {
    let name = url.rsplit('/').next().unwrap_or("");
    let name = name.split(['?', '#']).next().unwrap_or("");
    if name.is_empty() {
        FALLBACK_ARTIFACT_NAME.to_string()
    } else {
        name.to_string()
    }
}
