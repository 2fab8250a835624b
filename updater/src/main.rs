//! Terminal port of the Duploader shell's update flow: one check on launch,
//! one prompt, then exit. The desktop shell's modal window plays the part of
//! `TerminalPrompt` there.

use log::warn;
use std::io::Write;
use updater::updater::coordinator::{
    UpdateCoordinator, UpdateState, UpdaterConfig, DEFAULT_MANIFEST_URL,
};
use updater::updater::manifest::VersionDescriptor;
use updater::updater::platform::Platform;
use updater::updater::prompt::{command_channel, CommandSender, PromptCommand, PromptSurface};
use updater::updater::shell::SystemShell;

const RUNNING_VERSION: &str = env!("CARGO_PKG_VERSION");

struct TerminalPrompt {
    commands: CommandSender,
}

impl PromptSurface for TerminalPrompt {
    fn open(&self, descriptor: &VersionDescriptor) {
        println!(
            "A new Duploader version is available: {} (you have {RUNNING_VERSION})",
            descriptor.version
        );
        print!("Install it now? [y/N] ");
        let _ = std::io::stdout().flush();

        let mut answer = String::new();
        let command = match std::io::stdin().read_line(&mut answer) {
            Ok(_) if answer.trim().eq_ignore_ascii_case("y") => PromptCommand::Accept,
            _ => PromptCommand::Defer,
        };
        let _ = self.commands.send(command);
    }

    fn status(&self, message: &str) {
        println!("{message}");
    }

    fn close(&self) {}
}

fn main() {
    env_logger::init();

    // Staging builds point at a different channel through the environment.
    let manifest_url = std::env::var("DUPLOADER_MANIFEST_URL")
        .unwrap_or_else(|_| DEFAULT_MANIFEST_URL.to_string());

    let mut config = UpdaterConfig::new(RUNNING_VERSION, Platform::current());
    config.manifest_url = manifest_url;

    let (commands, replies) = command_channel();
    let prompt = TerminalPrompt { commands };
    let mut coordinator = UpdateCoordinator::new(config, prompt, SystemShell);

    coordinator.check_for_updates();

    // The prompt queues at most one command per open; drain and dispatch.
    while let Ok(command) = replies.try_recv() {
        match command {
            PromptCommand::Accept => coordinator.on_user_accept(),
            PromptCommand::Defer => coordinator.on_user_defer(),
        }
    }

    if let UpdateState::Failed(reason) = coordinator.state() {
        warn!("update did not complete: {reason}");
    }
}
