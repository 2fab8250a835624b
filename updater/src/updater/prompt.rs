use crate::updater::manifest::VersionDescriptor;
use std::sync::mpsc;

/// Inbound actions from the prompt surface. These are the two messages the
/// shell's renderer used to send over IPC ("update now" / "maybe later").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PromptCommand {
    Accept,
    Defer,
}

pub type CommandSender = mpsc::Sender<PromptCommand>;
pub type CommandReceiver = mpsc::Receiver<PromptCommand>;

pub fn command_channel() -> (CommandSender, CommandReceiver) {
    mpsc::channel()
}

/// The modal boundary between the coordinator and whatever fronts it: a
/// window, a terminal prompt, or a test double. The coordinator guarantees at
/// most one prompt is open at a time; implementations need not.
pub trait PromptSurface {
    /// Present the update offer to the user.
    fn open(&self, descriptor: &VersionDescriptor);

    /// Outbound human-readable status line for an open prompt.
    fn status(&self, message: &str);

    fn close(&self);
}
