//! Update-check / update-apply flow for the Duploader desktop shell.

pub mod updater;
