pub mod coordinator;
pub mod http;
pub mod manifest;
pub mod platform;
pub mod prompt;
pub mod shell;
