//! Host boundary: responsibility and boundaries
//!
//! This module and its submodules ONLY deliver raw key transitions and
//! foreground-window changes to registered handlers, answer live modifier
//! queries and forward focus requests to the OS. Chord recognition and
//! accept/revert decisions live in the services that consume them.

mod dry_run_host;
mod r#trait;
#[cfg(windows)]
mod windows_host;

pub use self::dry_run_host::DryRunHost;
pub use self::r#trait::{create_host, ForegroundHandler, Host, HookId, KeyboardHandler};
