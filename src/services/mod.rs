pub mod chord_matcher;
pub mod focus_guard;
pub mod focus_lock;
pub mod foreground_monitor;
pub mod host;
pub mod key_tap;

pub use chord_matcher::{ChordMatcher, ChordSpec};
pub use focus_guard::FocusGuard;
pub use focus_lock::FocusLock;
pub use foreground_monitor::ForegroundMonitor;
pub use host::create_host;
pub use key_tap::KeyTap;
