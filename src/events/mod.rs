pub mod keyboard;
pub mod window;

pub use keyboard::{Key, KeyDirection, KeyTransition, ModifierSet};
pub use window::{FocusDecision, WindowHandle};
