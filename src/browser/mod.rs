//! Browser session management
//!
//! One browser process, one context, short-lived pages.

pub mod events;
pub mod page_helpers;
pub mod session;
pub mod wrapper;

pub use events::{LoggingObserver, PageEvent, PageObserver};
pub use session::{BrowserSessionManager, ManagedPage};
pub use wrapper::BrowserWrapper;
