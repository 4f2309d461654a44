//! Reactive building blocks shared by the Mailview crates.
//!
//! - [`Signal`]: synchronous callbacks fired on change
//! - [`Property`]: a locked value whose writes report whether anything changed
//! - [`ThreadAffinity`]: debug-build checks that an object stays on its owner thread
//! - [`logging`]: `tracing` targets and [`PerfSpan`]
//!
//! ```
//! use mailview_core::{Property, Signal};
//!
//! let folder = Property::new("inbox".to_string());
//! let folder_changed = Signal::<String>::new();
//! folder_changed.connect(|name| println!("now showing {name}"));
//!
//! if folder.set("archive".to_string()) {
//!     folder_changed.emit(folder.get());
//! }
//! ```

pub mod logging;
pub mod property;
pub mod signal;
pub mod thread_check;

pub use logging::PerfSpan;
pub use property::Property;
pub use signal::{ConnectionId, Signal};
pub use thread_check::ThreadAffinity;
