//! Port definitions — traits that adapters implement.
//!
//! Ports are the boundaries between the application core and the outside
//! world. They are defined here (in `app`) so that both the runtime and the
//! adapter layer can depend on them without creating circular dependencies.

pub mod bus;
pub mod engine;
pub mod transport;
pub mod watch;

pub use bus::MessageBus;
pub use engine::{AutomationUnit, LoadedUnit, UnitEngine};
pub use transport::{ChatTransport, NotificationTransport};
pub use watch::ChangeEvent;
