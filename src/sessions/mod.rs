//! Session management — conversation threads, expiry, and context windows.

pub mod context;
pub mod expiry;
pub mod in_memory;
pub mod service;
pub mod stats;
pub mod traits;

pub use context::{ContextBuilder, ContextLimits, ContextWindow};
pub use expiry::ExpirationPolicy;
pub use in_memory::InMemorySessionStore;
pub use service::{AppendOutcome, SessionService};
pub use stats::SessionStats;
pub use traits::{Message, Role, Session, SessionError, SessionStore, SweepReport};

/// Create a default in-memory session store.
pub fn create_session_store(policy: ExpirationPolicy) -> Box<dyn SessionStore> {
    Box::new(InMemorySessionStore::new(policy))
}
