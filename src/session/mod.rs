//! Persistent agent sessions.
//!
//! Remembers which sandbox each named agent is bound to and decides, per
//! request, whether that sandbox can be reused:
//! - `record`: the persisted agent-to-sandbox binding
//! - `store`: durable storage for records (`memory` backs the tests)
//! - `lifecycle`: the create-or-reuse state machine
//! - `handle`: the live session returned to callers

mod error;
mod handle;
mod lifecycle;
mod locks;
#[cfg(test)]
mod memory;
mod record;
mod store;

pub(crate) use handle::Session;
pub(crate) use lifecycle::SessionManager;
pub(crate) use record::{validate_agent_name, SessionRecord};
pub(crate) use store::{FileSessionStore, SessionStore};
