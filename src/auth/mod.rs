//! Authentication: OAuth2 orchestration, sessions, extractors
//!
//! - `orchestrator`: drives the authorization-code flow per attempt
//! - `store`: session store over an injected backend
//! - `session`: session records and signed-cookie format
//! - `middleware`: extractors for authenticated handlers
//! - `handlers`: the HTTP surface

pub mod handlers;
pub mod middleware;
pub mod orchestrator;
pub mod session;
pub mod store;

pub use handlers::auth_router;
pub use middleware::{CurrentUser, MaybeUser};
pub use orchestrator::{AuthOrchestrator, CallbackQuery};
pub use session::{SESSION_COOKIE, STATE_COOKIE, Session};
pub use store::{MemoryBackend, SessionBackend, SessionStore};
