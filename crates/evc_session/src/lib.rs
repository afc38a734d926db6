pub mod clock;
pub mod error;
pub mod manager;
pub mod sqlite;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{EngineError, Result};
pub use manager::{normalize_session_id, SessionManager};
pub use sqlite::SqliteStore;
pub use store::{MemoryStore, SessionKey, StateStore};
