mod error;
mod paths;
mod schema;
mod store;

pub use error::SessionStoreError;
pub use paths::{
    default_session_name, sanitize_name, session_file_name, store_root_from, SESSIONS_DIR_ENV,
};
pub use schema::{
    Session, SessionSettings, SessionSummary, DEFAULT_MODEL, DEFAULT_TRUNCATE_LINES,
};
pub use store::{Clock, SessionStore};
