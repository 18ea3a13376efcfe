pub mod chart;
pub mod config;
pub mod prompt;
pub mod selection;
pub mod semantic_model;
pub mod session;

pub use session::{Session, SessionError, SharedSession};
