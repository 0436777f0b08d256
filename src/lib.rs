pub mod api;
pub mod chat;
pub mod config;
pub mod error;
pub mod gate;
pub mod models;
pub mod notify;
pub mod realtime;
pub mod session;

pub use config::Config;
pub use error::ClientError;
pub use session::{AuthSession, SessionHandle};
