pub mod auth_session;
pub mod profile;
pub mod security_event;
