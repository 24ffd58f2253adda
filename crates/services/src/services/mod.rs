pub mod admin_guard;
pub mod admin_validation;
pub mod config;
pub mod redirect;
pub mod role_cache;
pub mod role_check;
pub mod security_audit;
pub mod session;
