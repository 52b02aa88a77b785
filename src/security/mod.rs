pub mod audit_log;
pub mod credential;
pub mod token_cache;
pub mod token_client;
pub mod token_manager;
pub mod token_store;
