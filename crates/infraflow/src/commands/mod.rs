pub mod auth;
pub mod provision;
pub mod status;
