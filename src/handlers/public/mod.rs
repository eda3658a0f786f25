// handlers/public/mod.rs - token acquisition, no authentication

pub mod auth;

pub use auth::{login as auth_login, register as auth_register};
