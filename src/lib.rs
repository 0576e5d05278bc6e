pub mod admissions;
pub mod dashboards;
pub mod errors;
pub mod fees;
pub mod logging;
pub mod models;
pub mod profile;
pub mod roles;
pub mod services;
pub mod shell;
pub mod students;

#[cfg(feature = "server")]
pub mod api;
#[cfg(feature = "server")]
pub mod auth;
#[cfg(feature = "server")]
pub mod config;
#[cfg(feature = "server")]
pub mod db;
#[cfg(feature = "server")]
pub mod security;

pub use errors::{ErpError, Notice, ServiceResult};
pub use models::{Identity, Role, RoleProfile};
