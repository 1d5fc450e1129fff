pub mod auth;
pub mod hierarchy;
pub mod institutions;
pub mod resources;
