pub mod auth;
pub mod institution;
pub mod resource;
