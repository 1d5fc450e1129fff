pub mod auth;
pub mod institution_service;
pub mod resource_service;
pub mod scope_service;
