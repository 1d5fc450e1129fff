pub mod user_repo;
pub use user_repo::UserRepository;
pub mod institution_repo;
pub use institution_repo::InstitutionRepository;
pub mod resource_repo;
pub use resource_repo::ResourceRepository;
