// Repository seam and the request pipeline built on top of it

pub mod relation_loader;
pub mod sea_orm_repository;
pub mod service;
pub mod traits;

// Re-export commonly used items
pub use relation_loader::{LoadRelation, RelationLoader};
pub use sea_orm_repository::SeaOrmRepository;
pub use service::ResourceService;
pub use traits::{FindOptions, FoundGraph, Repository};
