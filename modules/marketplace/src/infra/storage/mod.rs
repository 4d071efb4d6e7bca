pub mod entity;
pub mod mapper;
pub mod memory;
pub mod migrations;
pub mod sea_orm_repo;

pub use memory::InMemoryStore;
pub use migrations::Migrator;
pub use sea_orm_repo::SeaOrmStore;
