// Infrastructure layer module
// Contains storage adapters for the domain repositories
// Follows Hexagonal Architecture

pub mod repositories;
