// Repository contracts implemented by the infrastructure layer

pub mod run_repository;

pub use run_repository::TaskRunRepository;
