// Task run domain module
// Contains the task run aggregate root, its status and domain events

#![allow(clippy::module_inception)]

pub mod events;
pub mod run;
pub mod value_objects;

pub use events::RunEvent;
pub use run::TaskRun;
pub use value_objects::RunStatus;
