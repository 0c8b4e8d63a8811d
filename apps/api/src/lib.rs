//! Taskcrew API Library
//!
//! Multi-agent task orchestration: a planning agent decomposes natural
//! language instructions, specialised agents carry out the subtasks and an
//! evaluation agent scores the result. The HTTP API exposes the pipeline.

pub mod agents;
pub mod api;
pub mod config;
pub mod domain;
pub mod infrastructure;
