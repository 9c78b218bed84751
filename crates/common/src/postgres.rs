mod client;
mod config;
mod mesh_event_repository;

pub use client::*;
pub use config::*;
pub use mesh_event_repository::*;
