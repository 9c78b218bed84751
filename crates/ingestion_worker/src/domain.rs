mod mesh_event_service;
mod normalizer;

pub use mesh_event_service::*;
pub use normalizer::*;
