mod mesh_event;
mod result;

pub use mesh_event::*;
pub use result::*;
