pub mod actor;
pub mod handler;
pub mod protocol;
pub mod registry;
pub mod writer;

pub use registry::SessionRegistry;
pub use writer::{ConnectionWriter, SendError};
