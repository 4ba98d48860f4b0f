//! Server listener and accept loop.

mod core;

pub use self::core::WorldServer;
