//! Tjänster runt importen
//!
//! Innehåller det som inte hör hemma i parsern eller databasen.

pub mod media_storage;

pub use media_storage::{LocalMediaStorage, MediaStorage};
