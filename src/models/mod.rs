pub mod config;
pub mod event;
pub mod family;
pub mod job;
pub mod link;
pub mod person;
pub mod record;

pub use config::*;
pub use event::*;
pub use family::*;
pub use job::*;
pub use link::*;
pub use person::*;
pub use record::*;
