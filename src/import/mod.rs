//! GEDCOM-import: postladdare, id-mappning, referensupplösning och importjobb

pub mod context;
pub mod controller;
pub mod dispatch;
pub mod error;
pub mod family;
pub mod id_map;
pub mod individual;
pub mod job;
pub mod media;
pub mod note;
pub mod repository;
pub mod resolver;
pub mod result;
pub mod source;
pub mod substructures;

pub use context::ImportContext;
pub use controller::{ImportController, JobRun};
pub use dispatch::{DispatchOutcome, DispatcherRegistry, RecordDispatcher, SkipReason};
pub use error::{DispatchError, ImportError};
pub use id_map::{IdMapper, PersonMatcher};
pub use job::{new_job_id, JobRegistry, JobStore};
pub use resolver::ReferenceResolver;
pub use result::{ImportResult, KindCounts};
