//! The gig schedule: a CSV list of shows normalized into upcoming,
//! timezone-correct records for templates.

mod loader;
mod record;
mod source;
mod zone;

pub use loader::*;
pub use record::*;
pub use source::*;
pub use zone::*;
