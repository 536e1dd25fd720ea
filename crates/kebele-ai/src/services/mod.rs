//! Request-level services built on the provider and storage layers.

mod guide;

pub use guide::{AnswerOutcome, GuideOptions, GuideService};
