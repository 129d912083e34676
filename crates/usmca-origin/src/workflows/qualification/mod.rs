//! Qualification rule selection and tracking of the external qualification call.

mod local;
pub mod rulebook;
pub mod tracker;

pub use local::RulebookQualification;
pub use rulebook::{QualificationRule, RuleSelection, Rulebook};
pub use tracker::{
    CachedVerdict, PendingQualification, QualificationStatus, QualificationTracker, RequestId,
    Resolution,
};
