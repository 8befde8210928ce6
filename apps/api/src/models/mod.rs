pub mod attempt;
pub mod posting;
pub mod profile;

pub use attempt::{
    ApplicationAttempt, AttemptError, AttemptInputs, AttemptStatus, BindingSource, BindingValue,
    FieldBinding, FileRef, FillFailure, FillReport, Mode, ReviewDecision, Transition,
};
pub use posting::{FieldKind, FormFieldDescriptor, JobPosting, JobSource};
pub use profile::{PersonalInfo, Profile};
