//! Multi-step applicant wizard: personal data, address with postal-code
//! lookup, and a repeatable education section, gated by declarative schemas
//! and re-validated as a whole on submission.

pub mod domain;
pub mod education;
pub mod engine;
pub mod lookup;
pub mod notify;
pub mod policy;
pub(crate) mod rules;
pub mod router;
pub mod schema;
pub mod service;
pub mod submission;
pub mod validators;
pub mod views;

#[cfg(test)]
mod tests;

pub use domain::{
    Address, ApplicantRecord, EducationEntry, EducationField, EntryId, Field,
    InstitutionOwnership, PersonalData, UnknownField, WizardId, WizardStep,
};
pub use education::EducationSection;
pub use engine::{
    AddressResolution, TransitionError, WizardEngine, WizardError, WizardSession, WizardState,
};
pub use lookup::{
    AddressLookup, LookupApplication, LookupError, LookupOutcome, LookupTicket, ViaCepClient,
};
pub use notify::{LogNotifier, Notice, NoticeKind, Notifier, NotifyError};
pub use policy::WizardPolicy;
pub use router::wizard_router;
pub use schema::{FieldRule, FieldValue, StepSchema, ValidationErrors};
pub use service::{WizardService, WizardServiceError, DEFAULT_IDLE_TTL};
pub use submission::{FinalRecord, SubmissionAssembler};
pub use validators::{
    national_id_check_digits, validate_age, validate_age_in, validate_national_id,
    validate_password_strength,
};
pub use views::{PersonalView, RecordView, SubmissionReceipt, WizardView};
