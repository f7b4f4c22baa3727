use serde::Serialize;

use super::domain::{Address, ApplicantRecord, EducationEntry, PersonalData, WizardId, WizardStep};
use super::engine::{AddressResolution, WizardSession};
use super::schema::ValidationErrors;
use super::submission::FinalRecord;

/// Personal data as exposed to clients. The password never leaves the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PersonalView {
    pub name: String,
    pub national_id: String,
    pub email: String,
    pub password_set: bool,
    pub telephone: String,
    pub birth_date: String,
    pub gender: String,
    pub ethnicity: String,
}

impl From<&PersonalData> for PersonalView {
    fn from(personal: &PersonalData) -> Self {
        Self {
            name: personal.name.clone(),
            national_id: personal.national_id.clone(),
            email: personal.email.clone(),
            password_set: !personal.password.is_empty(),
            telephone: personal.telephone.clone(),
            birth_date: personal.birth_date.clone(),
            gender: personal.gender.clone(),
            ethnicity: personal.ethnicity.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordView {
    pub personal: PersonalView,
    pub address: Address,
    pub education_entries: Vec<EducationEntry>,
    pub accepted_regulation: bool,
}

impl From<&ApplicantRecord> for RecordView {
    fn from(record: &ApplicantRecord) -> Self {
        Self {
            personal: PersonalView::from(&record.personal),
            address: record.address.clone(),
            education_entries: record.education_entries.entries().to_vec(),
            accepted_regulation: record.accepted_regulation,
        }
    }
}

/// Snapshot of a running wizard for API responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WizardView {
    pub wizard_id: WizardId,
    pub step: WizardStep,
    pub step_index: u8,
    pub record: RecordView,
    pub errors: ValidationErrors,
    pub lookup_in_flight: bool,
    pub locked_fields: Vec<&'static str>,
    pub address_resolution: AddressResolution,
}

impl WizardView {
    pub fn new(wizard_id: WizardId, session: &WizardSession) -> Self {
        let state = &session.state;
        Self {
            wizard_id,
            step: state.step,
            step_index: state.step.index(),
            record: RecordView::from(&session.record),
            errors: state.errors.clone(),
            lookup_in_flight: state.lookup_in_flight,
            locked_fields: state.locked.iter().map(|field| field.path()).collect(),
            address_resolution: state.resolution.clone(),
        }
    }
}

/// Response body for an accepted submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionReceipt {
    pub wizard_id: WizardId,
    pub record: RecordView,
}

impl SubmissionReceipt {
    pub fn new(wizard_id: WizardId, record: &FinalRecord) -> Self {
        Self {
            wizard_id,
            record: RecordView::from(record.as_record()),
        }
    }
}
