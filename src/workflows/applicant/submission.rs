use serde::Serialize;

use super::domain::{Address, ApplicantRecord, EducationEntry, PersonalData, WizardStep};
use super::engine::{WizardEngine, WizardSession};
use super::schema::ValidationErrors;

/// Immutable snapshot of a fully validated application.
///
/// Only [`SubmissionAssembler`] builds these, so holding one guarantees at
/// least one education entry and an accepted regulation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FinalRecord {
    record: ApplicantRecord,
}

impl FinalRecord {
    pub fn personal(&self) -> &PersonalData {
        &self.record.personal
    }

    pub fn address(&self) -> &Address {
        &self.record.address
    }

    pub fn street_number(&self) -> u32 {
        // Validated as a non-negative integer during assembly.
        self.record
            .address
            .street_number
            .trim()
            .parse()
            .unwrap_or_default()
    }

    pub fn education_entries(&self) -> &[EducationEntry] {
        self.record.education_entries.entries()
    }

    pub fn accepted_regulation(&self) -> bool {
        self.record.accepted_regulation
    }

    pub fn as_record(&self) -> &ApplicantRecord {
        &self.record
    }
}

/// Re-validates a record end to end without trusting the step gates.
pub struct SubmissionAssembler<'a> {
    engine: &'a WizardEngine,
}

impl<'a> SubmissionAssembler<'a> {
    pub fn new(engine: &'a WizardEngine) -> Self {
        Self { engine }
    }

    pub fn assemble(&self, record: &ApplicantRecord) -> Result<FinalRecord, ValidationErrors> {
        let schemas = self.engine.schemas();
        let mut errors = ValidationErrors::new();

        let failures = schemas
            .personal
            .failures(record)
            .into_iter()
            .chain(schemas.address.failures(record))
            .chain(schemas.education.failures(record));
        for (path, message) in failures {
            errors.insert(path, message);
        }
        errors.merge(self.engine.entry_errors(record));

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(FinalRecord {
            record: record.clone(),
        })
    }

    /// Assemble from a session, also honoring the step 2 lookup gate.
    pub fn assemble_session(
        &self,
        session: &WizardSession,
    ) -> Result<FinalRecord, ValidationErrors> {
        let mut gate = self.engine.step_errors(session, WizardStep::Step2);
        let assembled = self.assemble(&session.record);
        match assembled {
            Ok(record) if gate.is_empty() => Ok(record),
            Ok(_) => Err(gate),
            Err(errors) => {
                gate.merge(errors);
                Err(gate)
            }
        }
    }
}
