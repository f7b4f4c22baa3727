use std::collections::BTreeSet;

use serde::Serialize;
use tracing::debug;

use super::domain::{
    ApplicantRecord, EducationField, EntryId, Field, UnknownField, WizardStep, EDUCATION_PATH,
    REGULATION_PATH,
};
use super::lookup::{LookupApplication, LookupOutcome, LookupTicket};
use super::policy::WizardPolicy;
use super::rules::{WizardSchemas, POSTAL_CODE_NOT_FOUND};
use super::schema::ValidationErrors;
use super::submission::{FinalRecord, SubmissionAssembler};

/// Where the postal code stands relative to the last lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AddressResolution {
    Unresolved,
    Resolved { postal_code: String },
    NotFound { postal_code: String },
}

/// Wizard bookkeeping that travels with the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WizardState {
    pub step: WizardStep,
    pub errors: ValidationErrors,
    pub lookup_in_flight: bool,
    pub locked: BTreeSet<Field>,
    pub lookup_sequence: u64,
    pub resolution: AddressResolution,
}

impl Default for WizardState {
    fn default() -> Self {
        Self {
            step: WizardStep::Step1,
            errors: ValidationErrors::new(),
            lookup_in_flight: false,
            locked: BTreeSet::new(),
            lookup_sequence: 0,
            resolution: AddressResolution::Unresolved,
        }
    }
}

/// One applicant's wizard: the working record plus its state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WizardSession {
    pub record: ApplicantRecord,
    pub state: WizardState,
}

impl WizardSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(&self) -> WizardStep {
        self.state.step
    }

    pub fn errors(&self) -> &ValidationErrors {
        &self.state.errors
    }
}

/// Mutation rejected before touching the record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WizardError {
    #[error("wizard already submitted")]
    AlreadySubmitted,
    #[error("field {} is locked", .0.path())]
    FieldLocked(Field),
    #[error("education entry {0} not found")]
    EntryNotFound(EntryId),
    #[error(transparent)]
    UnknownField(#[from] UnknownField),
    #[error("postal code is invalid: {0}")]
    InvalidPostalCode(String),
}

/// Step transition that could not happen.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("step {} has {} invalid field(s)", .step.index(), .errors.len())]
    Invalid {
        step: WizardStep,
        errors: ValidationErrors,
    },
    #[error("already on the first step")]
    FirstStep,
    #[error("step 3 is final; submit instead of advancing")]
    FinalStep,
    #[error("submission is only possible from step 3 (currently {})", .0.label())]
    NotOnFinalStep(WizardStep),
    #[error("wizard already submitted")]
    AlreadySubmitted,
}

/// Stateless state machine. All wizard data lives in the [`WizardSession`] it is handed.
pub struct WizardEngine {
    policy: WizardPolicy,
    schemas: WizardSchemas,
}

impl WizardEngine {
    pub fn new(policy: WizardPolicy) -> Result<Self, regex::Error> {
        let schemas = WizardSchemas::build(&policy)?;
        Ok(Self { policy, schemas })
    }

    pub fn policy(&self) -> &WizardPolicy {
        &self.policy
    }

    pub(crate) fn schemas(&self) -> &WizardSchemas {
        &self.schemas
    }

    /// Write one step 1/2 field and re-validate it.
    pub fn set_field(
        &self,
        session: &mut WizardSession,
        field: Field,
        value: impl Into<String>,
    ) -> Result<(), WizardError> {
        ensure_open(session)?;
        if session.state.locked.contains(&field) {
            return Err(WizardError::FieldLocked(field));
        }
        if session.state.lookup_in_flight
            && self.policy.lock_resolved_address
            && Field::LOOKUP_TARGETS.contains(&field)
        {
            return Err(WizardError::FieldLocked(field));
        }

        *field.slot(&mut session.record) = value.into();

        if field == Field::PostalCode {
            self.invalidate_resolution(session);
        }

        self.revalidate_field(session, field);
        Ok(())
    }

    pub fn set_education_field(
        &self,
        session: &mut WizardSession,
        id: EntryId,
        field: EducationField,
        value: &str,
    ) -> Result<(), WizardError> {
        ensure_open(session)?;
        let ownership = match field {
            EducationField::Ownership if value.trim().is_empty() => Some(None),
            EducationField::Ownership => Some(Some(value.parse()?)),
            _ => None,
        };

        let entry = session
            .record
            .education_entries
            .get_mut(id)
            .ok_or(WizardError::EntryNotFound(id))?;
        match field {
            EducationField::InstitutionName => entry.institution_name = value.to_string(),
            EducationField::CourseName => entry.course_name = value.to_string(),
            EducationField::StartDate => entry.start_date = value.to_string(),
            EducationField::EndDate => entry.end_date = value.to_string(),
            EducationField::Ownership => entry.ownership = ownership.flatten(),
        }

        self.revalidate_entry_field(session, id, field);
        // The end-date rule reads the start date.
        if field == EducationField::StartDate {
            self.revalidate_entry_field(session, id, EducationField::EndDate);
        }
        Ok(())
    }

    pub fn set_accepted_regulation(
        &self,
        session: &mut WizardSession,
        accepted: bool,
    ) -> Result<(), WizardError> {
        ensure_open(session)?;
        session.record.accepted_regulation = accepted;
        let outcome = self
            .schemas
            .education
            .rule(REGULATION_PATH)
            .and_then(|rule| rule.check(&session.record));
        session.state.errors.apply(REGULATION_PATH, outcome);
        Ok(())
    }

    pub fn add_education(&self, session: &mut WizardSession) -> Result<EntryId, WizardError> {
        ensure_open(session)?;
        let id = session.record.education_entries.add();
        session.state.errors.remove(EDUCATION_PATH);
        debug!(entry = %id, "education entry added");
        Ok(id)
    }

    /// Remove by identity; `Ok(false)` when no entry matched.
    pub fn remove_education(
        &self,
        session: &mut WizardSession,
        id: EntryId,
    ) -> Result<bool, WizardError> {
        ensure_open(session)?;
        let removed = session.record.education_entries.remove(id);
        if removed {
            session
                .state
                .errors
                .clear_scope(&format!("{EDUCATION_PATH}.{id}"));
            debug!(entry = %id, "education entry removed");
        }
        Ok(removed)
    }

    /// Move forward one step if the current step validates.
    pub fn advance(&self, session: &mut WizardSession) -> Result<WizardStep, TransitionError> {
        let from = session.state.step;
        let to = match from {
            WizardStep::Submitted => return Err(TransitionError::AlreadySubmitted),
            WizardStep::Step3 => return Err(TransitionError::FinalStep),
            step => step.next().ok_or(TransitionError::FinalStep)?,
        };

        let errors = self.validate_step(session, from);
        if !errors.is_empty() {
            debug!(step = from.index(), failing = errors.len(), "advance blocked");
            return Err(TransitionError::Invalid { step: from, errors });
        }

        session.state.step = to;
        debug!(from = from.index(), to = to.index(), "wizard advanced");
        Ok(to)
    }

    /// Move back one step. Never validates.
    pub fn retreat(&self, session: &mut WizardSession) -> Result<WizardStep, TransitionError> {
        let from = session.state.step;
        if from == WizardStep::Submitted {
            return Err(TransitionError::AlreadySubmitted);
        }
        let to = from.previous().ok_or(TransitionError::FirstStep)?;
        session.state.step = to;
        debug!(from = from.index(), to = to.index(), "wizard retreated");
        Ok(to)
    }

    /// Leave step 3 with an assembled record.
    pub fn submit(&self, session: &mut WizardSession) -> Result<FinalRecord, TransitionError> {
        match session.state.step {
            WizardStep::Step3 => {}
            WizardStep::Submitted => return Err(TransitionError::AlreadySubmitted),
            other => return Err(TransitionError::NotOnFinalStep(other)),
        }

        let errors = self.validate_step(session, WizardStep::Step3);
        if !errors.is_empty() {
            return Err(TransitionError::Invalid {
                step: WizardStep::Step3,
                errors,
            });
        }

        let assembler = SubmissionAssembler::new(self);
        let record = assembler.assemble_session(session).map_err(|errors| {
            session.state.errors.merge(errors.clone());
            TransitionError::Invalid {
                step: WizardStep::Step3,
                errors,
            }
        })?;

        session.state.step = WizardStep::Submitted;
        Ok(record)
    }

    /// Validate the postal code and issue a ticket for a lookup.
    pub fn begin_lookup(&self, session: &mut WizardSession) -> Result<LookupTicket, WizardError> {
        ensure_open(session)?;
        self.revalidate_field(session, Field::PostalCode);
        if let Some(message) = session.state.errors.get(Field::PostalCode.path()) {
            return Err(WizardError::InvalidPostalCode(message.to_string()));
        }

        session.state.lookup_sequence += 1;
        session.state.lookup_in_flight = true;
        let ticket = LookupTicket {
            sequence: session.state.lookup_sequence,
            postal_code: session.record.address.postal_code.clone(),
        };
        debug!(sequence = ticket.sequence, postal_code = %ticket.postal_code, "lookup issued");
        Ok(ticket)
    }

    /// Apply a lookup result unless a newer ticket or a postal-code edit superseded it.
    pub fn apply_lookup(
        &self,
        session: &mut WizardSession,
        ticket: &LookupTicket,
        outcome: LookupOutcome,
    ) -> LookupApplication {
        let state = &mut session.state;
        if state.step == WizardStep::Submitted
            || ticket.sequence != state.lookup_sequence
            || ticket.postal_code != session.record.address.postal_code
        {
            debug!(
                sequence = ticket.sequence,
                latest = state.lookup_sequence,
                "stale lookup discarded"
            );
            return LookupApplication::Superseded;
        }

        state.lookup_in_flight = false;
        let path = Field::PostalCode.path();
        match outcome {
            LookupOutcome::Found {
                street,
                city,
                state: region,
                neighborhood,
            } => {
                state.locked.clear();
                // Blank values leave the target editable.
                for (field, value) in [
                    (Field::StreetName, street),
                    (Field::City, city),
                    (Field::State, region),
                ] {
                    if value.trim().is_empty() {
                        continue;
                    }
                    *field.slot(&mut session.record) = value;
                    state.errors.remove(field.path());
                    if self.policy.lock_resolved_address {
                        state.locked.insert(field);
                    }
                }
                if let Some(neighborhood) = neighborhood {
                    let address = &mut session.record.address;
                    if address.neighborhood.trim().is_empty() && !neighborhood.trim().is_empty() {
                        address.neighborhood = neighborhood;
                        state.errors.remove(Field::Neighborhood.path());
                    }
                }

                state.errors.remove(path);
                state.resolution = AddressResolution::Resolved {
                    postal_code: ticket.postal_code.clone(),
                };
                LookupApplication::Resolved
            }
            LookupOutcome::NotFound => {
                state.locked.clear();
                state.errors.insert(path, POSTAL_CODE_NOT_FOUND);
                state.resolution = AddressResolution::NotFound {
                    postal_code: ticket.postal_code.clone(),
                };
                LookupApplication::NotFound
            }
        }
    }

    /// Release the in-flight flag for a lookup whose result will never arrive.
    ///
    /// Returns `false` when `ticket` is no longer the latest one, in which case
    /// the session is left untouched.
    pub fn abandon_lookup(&self, session: &mut WizardSession, ticket: &LookupTicket) -> bool {
        let state = &mut session.state;
        if ticket.sequence != state.lookup_sequence || !state.lookup_in_flight {
            return false;
        }
        state.lookup_in_flight = false;
        debug!(sequence = ticket.sequence, "lookup abandoned");
        true
    }

    /// Full validation of one step; the step's previous errors are replaced.
    pub fn validate_step(&self, session: &mut WizardSession, step: WizardStep) -> ValidationErrors {
        let errors = self.step_errors(session, step);
        let state = &mut session.state;
        match step {
            WizardStep::Step1 => state.errors.clear_scope("personal"),
            WizardStep::Step2 => state.errors.clear_scope("address"),
            WizardStep::Step3 => {
                state.errors.clear_scope(EDUCATION_PATH);
                state.errors.clear_scope(REGULATION_PATH);
            }
            WizardStep::Submitted => {}
        }
        state.errors.merge(errors.clone());
        errors
    }

    /// Errors for `step` without touching the session.
    pub fn step_errors(&self, session: &WizardSession, step: WizardStep) -> ValidationErrors {
        let record = &session.record;
        let mut errors = ValidationErrors::new();
        match step {
            WizardStep::Step1 => collect(&mut errors, self.schemas.personal.failures(record)),
            WizardStep::Step2 => {
                collect(&mut errors, self.schemas.address.failures(record));
                self.lookup_gate(session, &mut errors);
            }
            WizardStep::Step3 => {
                collect(&mut errors, self.schemas.education.failures(record));
                errors.merge(self.entry_errors(record));
            }
            WizardStep::Submitted => {}
        }
        errors
    }

    pub(crate) fn entry_errors(&self, record: &ApplicantRecord) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        for entry in record.education_entries.iter() {
            for (key, message) in self.schemas.entry.failures(entry) {
                errors.insert(format!("{EDUCATION_PATH}.{}.{key}", entry.id), message);
            }
        }
        errors
    }

    fn lookup_gate(&self, session: &WizardSession, errors: &mut ValidationErrors) {
        let path = Field::PostalCode.path();
        if errors.contains(path) {
            return;
        }

        let postal_code = &session.record.address.postal_code;
        match &session.state.resolution {
            AddressResolution::NotFound { postal_code: code } if code == postal_code => {
                errors.insert(path, POSTAL_CODE_NOT_FOUND);
            }
            AddressResolution::Resolved { postal_code: code } if code == postal_code => {}
            _ if self.policy.require_address_lookup => {
                errors.insert(path, "Look up the postal code before continuing");
            }
            _ => {}
        }
    }

    fn revalidate_field(&self, session: &mut WizardSession, field: Field) {
        let schema = match field.step() {
            WizardStep::Step1 => &self.schemas.personal,
            _ => &self.schemas.address,
        };
        let outcome = schema
            .rule(field.path())
            .and_then(|rule| rule.check(&session.record));
        session.state.errors.apply(field.path(), outcome);
    }

    fn revalidate_entry_field(
        &self,
        session: &mut WizardSession,
        id: EntryId,
        field: EducationField,
    ) {
        let Some(entry) = session.record.education_entries.get(id) else {
            return;
        };
        let outcome = self
            .schemas
            .entry
            .rule(field.name())
            .and_then(|rule| rule.check(entry));
        session.state.errors.apply(&field.path(id), outcome);
    }

    fn invalidate_resolution(&self, session: &mut WizardSession) {
        let state = &mut session.state;
        state.lookup_sequence += 1;
        state.lookup_in_flight = false;
        state.resolution = AddressResolution::Unresolved;
        state.locked.clear();
    }
}

fn collect(errors: &mut ValidationErrors, failures: Vec<(&'static str, &'static str)>) {
    for (path, message) in failures {
        errors.insert(path, message);
    }
}

fn ensure_open(session: &WizardSession) -> Result<(), WizardError> {
    if session.state.step == WizardStep::Submitted {
        return Err(WizardError::AlreadySubmitted);
    }
    Ok(())
}
