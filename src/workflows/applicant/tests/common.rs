use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::response::Response;
use serde_json::Value;
use tokio::sync::Notify;

use crate::workflows::applicant::domain::{
    Address, ApplicantRecord, InstitutionOwnership, PersonalData,
};
use crate::workflows::applicant::education::EducationSection;
use crate::workflows::applicant::engine::{WizardEngine, WizardSession, WizardState};
use crate::workflows::applicant::lookup::{AddressLookup, LookupOutcome};
use crate::workflows::applicant::notify::{Notice, Notifier, NotifyError};
use crate::workflows::applicant::policy::WizardPolicy;
use crate::workflows::applicant::{wizard_router, WizardService, WizardStep};

pub(crate) const POSTAL_CODE: &str = "01310-100";

pub(crate) fn policy() -> WizardPolicy {
    WizardPolicy {
        reference_year: Some(2024),
        ..WizardPolicy::default()
    }
}

pub(crate) fn engine() -> WizardEngine {
    engine_with(policy())
}

pub(crate) fn engine_with(policy: WizardPolicy) -> WizardEngine {
    WizardEngine::new(policy).expect("schemas build")
}

pub(crate) fn valid_personal() -> PersonalData {
    PersonalData {
        name: "Ana Souza".to_string(),
        national_id: "529.982.247-25".to_string(),
        email: "ana.souza@example.com".to_string(),
        password: "Abc#1234".to_string(),
        telephone: "11987654321".to_string(),
        birth_date: "2003-04-20".to_string(),
        gender: "female".to_string(),
        ethnicity: "brown".to_string(),
    }
}

pub(crate) fn valid_address() -> Address {
    Address {
        postal_code: POSTAL_CODE.to_string(),
        street_name: "Avenida Paulista".to_string(),
        street_number: "1578".to_string(),
        state: "SP".to_string(),
        city: "São Paulo".to_string(),
        neighborhood: "Bela Vista".to_string(),
        complement: String::new(),
    }
}

pub(crate) fn valid_education() -> EducationSection {
    let mut section = EducationSection::default();
    let id = section.add();
    if let Some(entry) = section.get_mut(id) {
        entry.institution_name = "Universidade de São Paulo".to_string();
        entry.course_name = "Computer Science".to_string();
        entry.start_date = "2021-02-01".to_string();
        entry.end_date = "2024-12-15".to_string();
        entry.ownership = Some(InstitutionOwnership::Public);
    }
    section
}

pub(crate) fn valid_record() -> ApplicantRecord {
    ApplicantRecord {
        personal: valid_personal(),
        address: valid_address(),
        education_entries: valid_education(),
        accepted_regulation: true,
    }
}

/// Session holding `record` positioned on `step`, with no recorded errors.
pub(crate) fn session_on(step: WizardStep, record: ApplicantRecord) -> WizardSession {
    WizardSession {
        record,
        state: WizardState {
            step,
            ..WizardState::default()
        },
    }
}

pub(crate) fn paulista() -> LookupOutcome {
    LookupOutcome::Found {
        street: "Avenida Paulista".to_string(),
        city: "São Paulo".to_string(),
        state: "SP".to_string(),
        neighborhood: Some("Bela Vista".to_string()),
    }
}

/// Lookup keyed by the digits of the postal code.
#[derive(Default, Clone)]
pub(crate) struct MemoryLookup {
    known: Arc<Mutex<HashMap<String, LookupOutcome>>>,
}

impl MemoryLookup {
    pub(crate) fn with(postal_code: &str, outcome: LookupOutcome) -> Self {
        let lookup = Self::default();
        lookup
            .known
            .lock()
            .expect("lookup mutex poisoned")
            .insert(digits(postal_code), outcome);
        lookup
    }
}

#[async_trait]
impl AddressLookup for MemoryLookup {
    async fn lookup(&self, postal_code: &str) -> LookupOutcome {
        self.known
            .lock()
            .expect("lookup mutex poisoned")
            .get(&digits(postal_code))
            .cloned()
            .unwrap_or(LookupOutcome::NotFound)
    }
}

/// Lookup that parks every request until released.
#[derive(Default)]
pub(crate) struct GatedLookup {
    pub(crate) entered: Notify,
    pub(crate) release: Notify,
}

#[async_trait]
impl AddressLookup for GatedLookup {
    async fn lookup(&self, _postal_code: &str) -> LookupOutcome {
        self.entered.notify_one();
        self.release.notified().await;
        paulista()
    }
}

fn digits(postal_code: &str) -> String {
    postal_code.chars().filter(char::is_ascii_digit).collect()
}

#[derive(Default, Clone)]
pub(crate) struct MemoryNotifier {
    notices: Arc<Mutex<Vec<Notice>>>,
}

impl MemoryNotifier {
    pub(crate) fn notices(&self) -> Vec<Notice> {
        self.notices.lock().expect("notifier mutex poisoned").clone()
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&self, notice: Notice) -> Result<(), NotifyError> {
        self.notices
            .lock()
            .expect("notifier mutex poisoned")
            .push(notice);
        Ok(())
    }
}

pub(crate) struct OfflineNotifier;

impl Notifier for OfflineNotifier {
    fn notify(&self, _notice: Notice) -> Result<(), NotifyError> {
        Err(NotifyError::Unavailable("push gateway offline".to_string()))
    }
}

pub(crate) fn build_service() -> (
    WizardService<MemoryLookup, MemoryNotifier>,
    Arc<MemoryNotifier>,
) {
    let lookup = Arc::new(MemoryLookup::with(POSTAL_CODE, paulista()));
    let notifier = Arc::new(MemoryNotifier::default());
    let service = WizardService::new(engine(), lookup, notifier.clone());
    (service, notifier)
}

pub(crate) fn wizard_router_with_service(
    service: WizardService<MemoryLookup, MemoryNotifier>,
) -> axum::Router {
    wizard_router(Arc::new(service))
}

pub(crate) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
