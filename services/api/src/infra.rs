use applicant_wizard::workflows::applicant::{
    AddressLookup, LookupOutcome, Notice, Notifier, NotifyError,
};
use async_trait::async_trait;
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Fixed postal-code directory for offline demos.
#[derive(Default, Clone)]
pub(crate) struct StaticAddressDirectory {
    entries: HashMap<String, LookupOutcome>,
}

impl StaticAddressDirectory {
    pub(crate) fn sample() -> Self {
        let mut directory = Self::default();
        directory.insert(
            "01310-100",
            LookupOutcome::Found {
                street: "Avenida Paulista".to_string(),
                city: "São Paulo".to_string(),
                state: "SP".to_string(),
                neighborhood: Some("Bela Vista".to_string()),
            },
        );
        directory.insert(
            "20040-020",
            LookupOutcome::Found {
                street: "Avenida Rio Branco".to_string(),
                city: "Rio de Janeiro".to_string(),
                state: "RJ".to_string(),
                neighborhood: Some("Centro".to_string()),
            },
        );
        directory
    }

    pub(crate) fn insert(&mut self, postal_code: &str, outcome: LookupOutcome) {
        self.entries.insert(digits(postal_code), outcome);
    }
}

#[async_trait]
impl AddressLookup for StaticAddressDirectory {
    async fn lookup(&self, postal_code: &str) -> LookupOutcome {
        self.entries
            .get(&digits(postal_code))
            .cloned()
            .unwrap_or(LookupOutcome::NotFound)
    }
}

fn digits(postal_code: &str) -> String {
    postal_code.chars().filter(char::is_ascii_digit).collect()
}

/// Notifier that keeps every notice for later display.
#[derive(Default, Clone)]
pub(crate) struct InMemoryNoticeLog {
    notices: Arc<Mutex<Vec<Notice>>>,
}

impl Notifier for InMemoryNoticeLog {
    fn notify(&self, notice: Notice) -> Result<(), NotifyError> {
        let mut guard = self
            .notices
            .lock()
            .map_err(|_| NotifyError::Unavailable("notice log poisoned".to_string()))?;
        guard.push(notice);
        Ok(())
    }
}

impl InMemoryNoticeLog {
    pub(crate) fn notices(&self) -> Vec<Notice> {
        self.notices
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}
