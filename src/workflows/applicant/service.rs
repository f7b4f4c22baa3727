use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::domain::{EducationField, EntryId, Field, WizardId};
use super::engine::{TransitionError, WizardEngine, WizardError, WizardSession};
use super::lookup::{AddressLookup, LookupApplication, LookupTicket};
use super::notify::{Notice, Notifier};
use super::submission::FinalRecord;
use super::views::WizardView;

/// Sessions untouched for this long are evicted.
pub const DEFAULT_IDLE_TTL: Duration = Duration::from_secs(30 * 60);

/// Service owning the live wizard sessions, the lookup client and the notifier.
///
/// Sessions exist only in memory. They are dropped once submitted or after
/// sitting idle longer than the configured TTL.
pub struct WizardService<L, N> {
    engine: Arc<WizardEngine>,
    lookup: Arc<L>,
    notifier: Arc<N>,
    idle_ttl: Duration,
    sessions: Mutex<HashMap<WizardId, LiveSession>>,
}

struct LiveSession {
    session: WizardSession,
    touched: Instant,
}

impl LiveSession {
    fn new(session: WizardSession) -> Self {
        Self {
            session,
            touched: Instant::now(),
        }
    }

    fn is_idle(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.touched) > ttl
    }
}

static WIZARD_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_wizard_id() -> WizardId {
    let id = WIZARD_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    WizardId(format!("wiz-{id:06}"))
}

impl<L, N> WizardService<L, N>
where
    L: AddressLookup + 'static,
    N: Notifier + 'static,
{
    pub fn new(engine: WizardEngine, lookup: Arc<L>, notifier: Arc<N>) -> Self {
        Self {
            engine: Arc::new(engine),
            lookup,
            notifier,
            idle_ttl: DEFAULT_IDLE_TTL,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_idle_ttl(mut self, idle_ttl: Duration) -> Self {
        self.idle_ttl = idle_ttl;
        self
    }

    pub fn engine(&self) -> &WizardEngine {
        &self.engine
    }

    /// Open a fresh wizard on step 1. Idle wizards are evicted first.
    pub fn start(&self) -> WizardView {
        let id = next_wizard_id();
        let session = WizardSession::new();
        let view = WizardView::new(id.clone(), &session);

        let mut sessions = self.sessions();
        let now = Instant::now();
        let before = sessions.len();
        sessions.retain(|_, live| !live.is_idle(self.idle_ttl, now));
        let evicted = before - sessions.len();
        if evicted > 0 {
            info!(evicted, "idle wizards evicted");
        }
        sessions.insert(id.clone(), LiveSession::new(session));
        drop(sessions);

        info!(wizard_id = %id, "wizard started");
        view
    }

    pub fn view(&self, id: &WizardId) -> Result<WizardView, WizardServiceError> {
        self.with_session(id, |_, session| Ok(WizardView::new(id.clone(), session)))
    }

    /// Write a step 1/2 field addressed by name (`name` or `personal.name`).
    pub fn set_field(
        &self,
        id: &WizardId,
        field: &str,
        value: String,
    ) -> Result<WizardView, WizardServiceError> {
        let field: Field = field.parse().map_err(WizardError::from)?;
        self.with_session(id, |engine, session| {
            engine.set_field(session, field, value)?;
            Ok(WizardView::new(id.clone(), session))
        })
    }

    pub fn set_accepted_regulation(
        &self,
        id: &WizardId,
        accepted: bool,
    ) -> Result<WizardView, WizardServiceError> {
        self.with_session(id, |engine, session| {
            engine.set_accepted_regulation(session, accepted)?;
            Ok(WizardView::new(id.clone(), session))
        })
    }

    pub fn add_education(&self, id: &WizardId) -> Result<EntryId, WizardServiceError> {
        self.with_session(id, |engine, session| Ok(engine.add_education(session)?))
    }

    pub fn set_education_field(
        &self,
        id: &WizardId,
        entry: EntryId,
        field: &str,
        value: &str,
    ) -> Result<WizardView, WizardServiceError> {
        let field: EducationField = field.parse().map_err(WizardError::from)?;
        self.with_session(id, |engine, session| {
            engine.set_education_field(session, entry, field, value)?;
            Ok(WizardView::new(id.clone(), session))
        })
    }

    pub fn remove_education(
        &self,
        id: &WizardId,
        entry: EntryId,
    ) -> Result<bool, WizardServiceError> {
        self.with_session(id, |engine, session| {
            Ok(engine.remove_education(session, entry)?)
        })
    }

    pub fn advance(&self, id: &WizardId) -> Result<WizardView, WizardServiceError> {
        let result = self.with_session(id, |engine, session| {
            let step = engine.advance(session)?;
            info!(wizard_id = %id, step = step.index(), "wizard advanced");
            Ok(WizardView::new(id.clone(), session))
        });
        self.notify_failure(id, &result);
        result
    }

    pub fn retreat(&self, id: &WizardId) -> Result<WizardView, WizardServiceError> {
        self.with_session(id, |engine, session| {
            engine.retreat(session)?;
            Ok(WizardView::new(id.clone(), session))
        })
    }

    /// Resolve the current postal code without holding the session lock across the request.
    pub async fn lookup_address(
        &self,
        id: &WizardId,
    ) -> Result<(LookupApplication, WizardView), WizardServiceError> {
        let ticket = self.with_session(id, |engine, session| Ok(engine.begin_lookup(session)?))?;

        let mut pending = PendingLookup {
            service: self,
            id,
            ticket: Some(ticket.clone()),
        };
        let outcome = self.lookup.lookup(&ticket.postal_code).await;
        pending.ticket = None;

        self.with_session(id, |engine, session| {
            let applied = engine.apply_lookup(session, &ticket, outcome);
            info!(
                wizard_id = %id,
                sequence = ticket.sequence,
                outcome = ?applied,
                "address lookup completed"
            );
            Ok((applied, WizardView::new(id.clone(), session)))
        })
    }

    /// Submit the wizard. The session is discarded on success.
    pub fn submit(&self, id: &WizardId) -> Result<FinalRecord, WizardServiceError> {
        let result = self.with_session(id, |engine, session| Ok(engine.submit(session)?));
        self.notify_failure(id, &result);

        let record = result?;
        self.sessions().remove(id);
        info!(
            wizard_id = %id,
            applicant = ?record.personal(),
            entries = record.education_entries().len(),
            "application submitted"
        );
        if let Err(error) = self.notifier.notify(Notice::success(id.clone())) {
            warn!(wizard_id = %id, %error, "failed to deliver success notice");
        }
        Ok(record)
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions().len()
    }

    fn with_session<T>(
        &self,
        id: &WizardId,
        action: impl FnOnce(&WizardEngine, &mut WizardSession) -> Result<T, WizardServiceError>,
    ) -> Result<T, WizardServiceError> {
        let mut sessions = self.sessions();
        let now = Instant::now();
        if sessions
            .get(id)
            .is_some_and(|live| live.is_idle(self.idle_ttl, now))
        {
            sessions.remove(id);
            debug!(wizard_id = %id, "idle wizard evicted");
        }
        let live = sessions
            .get_mut(id)
            .ok_or_else(|| WizardServiceError::NotFound(id.clone()))?;
        live.touched = now;
        action(&self.engine, &mut live.session)
    }

    fn notify_failure<T>(&self, id: &WizardId, result: &Result<T, WizardServiceError>) {
        if let Err(WizardServiceError::Transition(TransitionError::Invalid { step, errors })) =
            result
        {
            warn!(
                wizard_id = %id,
                step = step.index(),
                failing = ?errors.paths().collect::<Vec<_>>(),
                "wizard validation failed"
            );
            if let Err(error) = self.notifier.notify(Notice::failure(id.clone())) {
                warn!(wizard_id = %id, %error, "failed to deliver failure notice");
            }
        }
    }
}

impl<L, N> WizardService<L, N> {
    fn sessions(&self) -> MutexGuard<'_, HashMap<WizardId, LiveSession>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Clears the in-flight flag when a lookup future is dropped before its result is applied.
struct PendingLookup<'a, L, N> {
    service: &'a WizardService<L, N>,
    id: &'a WizardId,
    ticket: Option<LookupTicket>,
}

impl<L, N> Drop for PendingLookup<'_, L, N> {
    fn drop(&mut self) {
        let Some(ticket) = self.ticket.take() else {
            return;
        };
        let mut sessions = self.service.sessions();
        if let Some(live) = sessions.get_mut(self.id) {
            if self.service.engine.abandon_lookup(&mut live.session, &ticket) {
                warn!(
                    wizard_id = %self.id,
                    sequence = ticket.sequence,
                    "address lookup cancelled before completion"
                );
            }
        }
    }
}

/// Error raised by the wizard service.
#[derive(Debug, thiserror::Error)]
pub enum WizardServiceError {
    #[error("wizard {0} not found")]
    NotFound(WizardId),
    #[error(transparent)]
    Wizard(#[from] WizardError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
}
