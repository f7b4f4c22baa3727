use std::sync::Arc;
use std::time::Duration;

use super::common::*;

use crate::workflows::applicant::domain::{WizardId, WizardStep};
use crate::workflows::applicant::engine::{TransitionError, WizardError};
use crate::workflows::applicant::lookup::{AddressLookup, LookupApplication};
use crate::workflows::applicant::notify::{
    NoticeKind, Notifier, SUBMISSION_SUCCEEDED, VALIDATION_FAILED,
};
use crate::workflows::applicant::service::{WizardService, WizardServiceError};

fn fill_personal<L, N>(service: &WizardService<L, N>, id: &WizardId)
where
    L: AddressLookup + 'static,
    N: Notifier + 'static,
{
    let personal = valid_personal();
    for (field, value) in [
        ("name", personal.name),
        ("national_id", personal.national_id),
        ("email", personal.email),
        ("password", personal.password),
        ("telephone", personal.telephone),
        ("birth_date", personal.birth_date),
        ("gender", personal.gender),
        ("ethnicity", personal.ethnicity),
    ] {
        service.set_field(id, field, value).expect("field accepted");
    }
}

#[tokio::test]
async fn wizard_walks_from_start_to_submission() {
    let (service, notifier) = build_service();
    let id = service.start().wizard_id;

    fill_personal(&service, &id);
    assert_eq!(service.advance(&id).expect("advances").step, WizardStep::Step2);

    service
        .set_field(&id, "address.postal_code", POSTAL_CODE.to_string())
        .expect("field accepted");
    let (applied, view) = service.lookup_address(&id).await.expect("lookup runs");
    assert_eq!(applied, LookupApplication::Resolved);
    assert_eq!(view.record.address.city, "São Paulo");
    assert_eq!(view.locked_fields.len(), 3);
    service
        .set_field(&id, "street_number", "1578".to_string())
        .expect("field accepted");
    assert_eq!(service.advance(&id).expect("advances").step, WizardStep::Step3);

    let entry = service.add_education(&id).expect("entry added");
    for (field, value) in [
        ("institution_name", "Universidade de São Paulo"),
        ("course_name", "Computer Science"),
        ("start_date", "2021-02-01"),
        ("end_date", "2024-12-15"),
        ("ownership", "public"),
    ] {
        service
            .set_education_field(&id, entry, field, value)
            .expect("entry field accepted");
    }
    service
        .set_accepted_regulation(&id, true)
        .expect("regulation accepted");

    let record = service.submit(&id).expect("submits");

    assert_eq!(record.street_number(), 1578);
    assert_eq!(record.education_entries().len(), 1);
    assert_eq!(service.active_sessions(), 0);
    assert!(matches!(
        service.view(&id),
        Err(WizardServiceError::NotFound(_))
    ));
    let notices = notifier.notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].kind, NoticeKind::Success);
    assert_eq!(notices[0].message, SUBMISSION_SUCCEEDED);
}

#[tokio::test]
async fn blocked_advance_emits_a_failure_notice() {
    let (service, notifier) = build_service();
    let id = service.start().wizard_id;

    let error = service.advance(&id).expect_err("blocked");

    assert!(matches!(
        error,
        WizardServiceError::Transition(TransitionError::Invalid {
            step: WizardStep::Step1,
            ..
        })
    ));
    let view = service.view(&id).expect("session kept");
    assert_eq!(view.step, WizardStep::Step1);
    assert_eq!(view.errors.len(), 8);
    let notices = notifier.notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].kind, NoticeKind::Failure);
    assert_eq!(notices[0].message, VALIDATION_FAILED);
}

#[tokio::test]
async fn retreat_does_not_notify() {
    let (service, notifier) = build_service();
    let id = service.start().wizard_id;

    assert!(matches!(
        service.retreat(&id),
        Err(WizardServiceError::Transition(TransitionError::FirstStep))
    ));
    assert!(notifier.notices().is_empty());
}

#[tokio::test]
async fn unknown_postal_code_reports_not_found() {
    let (service, _) = build_service();
    let id = service.start().wizard_id;
    service
        .set_field(&id, "postal_code", "99999-999".to_string())
        .expect("field accepted");

    let (applied, view) = service.lookup_address(&id).await.expect("lookup runs");

    assert_eq!(applied, LookupApplication::NotFound);
    assert_eq!(
        view.errors.get("address.postal_code"),
        Some("Postal code not found")
    );
    assert!(view.locked_fields.is_empty());
}

#[tokio::test]
async fn unknown_fields_and_wizards_are_rejected() {
    let (service, _) = build_service();
    let id = service.start().wizard_id;

    assert!(matches!(
        service.set_field(&id, "personal.nickname", "Ana".to_string()),
        Err(WizardServiceError::Wizard(WizardError::UnknownField(_)))
    ));
    assert!(matches!(
        service.view(&WizardId("wiz-missing".to_string())),
        Err(WizardServiceError::NotFound(_))
    ));
}

#[tokio::test]
async fn wizard_ids_are_unique() {
    let (service, _) = build_service();

    let first = service.start().wizard_id;
    let second = service.start().wizard_id;

    assert_ne!(first, second);
    assert!(first.0.starts_with("wiz-"));
    assert_eq!(service.active_sessions(), 2);
}

#[tokio::test]
async fn notifier_outage_does_not_mask_the_outcome() {
    let service = WizardService::new(
        engine(),
        Arc::new(MemoryLookup::default()),
        Arc::new(OfflineNotifier),
    );
    let id = service.start().wizard_id;

    assert!(matches!(
        service.advance(&id),
        Err(WizardServiceError::Transition(TransitionError::Invalid { .. }))
    ));

    fill_personal(&service, &id);
    assert_eq!(service.advance(&id).expect("advances").step, WizardStep::Step2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn postal_code_edit_during_lookup_discards_the_late_result() {
    let lookup = Arc::new(GatedLookup::default());
    let service = Arc::new(WizardService::new(
        engine(),
        lookup.clone(),
        Arc::new(MemoryNotifier::default()),
    ));
    let id = service.start().wizard_id;
    service
        .set_field(&id, "postal_code", POSTAL_CODE.to_string())
        .expect("field accepted");

    let pending = {
        let service = service.clone();
        let id = id.clone();
        tokio::spawn(async move { service.lookup_address(&id).await })
    };
    lookup.entered.notified().await;

    let during = service.view(&id).expect("session readable during lookup");
    assert!(during.lookup_in_flight);
    service
        .set_field(&id, "postal_code", "20040-020".to_string())
        .expect("postal code editable during lookup");
    lookup.release.notify_one();

    let (applied, view) = pending
        .await
        .expect("task joins")
        .expect("lookup runs");

    assert_eq!(applied, LookupApplication::Superseded);
    assert!(!view.lookup_in_flight);
    assert!(view.record.address.street_name.is_empty());
    assert_eq!(view.record.address.postal_code, "20040-020");
}

#[tokio::test]
async fn cancelled_lookup_releases_the_address_fields() {
    let service = WizardService::new(
        engine(),
        Arc::new(GatedLookup::default()),
        Arc::new(MemoryNotifier::default()),
    );
    let id = service.start().wizard_id;
    service
        .set_field(&id, "postal_code", POSTAL_CODE.to_string())
        .expect("field accepted");

    let timed_out =
        tokio::time::timeout(Duration::from_millis(50), service.lookup_address(&id)).await;

    assert!(timed_out.is_err());
    let view = service.view(&id).expect("session survives");
    assert!(!view.lookup_in_flight);
    service
        .set_field(&id, "city", "São Paulo".to_string())
        .expect("city editable after cancellation");
}

#[tokio::test]
async fn idle_wizards_are_evicted_when_a_new_one_starts() {
    let (service, _) = build_service();
    let service = service.with_idle_ttl(Duration::from_millis(20));
    let stale = service.start().wizard_id;

    tokio::time::sleep(Duration::from_millis(60)).await;
    let fresh = service.start().wizard_id;

    assert_eq!(service.active_sessions(), 1);
    assert!(matches!(
        service.view(&stale),
        Err(WizardServiceError::NotFound(_))
    ));
    assert!(service.view(&fresh).is_ok());
}

#[tokio::test]
async fn idle_wizard_is_gone_on_next_access() {
    let (service, _) = build_service();
    let service = service.with_idle_ttl(Duration::from_millis(20));
    let id = service.start().wizard_id;

    tokio::time::sleep(Duration::from_millis(60)).await;

    assert!(matches!(
        service.set_field(&id, "name", "Ana Souza".to_string()),
        Err(WizardServiceError::NotFound(_))
    ));
    assert_eq!(service.active_sessions(), 0);
}
