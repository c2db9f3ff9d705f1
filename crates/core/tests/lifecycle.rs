//! End-to-end lifecycle tests driven by a virtual clock

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;
use tenure_core::tests::{ManualActivitySource, ManualRuntime, ScriptedRenewer};
use tenure_core::{
    BootstrapOutcome, ChangeReason, Credential, KeyValueStore, MemoryStore, PromptEvent,
    PromptOutcome, RenewalError, Runtime, ServerError, SessionConfig, SessionManager, SignOutReason,
};

const START_MS: i64 = 1_700_000_000_000;

struct Harness {
    runtime: ManualRuntime,
    store: MemoryStore,
    source: ManualActivitySource,
    renewer: ScriptedRenewer,
    manager: SessionManager,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn test_config() -> SessionConfig {
    SessionConfig {
        idle_timeout_secs: 600,
        check_interval_secs: 10,
        dialog_timeout_secs: 30,
        ..SessionConfig::default()
    }
}

fn harness_with(config: SessionConfig, runtime: ManualRuntime, store: MemoryStore) -> Harness {
    init_tracing();
    let source = ManualActivitySource::new();
    let renewer = ScriptedRenewer::new();
    let manager = SessionManager::builder()
        .config(config)
        .runtime(Rc::new(runtime.clone()))
        .store(Rc::new(store.clone()))
        .activity_source(Rc::new(source.clone()))
        .renewer(Rc::new(renewer.clone()))
        .build()
        .unwrap();
    Harness {
        runtime,
        store,
        source,
        renewer,
        manager,
    }
}

fn harness() -> Harness {
    harness_with(test_config(), ManualRuntime::new(START_MS), MemoryStore::new())
}

fn record_reasons(manager: &SessionManager) -> (Rc<RefCell<Vec<ChangeReason>>>, tenure_core::Subscription) {
    let reasons = Rc::new(RefCell::new(Vec::new()));
    let subscription = {
        let reasons = reasons.clone();
        manager.subscribe(move |change| reasons.borrow_mut().push(change.reason))
    };
    (reasons, subscription)
}

fn count_prompts(manager: &SessionManager) -> (Rc<Cell<usize>>, tenure_core::Subscription) {
    let opened = Rc::new(Cell::new(0));
    let subscription = {
        let opened = opened.clone();
        manager.prompt().subscribe(move |event| {
            if matches!(event, PromptEvent::Opened { .. }) {
                opened.set(opened.get() + 1);
            }
        })
    };
    (opened, subscription)
}

fn signin(h: &Harness, token: &str, expires_in: i64, stay_signed_in: bool) {
    h.manager
        .sign_in(
            &Credential::new(token, expires_in).with_user_id("alice"),
            stay_signed_in,
        )
        .unwrap();
}

#[test]
fn test_signin_arms_timer_at_expiry() {
    let h = harness();

    signin(&h, "tok", 3600, true);

    let session = h.manager.session();
    assert!(session.is_authenticated);
    assert_eq!(session.expires_at, h.runtime.now_secs() + 3600);
    assert_eq!(h.manager.scheduler().armed_for(), Some(session.expires_at));
    assert!(h.manager.monitor().is_listening());
}

#[test]
fn test_expired_without_stay_signed_in_signs_out_without_renewal() {
    let h = harness();
    let (reasons, _subscription) = record_reasons(&h.manager);
    signin(&h, "tok", 5, false);

    h.runtime.advance(Duration::from_secs(5));

    assert!(!h.manager.is_authenticated());
    assert_eq!(h.renewer.calls(), 0);
    assert_eq!(
        reasons.borrow().last(),
        Some(&ChangeReason::SignedOut(SignOutReason::Expired))
    );
    assert!(!h.manager.monitor().is_listening());
    assert_eq!(h.source.listener_count(), 0);
}

#[test]
fn test_successful_renewal_keeps_session_without_prompt() {
    let h = harness();
    let (opened, _subscription) = count_prompts(&h.manager);
    signin(&h, "tok", 5, true);
    let old_expiry = h.manager.session().expires_at;
    h.renewer.push_ok(Credential::new("tok-2", 60));

    h.runtime.advance(Duration::from_secs(5));

    let session = h.manager.session();
    assert!(session.is_authenticated);
    assert_eq!(session.access_token, "tok-2");
    assert!(session.expires_at > old_expiry);
    assert_eq!(opened.get(), 0);
    assert_eq!(h.manager.scheduler().armed_for(), Some(session.expires_at));
}

#[test]
fn test_failed_renewal_then_stay_signed_in() {
    let h = harness();
    signin(&h, "tok", 5, true);
    h.renewer.push_err(RenewalError::Network("offline".to_string()));

    h.runtime.advance(Duration::from_secs(5));
    assert!(h.manager.prompt().is_open());
    assert!(h.manager.monitor().is_paused());

    h.runtime.advance(Duration::from_secs(10));
    assert!(h.manager.prompt().stay_signed_in());

    assert!(h.manager.is_authenticated());
    assert!(!h.manager.monitor().is_paused());
    assert_eq!(
        h.manager.scheduler().armed_for(),
        Some(h.runtime.now_secs() + 5)
    );
}

#[test]
fn test_failed_renewal_then_prompt_timeout() {
    let h = harness();
    let (reasons, _subscription) = record_reasons(&h.manager);
    signin(&h, "tok", 5, true);
    h.renewer.push_err(RenewalError::CredentialExpired);

    h.runtime.advance(Duration::from_secs(5));
    assert!(h.manager.prompt().is_open());

    h.runtime.advance(Duration::from_secs(30));

    assert!(!h.manager.is_authenticated());
    assert!(!h.manager.prompt().is_open());
    let signouts = reasons
        .borrow()
        .iter()
        .filter(|reason| matches!(reason, ChangeReason::SignedOut(_)))
        .count();
    assert_eq!(signouts, 1);
    assert_eq!(
        reasons.borrow().last(),
        Some(&ChangeReason::SignedOut(SignOutReason::PromptTimedOut))
    );
}

/// Run a second renewal for the current session next to the one the
/// expiry timer started
fn spawn_duplicate_renewal(h: &Harness) {
    let scheduler = h.manager.scheduler().clone();
    let record = h.manager.state().raw();
    h.runtime.spawn_local(Box::pin(async move {
        let _ = scheduler.try_renew(record).await;
    }));
    h.runtime.run_until_stalled();
}

#[test]
fn test_duplicate_renewals_keep_only_the_first_to_complete() {
    let h = harness();
    signin(&h, "tok", 5, true);
    let first = h.renewer.push_deferred();
    let second = h.renewer.push_deferred();

    h.runtime.advance(Duration::from_secs(5));
    spawn_duplicate_renewal(&h);
    assert_eq!(h.renewer.calls(), 2);

    let _ = second.send(Ok(Credential::new("tok-b", 60)));
    h.runtime.run_until_stalled();
    let after_second = h.manager.session();

    let _ = first.send(Ok(Credential::new("tok-a", 120)));
    h.runtime.run_until_stalled();

    assert_eq!(h.manager.session(), after_second);
    assert_eq!(h.manager.session().access_token, "tok-b");
    assert!(!h.manager.prompt().is_open());
}

#[test]
fn test_parallel_unauthorized_errors_renew_once() {
    let h = harness();
    signin(&h, "tok", 3600, true);
    let pending = h.renewer.push_deferred();
    let _unused = h.renewer.push_deferred();

    for _ in 0..3 {
        h.manager
            .errors()
            .notify(ServerError::new(401, "token expired"));
    }
    h.runtime.run_until_stalled();
    h.manager.scheduler().expire_now();
    h.runtime.run_until_stalled();

    assert_eq!(h.renewer.calls(), 1);

    let _ = pending.send(Ok(Credential::new("tok-2", 3600)));
    h.runtime.run_until_stalled();

    assert_eq!(h.manager.session().access_token, "tok-2");
    assert!(!h.manager.scheduler().is_renewing());
}

#[test]
fn test_successful_renewal_closes_prompt_of_failed_one() {
    let h = harness();
    signin(&h, "tok", 5, true);
    let failing = h.renewer.push_deferred();
    let succeeding = h.renewer.push_deferred();
    let closed = Rc::new(RefCell::new(Vec::new()));
    let _subscription = {
        let closed = closed.clone();
        h.manager.prompt().subscribe(move |event| {
            if let PromptEvent::Closed(outcome) = event {
                closed.borrow_mut().push(*outcome);
            }
        })
    };

    h.runtime.advance(Duration::from_secs(5));
    spawn_duplicate_renewal(&h);

    let _ = failing.send(Err(RenewalError::Network("offline".to_string())));
    h.runtime.run_until_stalled();
    assert!(h.manager.prompt().is_open());
    assert!(h.manager.monitor().is_paused());

    let _ = succeeding.send(Ok(Credential::new("tok-2", 60)));
    h.runtime.run_until_stalled();

    assert!(!h.manager.prompt().is_open());
    assert!(!h.manager.monitor().is_paused());
    assert_eq!(*closed.borrow(), vec![PromptOutcome::Superseded]);
    assert!(h.manager.is_authenticated());
    assert_eq!(h.manager.session().access_token, "tok-2");
    assert_eq!(
        h.manager.scheduler().armed_for(),
        Some(h.manager.session().expires_at)
    );
}

#[test]
fn test_sign_out_from_prompt_always_ends_session() {
    let h = harness();
    signin(&h, "tok", 5, true);
    h.renewer.push_err(RenewalError::CredentialExpired);
    h.runtime.advance(Duration::from_secs(5));
    assert!(h.manager.prompt().is_open());

    // A preference saved while prompting neither closes nor supersedes it
    h.manager.set_remembered_username(Some("alice".to_string()));
    assert!(h.manager.prompt().is_open());

    assert!(h.manager.prompt().sign_out());

    assert!(!h.manager.state().raw().is_authenticated);
    assert!(!h.manager.scheduler().is_armed());
}

#[test]
fn test_preferences_while_prompting_keep_session() {
    let h = harness();
    let (reasons, _subscription) = record_reasons(&h.manager);
    signin(&h, "tok", 5, true);
    h.renewer.push_err(RenewalError::Network("offline".to_string()));
    h.runtime.advance(Duration::from_secs(5));
    assert!(h.manager.prompt().is_open());

    h.manager.set_remembered_username(Some("alice".to_string()));

    assert!(h.manager.prompt().is_open());
    assert!(h.manager.state().raw().is_authenticated);
    assert_eq!(reasons.borrow().last(), Some(&ChangeReason::Preferences));

    assert!(h.manager.prompt().stay_signed_in());
    assert!(h.manager.is_authenticated());
    assert_eq!(h.manager.session().remembered_username.as_deref(), Some("alice"));
}

#[test]
fn test_stale_failure_does_not_prompt() {
    let h = harness();
    signin(&h, "tok", 5, true);
    let pending = h.renewer.push_deferred();
    h.runtime.advance(Duration::from_secs(5));

    h.manager.sign_out();
    let _ = pending.send(Err(RenewalError::CredentialExpired));
    h.runtime.run_until_stalled();

    assert!(!h.manager.prompt().is_open());
    assert!(!h.manager.is_authenticated());
}

#[test]
fn test_idle_user_is_signed_out_at_expiry() {
    let config = SessionConfig {
        idle_timeout_secs: 60,
        check_interval_secs: 10,
        ..test_config()
    };
    let h = harness_with(config, ManualRuntime::new(START_MS), MemoryStore::new());
    let (reasons, _subscription) = record_reasons(&h.manager);
    signin(&h, "tok", 300, true);

    h.runtime.advance(Duration::from_secs(300));

    assert!(!h.manager.is_authenticated());
    assert_eq!(h.renewer.calls(), 0);
    assert_eq!(
        reasons.borrow().last(),
        Some(&ChangeReason::SignedOut(SignOutReason::Idle))
    );
}

#[test]
fn test_active_user_is_renewed_at_expiry() {
    let config = SessionConfig {
        idle_timeout_secs: 60,
        check_interval_secs: 10,
        ..test_config()
    };
    let h = harness_with(config, ManualRuntime::new(START_MS), MemoryStore::new());
    signin(&h, "tok", 300, true);
    h.renewer.push_ok(Credential::new("tok-2", 300));

    h.runtime.advance(Duration::from_secs(280));
    h.source.emit();
    h.runtime.advance(Duration::from_secs(20));

    assert_eq!(h.renewer.calls(), 1);
    assert_eq!(h.manager.session().access_token, "tok-2");
}

#[test]
fn test_idle_watch_signs_out_when_enabled() {
    let config = SessionConfig {
        idle_timeout_secs: 60,
        check_interval_secs: 10,
        sign_out_when_idle: true,
        ..test_config()
    };
    let h = harness_with(config, ManualRuntime::new(START_MS), MemoryStore::new());
    let (reasons, _subscription) = record_reasons(&h.manager);
    signin(&h, "tok", 3600, true);

    h.runtime.advance(Duration::from_secs(50));
    assert!(h.manager.is_authenticated());

    h.runtime.advance(Duration::from_secs(10));
    assert!(!h.manager.is_authenticated());
    assert_eq!(
        reasons.borrow().last(),
        Some(&ChangeReason::SignedOut(SignOutReason::Idle))
    );
    assert_eq!(h.manager.monitor().poller_count(), 0);
}

#[test]
fn test_open_prompt_suppresses_idle_watch() {
    let config = SessionConfig {
        idle_timeout_secs: 60,
        check_interval_secs: 10,
        dialog_timeout_secs: 120,
        sign_out_when_idle: true,
        ..SessionConfig::default()
    };
    let h = harness_with(config, ManualRuntime::new(START_MS), MemoryStore::new());
    signin(&h, "tok", 30, true);
    h.renewer.push_err(RenewalError::CredentialExpired);

    h.runtime.advance(Duration::from_secs(30));
    assert!(h.manager.prompt().is_open());

    // The credential has lapsed but the session is held open for the prompt
    h.runtime.advance(Duration::from_secs(60));
    assert!(h.manager.prompt().is_open());
    assert!(h.manager.state().raw().is_authenticated);

    h.manager.prompt().stay_signed_in();
    h.runtime.advance(Duration::from_secs(10));
    assert!(!h.manager.is_authenticated());
}

#[test]
fn test_resignin_restarts_idle_watch() {
    let config = SessionConfig {
        idle_timeout_secs: 60,
        check_interval_secs: 10,
        sign_out_when_idle: true,
        ..test_config()
    };
    let h = harness_with(config, ManualRuntime::new(START_MS), MemoryStore::new());
    signin(&h, "tok", 3600, true);
    h.manager.sign_out();
    signin(&h, "tok-2", 3600, true);

    h.runtime.advance(Duration::from_secs(30));
    assert!(h.manager.is_authenticated());
    assert_eq!(h.manager.monitor().poller_count(), 1);
}

#[test]
fn test_unauthorized_server_error_runs_expiry() {
    let h = harness();
    let (reasons, _subscription) = record_reasons(&h.manager);
    signin(&h, "tok", 3600, false);

    h.manager
        .errors()
        .notify(ServerError::new(403, "forbidden"));
    assert!(h.manager.is_authenticated());

    h.manager
        .errors()
        .notify(ServerError::new(401, "token expired"));
    assert!(!h.manager.is_authenticated());
    assert_eq!(
        reasons.borrow().last(),
        Some(&ChangeReason::SignedOut(SignOutReason::Expired))
    );
}

#[test]
fn test_bootstrap_round_trip() {
    let runtime = ManualRuntime::new(START_MS);
    let store = MemoryStore::new();
    let first = harness_with(test_config(), runtime.clone(), store.clone());
    signin(&first, "tok", 3600, true);
    let original = first.manager.session();
    first.manager.shutdown();

    runtime.advance(Duration::from_secs(60));
    let second = harness_with(test_config(), runtime.clone(), store);
    let outcome = runtime.block_on(second.manager.init_session());

    assert!(matches!(outcome, BootstrapOutcome::Resumed { .. }));
    let restored = second.manager.session();
    assert_eq!(restored.is_authenticated, original.is_authenticated);
    assert_eq!(restored.user_id, original.user_id);
    assert_eq!(restored.stay_signed_in, original.stay_signed_in);
    assert!(restored.expires_at > runtime.now_secs());
    assert!(second.manager.scheduler().is_armed());
    assert!(second.manager.monitor().is_listening());
}

#[test]
fn test_bootstrap_without_persisted_state() {
    let h = harness();

    let outcome = h.runtime.block_on(h.manager.init_session());

    assert_eq!(outcome, BootstrapOutcome::Unauthenticated);
    assert!(!h.manager.scheduler().is_armed());
    assert!(!h.manager.monitor().is_listening());
}

#[test]
fn test_bootstrap_ignores_corrupted_record() {
    let h = harness();
    h.store.set("tenure_AUTH", "{\"isAuthenticated\": tru").unwrap();

    let outcome = h.runtime.block_on(h.manager.init_session());

    assert_eq!(outcome, BootstrapOutcome::Unauthenticated);
}

#[test]
fn test_bootstrap_renews_expired_session() {
    let runtime = ManualRuntime::new(START_MS);
    let store = MemoryStore::new();
    let first = harness_with(test_config(), runtime.clone(), store.clone());
    signin(&first, "tok", 60, true);
    first.manager.shutdown();

    runtime.set_now_ms(START_MS + 3_600_000);
    let second = harness_with(test_config(), runtime.clone(), store);
    second.renewer.push_ok(Credential::new("tok-2", 600));

    let outcome = runtime.block_on(second.manager.init_session());

    assert_eq!(
        outcome,
        BootstrapOutcome::Renewed {
            expires_at: runtime.now_secs() + 600
        }
    );
    assert_eq!(second.renewer.tokens_seen(), vec!["tok".to_string()]);
    assert!(second.manager.is_authenticated());
    assert!(second.manager.scheduler().is_armed());
}

#[test]
fn test_bootstrap_signs_out_when_renewal_fails() {
    let runtime = ManualRuntime::new(START_MS);
    let store = MemoryStore::new();
    let first = harness_with(test_config(), runtime.clone(), store.clone());
    signin(&first, "tok", 60, true);
    first.manager.shutdown();

    runtime.set_now_ms(START_MS + 3_600_000);
    let second = harness_with(test_config(), runtime.clone(), store.clone());
    second.renewer.push_err(RenewalError::CredentialExpired);

    let outcome = runtime.block_on(second.manager.init_session());

    assert_eq!(outcome, BootstrapOutcome::SignedOut);
    assert!(!second.manager.is_authenticated());
    assert!(!second.manager.prompt().is_open());
    let persisted = store.raw("tenure_AUTH").unwrap();
    assert!(persisted.contains("\"isAuthenticated\":false"));
}

#[test]
fn test_bootstrap_expired_without_stay_signed_in() {
    let runtime = ManualRuntime::new(START_MS);
    let store = MemoryStore::new();
    let first = harness_with(test_config(), runtime.clone(), store.clone());
    signin(&first, "tok", 60, false);
    first.manager.shutdown();

    runtime.set_now_ms(START_MS + 120_000);
    let second = harness_with(test_config(), runtime.clone(), store);

    let outcome = runtime.block_on(second.manager.init_session());

    assert_eq!(outcome, BootstrapOutcome::SignedOut);
    assert_eq!(second.renewer.calls(), 0);
}

#[test]
fn test_bootstrap_runs_once() {
    let runtime = ManualRuntime::new(START_MS);
    let store = MemoryStore::new();
    let first = harness_with(test_config(), runtime.clone(), store.clone());
    signin(&first, "tok", 60, true);
    first.manager.shutdown();

    runtime.set_now_ms(START_MS + 3_600_000);
    let second = harness_with(test_config(), runtime.clone(), store);
    second.renewer.push_err(RenewalError::CredentialExpired);
    let _ = runtime.block_on(second.manager.init_session());

    let again = runtime.block_on(second.manager.init_session());

    assert_eq!(again, BootstrapOutcome::Unauthenticated);
    assert_eq!(second.renewer.calls(), 1);
}

#[test]
fn test_two_tabs_share_activity_clock() {
    let config = SessionConfig {
        idle_timeout_secs: 60,
        check_interval_secs: 10,
        ..test_config()
    };
    let runtime = ManualRuntime::new(START_MS);
    let store = MemoryStore::new();
    let tab_a = harness_with(config.clone(), runtime.clone(), store.clone());
    let tab_b = harness_with(config, runtime.clone(), store);
    signin(&tab_a, "tok", 300, true);
    let _ = runtime.block_on(tab_b.manager.init_session());
    tab_b.renewer.push_ok(Credential::new("tok-b", 300));
    tab_a.renewer.push_ok(Credential::new("tok-a", 300));

    // Only tab A sees input; tab B must still consider the user active
    runtime.advance(Duration::from_secs(280));
    tab_a.source.emit();
    runtime.advance(Duration::from_secs(20));

    assert!(tab_a.manager.is_authenticated());
    assert!(tab_b.manager.is_authenticated());
    assert_eq!(tab_b.renewer.calls(), 1);
}

#[test]
fn test_shutdown_releases_everything() {
    let h = harness();
    signin(&h, "tok", 3600, true);
    let _stream = h.manager.monitor().is_active();

    h.manager.shutdown();
    h.manager.shutdown();

    assert_eq!(h.source.listener_count(), 0);
    assert_eq!(h.runtime.pending_timers(), 0);
    assert!(h.manager.is_authenticated());
}

#[test]
fn test_remembered_username_survives_signout() {
    let h = harness();
    h.manager
        .set_remembered_username(Some("alice@example.com".to_string()));
    signin(&h, "tok", 3600, true);

    h.manager.sign_out();

    let session = h.manager.session();
    assert!(session.remember_me);
    assert_eq!(
        session.remembered_username.as_deref(),
        Some("alice@example.com")
    );
}

#[test]
fn test_builder_rejects_invalid_config() {
    let result = SessionManager::builder()
        .config(SessionConfig {
            idle_timeout_secs: 10,
            check_interval_secs: 20,
            ..SessionConfig::default()
        })
        .runtime(Rc::new(ManualRuntime::new(START_MS)))
        .store(Rc::new(MemoryStore::new()))
        .activity_source(Rc::new(ManualActivitySource::new()))
        .renewer(Rc::new(ScriptedRenewer::new()))
        .build();

    assert!(result.is_err());
}
