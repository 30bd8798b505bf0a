use std::sync::Arc;
use std::thread;

use chrono::{DateTime, Duration, Utc};
use devicegate::authorizer::{AuthError, Authorizer, RejectReason};
use devicegate::clock::FixedClock;
use devicegate::db::{self, SqliteFailureLog, SqliteLicenseStore, queries};
use devicegate::models::{BindingPatch, DeviceClaim};

use crate::common::*;

fn patch(devices: &[&str]) -> BindingPatch {
    BindingPatch {
        devices: devices.iter().map(|d| d.to_string()).collect(),
        device_name: Some("Laptop".into()),
        os_version: Some("14.2".into()),
        fingerprint: Some("f1".into()),
    }
}

fn reason(result: Result<devicegate::models::LicenseView, AuthError>) -> RejectReason {
    match result {
        Err(AuthError::Rejected(reason)) => reason,
        other => panic!("expected rejection, got {:?}", other),
    }
}

#[test]
fn test_compare_and_swap_requires_current_version() {
    let app = create_test_app();
    let conn = app.state.db.get().unwrap();
    let license = create_test_license(&conn, "abc", 1, None);

    let stale = db::compare_and_swap_binding(&conn, "abc", license.version + 1, &patch(&["d1"]))
        .unwrap();
    assert!(stale.is_none());

    let updated = db::compare_and_swap_binding(&conn, "abc", license.version, &patch(&["d1"]))
        .unwrap()
        .unwrap();
    assert_eq!(updated.devices, vec!["d1".to_string()]);
    assert_eq!(updated.fingerprint.as_deref(), Some("f1"));
    assert_eq!(updated.version, license.version + 1);

    // The version the first swap consumed is now stale
    let replay = db::compare_and_swap_binding(&conn, "abc", license.version, &patch(&["d2"]))
        .unwrap();
    assert!(replay.is_none());
}

#[test]
fn test_reset_clears_binding_and_invalidates_in_flight_swaps() {
    let app = create_test_app();
    let conn = app.state.db.get().unwrap();
    let license = create_test_license(&conn, "abc", 1, None);
    let bound = db::compare_and_swap_binding(&conn, "abc", license.version, &patch(&["d1"]))
        .unwrap()
        .unwrap();

    assert!(queries::reset_license_devices(&conn, &license.id).unwrap());

    let reset = queries::get_license_by_id(&conn, &license.id).unwrap().unwrap();
    assert!(reset.devices.is_empty());
    assert_eq!(reset.device_name, None);
    assert_eq!(reset.fingerprint, None);
    assert_eq!(reset.max_devices, 1);
    assert!(reset.version > bound.version);

    let stale = db::compare_and_swap_binding(&conn, "abc", bound.version, &patch(&["d9"])).unwrap();
    assert!(stale.is_none());
}

#[test]
fn test_single_device_scenario_against_sqlite() {
    let app = create_test_app();
    let conn = app.state.db.get().unwrap();
    create_test_license(&conn, "abc", 1, None);

    let authorizer = Authorizer::new(
        SqliteLicenseStore::new(&conn),
        SqliteFailureLog::new(app.state.failures.clone()),
    );

    let claim = DeviceClaim::new("d1")
        .with_name("Laptop")
        .with_os_version("14.2")
        .with_fingerprint("f1");
    let view = authorizer.authorize("abc", &claim).unwrap();
    assert_eq!(view.fingerprint.as_deref(), Some("f1"));

    // Same device again: allowed, nothing written
    let version = queries::get_license_by_code(&conn, "abc").unwrap().unwrap().version;
    authorizer.authorize("abc", &claim).unwrap();
    let after = queries::get_license_by_code(&conn, "abc").unwrap().unwrap();
    assert_eq!(after.version, version);
    assert_eq!(after.devices, vec!["d1".to_string()]);

    let changed = claim.clone().with_fingerprint("f2");
    assert_eq!(
        reason(authorizer.authorize("abc", &changed)),
        RejectReason::DeviceInfoMismatch
    );

    let failures = app.state.failures.get().unwrap();
    let logged = queries::list_failed_auths(&failures, 10).unwrap();
    assert_eq!(logged.len(), 1);
    assert_eq!(logged[0].code, "abc");
    assert_eq!(logged[0].device_id.as_deref(), Some("d1"));
    assert_eq!(logged[0].fingerprint.as_deref(), Some("f2"));
    assert_eq!(logged[0].message, "device info mismatch");
}

#[test]
fn test_multi_device_limit_logs_once() {
    let app = create_test_app();
    let conn = app.state.db.get().unwrap();
    create_test_license(&conn, "xyz", 2, None);

    let authorizer = Authorizer::new(
        SqliteLicenseStore::new(&conn),
        SqliteFailureLog::new(app.state.failures.clone()),
    );

    authorizer.authorize("xyz", &DeviceClaim::new("d1")).unwrap();
    authorizer.authorize("xyz", &DeviceClaim::new("d2")).unwrap();
    assert_eq!(
        reason(authorizer.authorize("xyz", &DeviceClaim::new("d3"))),
        RejectReason::DeviceLimitReached
    );

    let record = queries::get_license_by_code(&conn, "xyz").unwrap().unwrap();
    assert_eq!(record.devices, vec!["d1".to_string(), "d2".to_string()]);

    let failures = app.state.failures.get().unwrap();
    assert_eq!(queries::count_failed_auths(&failures).unwrap(), 1);
    let logged = queries::list_failed_auths(&failures, 10).unwrap();
    assert_eq!(logged[0].message, "device limit reached");
}

#[test]
fn test_expiry_boundary_is_exclusive() {
    let app = create_test_app();
    let conn = app.state.db.get().unwrap();
    let expires: DateTime<Utc> = DateTime::parse_from_rfc3339("2026-06-01T12:00:00.000250Z")
        .unwrap()
        .with_timezone(&Utc);
    create_test_license(&conn, "abc", 1, Some(expires));

    let log = SqliteFailureLog::new(app.state.failures.clone());

    let at_expiry =
        Authorizer::with_clock(SqliteLicenseStore::new(&conn), log.clone(), FixedClock::new(expires));
    at_expiry.authorize("abc", &DeviceClaim::new("d1")).unwrap();

    let after = Authorizer::with_clock(
        SqliteLicenseStore::new(&conn),
        log,
        FixedClock::new(expires + Duration::microseconds(1)),
    );
    assert_eq!(
        reason(after.authorize("abc", &DeviceClaim::new("d1"))),
        RejectReason::CodeExpired
    );
}

#[test]
fn test_unavailable_failure_log_does_not_mask_rejection() {
    let app = create_test_app();
    let conn = app.state.db.get().unwrap();

    // A pool whose database never got the failure schema
    let dir = tempfile::tempdir().unwrap();
    let broken = db::create_pool(dir.path().join("empty.db")).unwrap();

    let authorizer = Authorizer::new(SqliteLicenseStore::new(&conn), SqliteFailureLog::new(broken));
    assert_eq!(
        reason(authorizer.authorize("missing", &DeviceClaim::new("d1"))),
        RejectReason::InvalidCode
    );
}

#[test]
fn test_concurrent_binds_respect_capacity() {
    let app = create_test_app();
    {
        let conn = app.state.db.get().unwrap();
        create_test_license(&conn, "race", 2, None);
    }

    let db_pool = Arc::new(app.state.db.clone());
    let failures = app.state.failures.clone();

    let handles: Vec<_> = (0..6)
        .map(|i| {
            let db_pool = Arc::clone(&db_pool);
            let failures = failures.clone();
            thread::spawn(move || {
                let conn = db_pool.get().unwrap();
                let authorizer =
                    Authorizer::new(SqliteLicenseStore::new(&conn), SqliteFailureLog::new(failures));
                authorizer.authorize("race", &DeviceClaim::new(format!("device-{}", i)))
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let granted = results.iter().filter(|r| r.is_ok()).count();
    let limited = results
        .iter()
        .filter(|r| matches!(r, Err(AuthError::Rejected(RejectReason::DeviceLimitReached))))
        .count();
    assert_eq!(granted, 2);
    assert_eq!(limited, 4);

    let conn = app.state.db.get().unwrap();
    let record = queries::get_license_by_code(&conn, "race").unwrap().unwrap();
    assert_eq!(record.devices.len(), 2);

    let failures = app.state.failures.get().unwrap();
    assert_eq!(queries::count_failed_auths(&failures).unwrap(), 4);
}
