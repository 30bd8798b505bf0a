use chrono::{DateTime, Utc};
use devicegate::db::queries;
use devicegate::error::AppError;
use devicegate::models::{CreateLicense, UpdateLicense};

use crate::common::*;

fn at(rfc3339: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(rfc3339)
        .unwrap()
        .with_timezone(&Utc)
}

#[test]
fn test_create_and_fetch_license() {
    let app = create_test_app();
    let conn = app.state.db.get().unwrap();

    let expires = at("2030-01-01T00:00:00.123456Z");
    let created = create_test_license(&conn, "abc", 3, Some(expires));
    assert_eq!(created.max_devices, 3);
    assert!(created.devices.is_empty());
    assert_eq!(created.version, 0);

    let by_code = queries::get_license_by_code(&conn, "abc").unwrap().unwrap();
    assert_eq!(by_code.id, created.id);
    assert_eq!(by_code.expires_at, Some(expires), "expiry keeps microseconds");

    let by_id = queries::get_license_by_id(&conn, &created.id).unwrap().unwrap();
    assert_eq!(by_id, by_code);
}

#[test]
fn test_unknown_code_is_none() {
    let app = create_test_app();
    let conn = app.state.db.get().unwrap();
    assert!(queries::get_license_by_code(&conn, "nope").unwrap().is_none());
}

#[test]
fn test_duplicate_code_conflicts() {
    let app = create_test_app();
    let conn = app.state.db.get().unwrap();
    create_test_license(&conn, "abc", 1, None);

    let result = queries::create_license(
        &conn,
        &CreateLicense {
            code: "abc".into(),
            expires_at: None,
            max_devices: 2,
        },
    );
    assert!(matches!(result, Err(AppError::Conflict(_))));
}

#[test]
fn test_create_rejects_bad_input() {
    let app = create_test_app();
    let conn = app.state.db.get().unwrap();

    let empty_code = queries::create_license(
        &conn,
        &CreateLicense {
            code: "  ".into(),
            expires_at: None,
            max_devices: 1,
        },
    );
    assert!(matches!(empty_code, Err(AppError::BadRequest(_))));

    let zero_devices = queries::create_license(
        &conn,
        &CreateLicense {
            code: "zero".into(),
            expires_at: None,
            max_devices: 0,
        },
    );
    assert!(matches!(zero_devices, Err(AppError::BadRequest(_))));
}

#[test]
fn test_update_expiry_and_capacity() {
    let app = create_test_app();
    let conn = app.state.db.get().unwrap();
    let license = create_test_license(&conn, "abc", 1, Some(at("2030-01-01T00:00:00Z")));

    let updated = queries::update_license(
        &conn,
        &license.id,
        &UpdateLicense {
            expires_at: Some(None),
            max_devices: Some(4),
        },
    )
    .unwrap();
    assert_eq!(updated.expires_at, None);
    assert_eq!(updated.max_devices, 4);
    assert_eq!(updated.version, license.version + 1);

    // Absent fields stay untouched
    let unchanged = queries::update_license(&conn, &license.id, &UpdateLicense::default()).unwrap();
    assert_eq!(unchanged.max_devices, 4);
    assert_eq!(unchanged.version, updated.version);
}

#[test]
fn test_update_cannot_drop_below_bound_devices() {
    let app = create_test_app();
    let conn = app.state.db.get().unwrap();
    let license = create_test_license(&conn, "xyz", 3, None);

    let patch = devicegate::models::BindingPatch {
        devices: vec!["d1".into(), "d2".into()],
        device_name: None,
        os_version: None,
        fingerprint: None,
    };
    devicegate::db::compare_and_swap_binding(&conn, "xyz", license.version, &patch)
        .unwrap()
        .unwrap();

    let result = queries::update_license(
        &conn,
        &license.id,
        &UpdateLicense {
            expires_at: None,
            max_devices: Some(1),
        },
    );
    assert!(matches!(result, Err(AppError::BadRequest(_))));

    let ok = queries::update_license(
        &conn,
        &license.id,
        &UpdateLicense {
            expires_at: None,
            max_devices: Some(2),
        },
    )
    .unwrap();
    assert_eq!(ok.max_devices, 2);
}

#[test]
fn test_update_missing_license_is_not_found() {
    let app = create_test_app();
    let conn = app.state.db.get().unwrap();
    let result = queries::update_license(&conn, "missing", &UpdateLicense::default());
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[test]
fn test_list_and_delete() {
    let app = create_test_app();
    let conn = app.state.db.get().unwrap();
    let a = create_test_license(&conn, "a", 1, None);
    create_test_license(&conn, "b", 2, None);

    assert_eq!(queries::list_licenses(&conn).unwrap().len(), 2);

    assert!(queries::delete_license(&conn, &a.id).unwrap());
    assert!(!queries::delete_license(&conn, &a.id).unwrap());

    let remaining = queries::list_licenses(&conn).unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].code, "b");
}
