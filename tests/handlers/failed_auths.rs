use axum::http::StatusCode;
use serde_json::json;

use crate::common::*;

#[tokio::test]
async fn test_failed_auths_listed_newest_first() {
    let app = create_test_app();
    let (_, token) = admin_session(&app.state);
    {
        let conn = app.state.db.get().unwrap();
        create_test_license(&conn, "xyz", 1, None);
    }

    for (code, device) in [("nope", "d1"), ("xyz", "d1"), ("xyz", "d2")] {
        send(
            app.router(),
            json_request(
                "POST",
                "/authorize",
                json!({ "code": code, "device_id": device }),
                None,
            ),
        )
        .await;
    }

    let (status, _, body) =
        send(app.router(), empty_request("GET", "/admin/failed-auths", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    let records = body.as_array().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["code"], "xyz");
    assert_eq!(records[0]["device_id"], "d2");
    assert_eq!(records[0]["message"], "device id mismatch");
    assert_eq!(records[1]["code"], "nope");
    assert_eq!(records[1]["message"], "invalid code");

    let (status, _, body) = send(
        app.router(),
        empty_request("GET", "/admin/failed-auths?limit=1", Some(&token)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_bad_limit_is_400() {
    let app = create_test_app();
    let (_, token) = admin_session(&app.state);
    let (status, _, _) = send(
        app.router(),
        empty_request("GET", "/admin/failed-auths?limit=lots", Some(&token)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
