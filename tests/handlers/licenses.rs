use axum::http::StatusCode;
use serde_json::json;

use crate::common::*;

#[tokio::test]
async fn test_create_get_list_license() {
    let app = create_test_app();
    let (_, token) = admin_session(&app.state);

    let (status, _, created) = send(
        app.router(),
        json_request(
            "POST",
            "/admin/licenses",
            json!({ "code": "abc", "max_devices": 2, "expires_at": "2030-01-01T00:00:00Z" }),
            Some(&token),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["code"], "abc");
    assert_eq!(created["max_devices"], 2);
    assert_eq!(created["devices"], json!([]));
    let id = created["id"].as_str().unwrap().to_string();

    let (status, _, fetched) = send(
        app.router(),
        empty_request("GET", &format!("/admin/licenses/{}", id), Some(&token)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["code"], "abc");

    let (status, _, listed) =
        send(app.router(), empty_request("GET", "/admin/licenses", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_create_defaults_to_single_device() {
    let app = create_test_app();
    let (_, token) = admin_session(&app.state);

    let (status, _, created) = send(
        app.router(),
        json_request("POST", "/admin/licenses", json!({ "code": "solo" }), Some(&token)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["max_devices"], 1);
    assert_eq!(created["expires_at"], serde_json::Value::Null);
}

#[tokio::test]
async fn test_duplicate_code_is_409() {
    let app = create_test_app();
    let (_, token) = admin_session(&app.state);
    {
        let conn = app.state.db.get().unwrap();
        create_test_license(&conn, "abc", 1, None);
    }

    let (status, _, body) = send(
        app.router(),
        json_request("POST", "/admin/licenses", json!({ "code": "abc" }), Some(&token)),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_update_license() {
    let app = create_test_app();
    let (_, token) = admin_session(&app.state);
    let license = {
        let conn = app.state.db.get().unwrap();
        create_test_license(&conn, "abc", 1, None)
    };

    let (status, _, updated) = send(
        app.router(),
        json_request(
            "PUT",
            &format!("/admin/licenses/{}", license.id),
            json!({ "max_devices": 3, "expires_at": "2031-05-05T00:00:00Z" }),
            Some(&token),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["max_devices"], 3);
    assert_eq!(updated["code"], "abc");
    assert!(updated["expires_at"].as_str().unwrap().starts_with("2031-05-05"));

    let (status, _, cleared) = send(
        app.router(),
        json_request(
            "PUT",
            &format!("/admin/licenses/{}", license.id),
            json!({ "expires_at": null }),
            Some(&token),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cleared["expires_at"], serde_json::Value::Null);
    assert_eq!(cleared["max_devices"], 3);
}

#[tokio::test]
async fn test_reset_lets_a_new_device_bind() {
    let app = create_test_app();
    let (_, token) = admin_session(&app.state);
    let license = {
        let conn = app.state.db.get().unwrap();
        create_test_license(&conn, "abc", 1, None)
    };

    let bind = |device: &str| {
        json_request(
            "POST",
            "/authorize",
            json!({ "code": "abc", "device_id": device }),
            None,
        )
    };

    let (status, _, _) = send(app.router(), bind("d1")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _, _) = send(app.router(), bind("d2")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, reset) = send(
        app.router(),
        empty_request(
            "POST",
            &format!("/admin/licenses/{}/reset", license.id),
            Some(&token),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reset["devices"], json!([]));

    let (status, _, _) = send(app.router(), bind("d2")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_delete_license() {
    let app = create_test_app();
    let (_, token) = admin_session(&app.state);
    let license = {
        let conn = app.state.db.get().unwrap();
        create_test_license(&conn, "abc", 1, None)
    };
    let uri = format!("/admin/licenses/{}", license.id);

    let (status, _, body) = send(app.router(), empty_request("DELETE", &uri, Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], true);

    let (status, _, _) = send(app.router(), empty_request("GET", &uri, Some(&token))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, _) = send(app.router(), empty_request("DELETE", &uri, Some(&token))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
