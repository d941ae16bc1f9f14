// HTTP contract tests for `ApiClient` against a mock server.

use std::sync::Arc;

use medivision_api::{ApiClient, ApiError, ApiResponse, ImageUpload, SessionState};
use medivision_core::model::{ProfileUpdate, RegisterData, SignupOtpRequest};
use medivision_core::storage::{Store, TOKEN_KEY};
use mockito::{Matcher, Server};
use serde_json::json;

// ===========================================================================
// Test helpers
// ===========================================================================

fn user_json(role: &str) -> serde_json::Value {
    json!({
        "id": "u1",
        "name": "Rahim Uddin",
        "email": "rahim@example.com",
        "role": role,
        "phone": "01700000000"
    })
}

fn login_json(token: &str) -> String {
    json!({ "user": user_json("user"), "access_token": token }).to_string()
}

fn client_for(server: &Server) -> (ApiClient, Arc<Store>) {
    let store = Arc::new(Store::open_in_memory().unwrap());
    (ApiClient::new(&server.url(), Arc::clone(&store)), store)
}

// ===========================================================================
// Authentication
// ===========================================================================

#[tokio::test]
async fn send_otp_posts_email_once() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/auth/send-otp")
        .match_header("content-type", "application/json")
        .match_body(Matcher::Json(json!({ "email": "rahim@example.com" })))
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(r#"{"message":"OTP sent"}"#)
        .expect(1)
        .create_async()
        .await;

    let (client, _store) = client_for(&server);
    let resp = client.send_otp("rahim@example.com").await.unwrap();

    assert_eq!(resp.message, "OTP sent");
    assert_eq!(
        client.session_state(),
        SessionState::OtpPending {
            email: "rahim@example.com".into()
        }
    );
    mock.assert_async().await;
}

#[tokio::test]
async fn send_otp_failure_uses_server_message() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/auth/send-otp")
        .with_status(404)
        .with_body(r#"{"statusCode":404,"message":"User not found"}"#)
        .create_async()
        .await;

    let (client, _store) = client_for(&server);
    let response: ApiResponse<_> = client.send_otp("ghost@example.com").await.into();

    assert!(response.data.is_none());
    assert_eq!(response.error.as_deref(), Some("User not found"));
    assert_eq!(client.session_state(), SessionState::Anonymous);
}

#[tokio::test]
async fn html_error_page_yields_status_line() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/auth/send-otp")
        .with_status(502)
        .with_header("content-type", "text/html")
        .with_body("<html><body>Bad Gateway</body></html>")
        .create_async()
        .await;

    let (client, _store) = client_for(&server);
    let err = client.send_otp("rahim@example.com").await.unwrap_err();
    assert_eq!(err.to_string(), "Server error: 502 Bad Gateway");
}

#[tokio::test]
async fn verify_otp_stores_token_and_authenticates() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/auth/send-otp")
        .with_status(201)
        .with_body(r#"{"message":"OTP sent"}"#)
        .create_async()
        .await;
    let verify = server
        .mock("POST", "/auth/verify-otp")
        .match_body(Matcher::Json(json!({ "email": "rahim@example.com", "otp": "1234" })))
        .with_status(200)
        .with_body(login_json("tok-abc"))
        .create_async()
        .await;

    let (client, store) = client_for(&server);
    client.send_otp("rahim@example.com").await.unwrap();
    let login = client.verify_otp("rahim@example.com", "1234").await.unwrap();

    assert_eq!(login.user.email, "rahim@example.com");
    assert_eq!(client.session_state(), SessionState::Authenticated);
    assert_eq!(store.get(TOKEN_KEY).unwrap().as_deref(), Some("tok-abc"));
    verify.assert_async().await;
}

#[tokio::test]
async fn failed_verification_stays_pending() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/auth/send-otp")
        .with_status(201)
        .with_body(r#"{"message":"OTP sent"}"#)
        .create_async()
        .await;
    server
        .mock("POST", "/auth/verify-otp")
        .with_status(400)
        .with_body(r#"{"message":"Invalid or expired OTP"}"#)
        .create_async()
        .await;

    let (client, store) = client_for(&server);
    client.send_otp("rahim@example.com").await.unwrap();
    let err = client.verify_otp("rahim@example.com", "0000").await.unwrap_err();

    assert_eq!(err.to_string(), "Invalid or expired OTP");
    assert!(matches!(
        client.session_state(),
        SessionState::OtpPending { .. }
    ));
    assert_eq!(store.get(TOKEN_KEY).unwrap(), None);
}

#[tokio::test]
async fn password_login_stores_token() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/auth/login")
        .match_body(Matcher::Json(
            json!({ "email": "rahim@example.com", "password": "secret" }),
        ))
        .with_status(201)
        .with_body(login_json("tok-pw"))
        .create_async()
        .await;

    let (client, _store) = client_for(&server);
    client.login("rahim@example.com", "secret").await.unwrap();
    assert_eq!(client.session().token().as_deref(), Some("tok-pw"));
}

#[tokio::test]
async fn register_sends_only_present_fields() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/auth/register")
        .match_body(Matcher::Json(json!({
            "name": "Karim",
            "email": "karim@example.com",
            "password": "pw",
            "dateOfBirth": "1995-03-04"
        })))
        .with_status(201)
        .with_body(login_json("tok-reg"))
        .create_async()
        .await;

    let (client, _store) = client_for(&server);
    let data = RegisterData {
        name: "Karim".into(),
        email: "karim@example.com".into(),
        password: "pw".into(),
        date_of_birth: Some("1995-03-04".into()),
        ..Default::default()
    };
    client.register(&data).await.unwrap();

    mock.assert_async().await;
    assert!(client.session().is_authenticated());
}

#[tokio::test]
async fn signup_otp_flow() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/auth/send-otp-for-signup")
        .match_body(Matcher::Json(
            json!({ "name": "Karim", "email": "karim@example.com" }),
        ))
        .with_status(201)
        .with_body(r#"{"message":"OTP sent for signup"}"#)
        .create_async()
        .await;
    server
        .mock("POST", "/auth/verify-otp-for-signup")
        .match_body(Matcher::Json(json!({ "email": "karim@example.com", "otp": "9876" })))
        .with_status(201)
        .with_body(login_json("tok-signup"))
        .create_async()
        .await;

    let (client, _store) = client_for(&server);
    let request = SignupOtpRequest {
        name: "Karim".into(),
        email: "karim@example.com".into(),
    };
    client.send_otp_for_signup(&request).await.unwrap();
    assert!(matches!(
        client.session_state(),
        SessionState::OtpPending { ref email } if email == "karim@example.com"
    ));

    client
        .verify_otp_for_signup("karim@example.com", "9876")
        .await
        .unwrap();
    assert_eq!(client.session().token().as_deref(), Some("tok-signup"));
}

// ===========================================================================
// Session token handling
// ===========================================================================

#[tokio::test]
async fn stored_token_is_sent_verbatim() {
    let mut server = Server::new_async().await;
    let token = "eyJhbGciOiJIUzI1NiJ9.payload.sig";
    let mock = server
        .mock("GET", "/users/profile")
        .match_header("authorization", format!("Bearer {token}").as_str())
        .with_status(200)
        .with_body(user_json("user").to_string())
        .create_async()
        .await;

    let (client, _store) = client_for(&server);
    client.set_auth_token(token);
    let user = client.get_profile().await.unwrap();

    assert_eq!(user.name, "Rahim Uddin");
    mock.assert_async().await;
}

#[tokio::test]
async fn logout_clears_token_and_profile_short_circuits() {
    let mut server = Server::new_async().await;
    let logout = server
        .mock("POST", "/auth/logout")
        .match_header("authorization", "Bearer tok-1")
        .with_status(201)
        .with_body("")
        .create_async()
        .await;
    let profile = server
        .mock("GET", "/users/profile")
        .expect(0)
        .create_async()
        .await;

    let (client, store) = client_for(&server);
    client.set_auth_token("tok-1");
    client.logout().await.unwrap();

    assert_eq!(store.get(TOKEN_KEY).unwrap(), None);
    let err = client.get_profile().await.unwrap_err();
    assert_eq!(err, ApiError::NotAuthenticated);
    assert_eq!(err.to_string(), "Not authenticated");

    logout.assert_async().await;
    profile.assert_async().await;
}

#[tokio::test]
async fn logout_clears_token_even_when_server_fails() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/auth/logout")
        .with_status(500)
        .with_body(r#"{"message":"Internal server error"}"#)
        .create_async()
        .await;

    let (client, _store) = client_for(&server);
    client.set_auth_token("tok-1");
    assert!(client.logout().await.is_err());
    assert!(!client.session().is_authenticated());
}

#[tokio::test]
async fn logout_without_session_is_noop() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/auth/logout")
        .expect(0)
        .create_async()
        .await;

    let (client, _store) = client_for(&server);
    assert!(client.logout().await.is_ok());
    mock.assert_async().await;
}

#[tokio::test]
async fn unauthorized_response_clears_session() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/users/profile")
        .with_status(401)
        .with_body(r#"{"statusCode":401,"message":"Unauthorized"}"#)
        .create_async()
        .await;

    let (client, store) = client_for(&server);
    client.set_auth_token("expired");
    let err = client.get_profile().await.unwrap_err();

    assert!(err.is_unauthorized());
    assert_eq!(err.to_string(), "Unauthorized");
    assert_eq!(client.session_state(), SessionState::Anonymous);
    assert_eq!(store.get(TOKEN_KEY).unwrap(), None);
}

#[tokio::test]
async fn unreachable_server_is_network_error() {
    let store = Arc::new(Store::open_in_memory().unwrap());
    let client = ApiClient::new("http://127.0.0.1:1", store);

    let err = client.send_otp("rahim@example.com").await.unwrap_err();
    assert!(matches!(err, ApiError::Network { .. }));
    assert_eq!(
        err.to_string(),
        "Network error - please check your connection and ensure the server is running"
    );
}

// ===========================================================================
// Profile
// ===========================================================================

#[tokio::test]
async fn update_profile_sends_partial_fields() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("PUT", "/users/profile")
        .match_header("authorization", "Bearer tok")
        .match_body(Matcher::Json(json!({ "phone": "01811111111" })))
        .with_status(200)
        .with_body(user_json("user").to_string())
        .create_async()
        .await;

    let (client, _store) = client_for(&server);
    client.set_auth_token("tok");
    let update = ProfileUpdate {
        phone: Some("01811111111".into()),
        ..Default::default()
    };
    client.update_profile(&update).await.unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn profile_image_upload_is_multipart() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("PUT", "/users/profile/image")
        .match_header("authorization", "Bearer tok")
        .match_header(
            "content-type",
            Matcher::Regex("^multipart/form-data; boundary=".into()),
        )
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex(r#"name="image"; filename="me.png""#.into()),
            Matcher::Regex("(?i)content-type: image/png".into()),
            Matcher::Regex("fakepngbytes".into()),
        ]))
        .with_status(200)
        .with_body(
            json!({
                "id": "u1", "name": "Rahim", "email": "r@example.com",
                "role": "user", "image": "me-123.png"
            })
            .to_string(),
        )
        .create_async()
        .await;

    let (client, _store) = client_for(&server);
    client.set_auth_token("tok");
    let user = client
        .upload_profile_image(ImageUpload::new("me.png", b"fakepngbytes".to_vec()))
        .await
        .unwrap();

    assert_eq!(user.image.as_deref(), Some("me-123.png"));
    mock.assert_async().await;
}

#[tokio::test]
async fn remove_profile_image_uses_delete() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("DELETE", "/users/profile/image")
        .with_status(200)
        .with_body(user_json("user").to_string())
        .create_async()
        .await;

    let (client, _store) = client_for(&server);
    client.set_auth_token("tok");
    let user = client.remove_profile_image().await.unwrap();
    assert!(user.image.is_none());
    mock.assert_async().await;
}

#[tokio::test]
async fn history_passes_limit() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/users/profile/history")
        .match_query(Matcher::UrlEncoded("limit".into(), "10".into()))
        .with_status(200)
        .with_body(
            json!([{
                "id": 1,
                "actionType": "scan",
                "imageData": "scan-1.jpg",
                "resultData": [{"id": "m1", "name": "Napa"}],
                "isSuccessful": true,
                "errorMessage": null,
                "userId": "u1",
                "medicineId": "m1",
                "createdAt": "2024-06-01T08:30:00.000Z",
                "updatedAt": "2024-06-01T08:30:00.000Z"
            }])
            .to_string(),
        )
        .create_async()
        .await;

    let (client, _store) = client_for(&server);
    client.set_auth_token("tok");
    let history = client.get_history(10).await.unwrap();

    assert_eq!(history.len(), 1);
    assert_eq!(
        history[0].top_result().map(|m| m.name.as_str()),
        Some("Napa")
    );
    mock.assert_async().await;
}

#[tokio::test]
async fn history_requires_session() {
    let server = Server::new_async().await;
    let (client, _store) = client_for(&server);
    assert_eq!(
        client.get_history(5).await.unwrap_err(),
        ApiError::NotAuthenticated
    );
}

// ===========================================================================
// Medicines
// ===========================================================================

#[tokio::test]
async fn text_search_unwraps_paginated_envelope() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/medicines")
        .match_query(Matcher::UrlEncoded("search".into(), "napa extra".into()))
        .with_status(200)
        .with_body(
            json!({
                "data": [
                    {"id": 1, "name": "Napa Extra", "brand": "Beximco"},
                    {"id": 2, "name": "Napa", "brand": "Beximco"}
                ],
                "total": 2,
                "page": 1,
                "limit": 10
            })
            .to_string(),
        )
        .create_async()
        .await;

    let (client, _store) = client_for(&server);
    let results = client.search_medicines("napa extra").await.unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].id, "1");
    mock.assert_async().await;
}

#[tokio::test]
async fn text_search_tolerates_null_images() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/medicines")
        .match_query(Matcher::UrlEncoded("search".into(), "napa".into()))
        .with_status(200)
        .with_body(
            json!({
                "data": [
                    {"id": 1, "name": "Napa", "images": ["napa.jpg"]},
                    {"id": 2, "name": "Napa Extra", "images": null}
                ],
                "total": 2
            })
            .to_string(),
        )
        .create_async()
        .await;

    let (client, _store) = client_for(&server);
    let results = client.search_medicines("napa").await.unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].images, vec!["napa.jpg"]);
    assert!(results[1].images.is_empty());
    mock.assert_async().await;
}

#[tokio::test]
async fn text_search_accepts_raw_array_and_optional_auth() {
    let mut server = Server::new_async().await;
    let anonymous = server
        .mock("GET", "/medicines")
        .match_query(Matcher::UrlEncoded("search".into(), "ace".into()))
        .match_header("authorization", Matcher::Missing)
        .with_status(200)
        .with_body(r#"[{"id":"a1","name":"Ace"}]"#)
        .create_async()
        .await;

    let (client, _store) = client_for(&server);
    let results = client.search_medicines("ace").await.unwrap();
    assert_eq!(results[0].name, "Ace");
    anonymous.assert_async().await;

    let signed_in = server
        .mock("GET", "/medicines")
        .match_query(Matcher::UrlEncoded("search".into(), "ace".into()))
        .match_header("authorization", "Bearer tok")
        .with_status(200)
        .with_body("[]")
        .create_async()
        .await;

    client.set_auth_token("tok");
    assert!(client.search_medicines("ace").await.unwrap().is_empty());
    signed_in.assert_async().await;
}

#[tokio::test]
async fn image_search_requires_session_without_network() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/medicines/search-by-image")
        .expect(0)
        .create_async()
        .await;

    let (client, _store) = client_for(&server);
    let err = client
        .search_by_image(ImageUpload::new("box.jpg", b"jpeg".to_vec()))
        .await
        .unwrap_err();

    assert_eq!(err, ApiError::NotAuthenticated);
    mock.assert_async().await;
}

#[tokio::test]
async fn image_search_posts_image_field() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/medicines/search-by-image")
        .match_header("authorization", "Bearer tok")
        .match_body(Matcher::Regex(r#"name="image"; filename="box.jpg""#.into()))
        .with_status(201)
        .with_body(
            json!([{
                "id": "m9",
                "name": "Seclo",
                "similarity": 0.91,
                "matched_image": "seclo_front.jpg",
                "manufacturer": "Square"
            }])
            .to_string(),
        )
        .create_async()
        .await;

    let (client, _store) = client_for(&server);
    client.set_auth_token("tok");
    let results = client
        .search_by_image(ImageUpload::new("box.jpg", b"jpegbytes".to_vec()))
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].matched_image.as_deref(), Some("seclo_front.jpg"));
    assert_eq!(results[0].extra["manufacturer"], json!("Square"));
    mock.assert_async().await;
}

#[tokio::test]
async fn get_medicine_sends_no_token() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/medicines/42")
        .match_header("authorization", Matcher::Missing)
        .with_status(200)
        .with_body(r#"{"id":42,"name":"Fexo","images":["fexo.jpg"]}"#)
        .create_async()
        .await;

    let (client, _store) = client_for(&server);
    client.set_auth_token("tok");
    let medicine = client.get_medicine("42").await.unwrap();

    assert_eq!(medicine.id, "42");
    assert_eq!(
        medicine.image_url(&format!("{}/uploads/medicines", server.url())),
        Some(format!("{}/uploads/medicines/fexo.jpg", server.url()))
    );
    mock.assert_async().await;
}

#[tokio::test]
async fn get_medicine_not_found() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/medicines/404")
        .with_status(404)
        .with_body(r#"{"statusCode":404,"message":"Medicine not found"}"#)
        .create_async()
        .await;

    let (client, _store) = client_for(&server);
    let err = client.get_medicine("404").await.unwrap_err();
    assert_eq!(err.status(), Some(404));
    assert_eq!(err.to_string(), "Medicine not found");
}
