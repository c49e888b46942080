mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

#[tokio::test]
async fn sign_up_then_sign_in_and_read_profile() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let signup = json!({"userName": "linus", "email": "linus@example.com", "password": "s3cret-pass"});
    let res = client.post(server.url("/api/v1/sign-up")).json(&signup).send().await?;
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = client.post(server.url("/api/v1/sign-up")).json(&signup).send().await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .post(server.url("/api/v1/sign-in"))
        .json(&json!({"email": "linus@example.com", "password": "s3cret-pass"}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.json::<Value>().await?;
    let token = body["token"].as_str().unwrap_or_default().to_string();
    assert!(!token.is_empty(), "{}", body);
    assert!(body["result"].get("password").is_none());

    let res = client.get(server.url("/api/v1/profile")).bearer_auth(&token).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.json::<Value>().await?;
    assert_eq!(body["user"]["email"], "linus@example.com");

    // Token accepted from the query string too
    let res = client
        .get(server.url(&format!("/api/v1/verifyToken?token={}", token)))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let res = client.get(server.url("/api/v1/profile")).send().await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    Ok(())
}
