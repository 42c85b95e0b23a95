mod common;

use anyhow::{Context, Result};
use axum::http::StatusCode;
use common::{acquire_db_lock, image, json_body, TestApp, ADMIN, PARTICIPANT};
use diesel::prelude::*;
use rally::schema::{photography, user_votes_control};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Deserialize)]
struct Listed {
    id_user: i32,
    email: String,
    rol: String,
}

#[tokio::test]
async fn admin_endpoints_require_an_admin_token() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let ana = app
        .insert_user("Ana", "ana@example.com", "pw", PARTICIPANT)
        .await?;
    let participant = app.login_token("ana@example.com", "pw").await?;

    let response = app.get("/admin/users", None).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app.get("/admin/users", Some(&participant)).await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .delete(&format!("/admin/users/{ana}"), Some(&participant))
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .put_json(
            "/admin/users",
            &json!({ "id_user": ana, "rol": ADMIN }),
            Some(&participant),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn admin_lists_and_updates_users() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let root = app
        .insert_user("Root", "root@example.com", "pw", ADMIN)
        .await?;
    let ana = app
        .insert_user("Ana", "ana@example.com", "pw", PARTICIPANT)
        .await?;
    let token = app.login_token("root@example.com", "pw").await?;

    let users: Vec<Listed> = json_body(app.get("/admin/users", Some(&token)).await?).await?;
    assert_eq!(
        users.iter().map(|user| user.id_user).collect::<Vec<_>>(),
        vec![root, ana]
    );
    assert_eq!(users[1].email, "ana@example.com");

    let response = app
        .put_json("/admin/users", &json!({ "rol": ADMIN }), Some(&token))
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = json_body(response).await?;
    assert_eq!(body["errors"], json!(["id_user is required"]));

    let response = app
        .put_json(
            "/admin/users",
            &json!({ "id_user": ana, "rol": "superuser" }),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .put_json(
            "/admin/users",
            &json!({ "id_user": ana, "name": "n".repeat(101) }),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = json_body(response).await?;
    assert_eq!(body["errors"], json!(["name must be at most 100 characters"]));

    let response = app
        .put_json(
            "/admin/users",
            &json!({ "id_user": ana, "email": format!("{}@example.com", "a".repeat(250)) }),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .put_json(
            "/admin/users",
            &json!({ "id_user": ana, "email": "root@example.com" }),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .put_json(
            "/admin/users",
            &json!({ "id_user": ana, "rol": ADMIN, "email": "ana@rally.test" }),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let users: Vec<Listed> = json_body(app.get("/admin/users", Some(&token)).await?).await?;
    assert_eq!(users[1].rol, ADMIN);
    assert_eq!(users[1].email, "ana@rally.test");

    let promoted = app.login_token("ana@rally.test", "pw").await?;
    let response = app.get("/admin/users", Some(&promoted)).await?;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .put_json(
            "/admin/users",
            &json!({ "id_user": 9999, "name": "Ghost" }),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn deleting_a_user_removes_votes_and_orphans_photos() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let id_rally = app.insert_rally("Winter", 0, 2).await?;
    app.insert_config(id_rally, 3).await?;
    app.insert_user("Root", "root@example.com", "pw", ADMIN)
        .await?;
    let ana = app
        .insert_user("Ana", "ana@example.com", "pw", PARTICIPANT)
        .await?;
    let bea = app
        .insert_user("Bea", "bea@example.com", "pw", PARTICIPANT)
        .await?;
    let token = app.login_token("root@example.com", "pw").await?;

    let mut photo_ids = Vec::new();
    for (owner, seed) in [(ana, 1), (bea, 2)] {
        let response = app
            .post_json(
                "/photos",
                &json!({ "id_user": owner, "title": "entry", "file": image(seed) }),
                None,
            )
            .await?;
        assert_eq!(response.status(), StatusCode::CREATED);
        let body: Value = json_body(response).await?;
        let id_photo = body["id_photo"].as_i64().context("missing id_photo")? as i32;
        app.set_photo_state(id_photo, "aceptada").await?;
        photo_ids.push(id_photo);
    }
    let (ana_photo, bea_photo) = (photo_ids[0], photo_ids[1]);

    let response = app
        .post_json(
            "/user_votes_control",
            &json!({ "id_user": ana, "id_photo": bea_photo }),
            None,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app.delete(&format!("/admin/users/{ana}"), Some(&token)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = json_body(response).await?;
    assert_eq!(body, json!({ "deleted": true }));

    let (owner, remaining_votes, bea_total): (Option<i32>, i64, i32) = app
        .with_conn(move |conn| {
            let owner = photography::table
                .find(ana_photo)
                .select(photography::id_user)
                .first::<Option<i32>>(conn)
                .context("photo should survive its owner")?;
            let votes = user_votes_control::table
                .filter(user_votes_control::id_user.eq(ana))
                .count()
                .get_result(conn)
                .context("failed to count votes")?;
            let total = photography::table
                .find(bea_photo)
                .select(photography::total_votes)
                .first::<i32>(conn)
                .context("failed to read vote total")?;
            Ok((owner, votes, total))
        })
        .await?;
    assert_eq!(owner, None);
    assert_eq!(remaining_votes, 0);
    assert_eq!(bea_total, 0);

    let votes: Vec<Value> = json_body(
        app.get(&format!("/user_votes_control?id_user={ana}"), None)
            .await?,
    )
    .await?;
    assert!(votes.is_empty());

    let response = app.delete(&format!("/admin/users/{ana}"), Some(&token)).await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.delete("/admin/users/not-a-number", Some(&token)).await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    app.cleanup().await?;
    Ok(())
}
