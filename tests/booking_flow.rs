//! End-to-end booking flows against a real Postgres (`DATABASE_URL`).
//! Run with `cargo test -- --ignored`.

mod common;

use axum::http::{Method, StatusCode};
use chrono::{DateTime, Duration, DurationRound, SecondsFormat, Utc};
use serde_json::json;
use sqlx::PgPool;

use common::{body_json, build_test_app, get, login, patch_json, post_json, send};
use zagadogs_admin::domain::{AppointmentFields, AppointmentStatus};
use zagadogs_admin::repo::{
    AppointmentChanges, AppointmentRepo, ClientInput, ClientRepo, DogInput, DogRepo, GuardedUpdate,
};

async fn seed_client_and_dog(pool: &PgPool, phone: Option<&str>) -> (i64, i64) {
    let client = ClientRepo::create(
        pool,
        &ClientInput {
            first_name: "Maria".into(),
            last_name: "Rossi".into(),
            phone: phone.map(str::to_string),
            email: None,
        },
    )
    .await
    .unwrap();
    let dog = DogRepo::create(
        pool,
        &DogInput {
            client_id: client.id,
            name: "Fido".into(),
            breed: None,
            notes: None,
        },
    )
    .await
    .unwrap();
    (client.id, dog.id)
}

fn in_two_days() -> String {
    (Utc::now() + Duration::days(2)).to_rfc3339()
}

/// Whole-minute instant `days` from now, so it round-trips through Postgres unchanged.
fn minute_in_days(days: i64) -> DateTime<Utc> {
    (Utc::now() + Duration::days(days))
        .duration_trunc(Duration::minutes(1))
        .unwrap()
}

fn stamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn returned_start(json: &serde_json::Value) -> Option<DateTime<Utc>> {
    json["data"]["starts_at"].as_str().map(|s| s.parse().unwrap())
}

async fn seed_appointment(pool: &PgPool, client_id: i64, dog_id: i64, starts_at: Option<DateTime<Utc>>) -> i64 {
    AppointmentRepo::create(
        pool,
        AppointmentFields {
            client_id,
            dog_id,
            starts_at,
            status: AppointmentStatus::Pending,
            notes: None,
        },
    )
    .await
    .unwrap()
    .id
}

// ---------------------------------------------------------------------------
// Repository: status reconciliation on every write
// ---------------------------------------------------------------------------

#[sqlx::test]
#[ignore = "needs DATABASE_URL"]
async fn status_follows_starts_at_on_every_save(pool: PgPool) {
    let (client_id, dog_id) = seed_client_and_dog(&pool, None).await;

    let created = AppointmentRepo::create(
        &pool,
        AppointmentFields {
            client_id,
            dog_id,
            starts_at: None,
            status: AppointmentStatus::Confirmed,
            notes: None,
        },
    )
    .await
    .unwrap();
    assert_eq!(created.status, AppointmentStatus::Pending);

    let at = Utc::now() + Duration::days(1);
    let scheduled = AppointmentRepo::update(
        &pool,
        created.id,
        &AppointmentChanges {
            starts_at: Some(Some(at)),
            ..AppointmentChanges::default()
        },
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(scheduled.status, AppointmentStatus::Confirmed);

    let cancelled = AppointmentRepo::update(
        &pool,
        created.id,
        &AppointmentChanges {
            status: Some(AppointmentStatus::Cancelled),
            starts_at: Some(None),
            ..AppointmentChanges::default()
        },
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(cancelled.status, AppointmentStatus::Cancelled);

    assert!(AppointmentRepo::update(&pool, 999_999, &AppointmentChanges::default())
        .await
        .unwrap()
        .is_none());
}

#[sqlx::test]
#[ignore = "needs DATABASE_URL"]
async fn guarded_update_refuses_scheduled_rows(pool: PgPool) {
    let (client_id, dog_id) = seed_client_and_dog(&pool, None).await;
    let row = AppointmentRepo::create(
        &pool,
        AppointmentFields {
            client_id,
            dog_id,
            starts_at: Some(Utc::now() + Duration::days(1)),
            status: AppointmentStatus::Pending,
            notes: None,
        },
    )
    .await
    .unwrap();

    let outcome = AppointmentRepo::update_guarded(
        &pool,
        row.id,
        &AppointmentChanges::default(),
        |f| f.starts_at.is_none(),
    )
    .await
    .unwrap();
    assert!(matches!(outcome, GuardedUpdate::Rejected));
}

#[sqlx::test]
#[ignore = "needs DATABASE_URL"]
async fn deleting_a_client_cascades(pool: PgPool) {
    let (client_id, dog_id) = seed_client_and_dog(&pool, None).await;
    let appt = AppointmentRepo::create(
        &pool,
        AppointmentFields {
            client_id,
            dog_id,
            starts_at: None,
            status: AppointmentStatus::Pending,
            notes: None,
        },
    )
    .await
    .unwrap();

    assert!(ClientRepo::delete(&pool, client_id).await.unwrap());
    assert!(DogRepo::find_by_id(&pool, dog_id).await.unwrap().is_none());
    assert!(AppointmentRepo::find_by_id(&pool, appt.id).await.unwrap().is_none());
}

// ---------------------------------------------------------------------------
// HTTP: calendar create with the WhatsApp confirmation rule
// ---------------------------------------------------------------------------

#[sqlx::test]
#[ignore = "needs DATABASE_URL"]
async fn calendar_create_requires_confirmation(pool: PgPool) {
    let token = login(build_test_app(pool.clone()), &pool).await;
    let (client_id, dog_id) = seed_client_and_dog(&pool, Some("333 123 4567")).await;
    let starts_at = in_two_days();

    let response = post_json(
        build_test_app(pool.clone()),
        "/api/v1/calendar/appointments",
        Some(&token),
        json!({ "client_id": client_id, "dog_id": dog_id, "starts_at": starts_at }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = body_json(response).await;
    assert_eq!(json["error"]["field"], "reminder_confirmed");

    let response = post_json(
        build_test_app(pool.clone()),
        "/api/v1/calendar/appointments",
        Some(&token),
        json!({
            "client_id": client_id,
            "dog_id": dog_id,
            "starts_at": starts_at,
            "reminder_confirmed": true
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["appointment"]["status"], "confirmed");
    let link = json["data"]["whatsapp_link"].as_str().unwrap();
    assert!(link.starts_with("https://wa.me/393331234567?text="));
}

#[sqlx::test]
#[ignore = "needs DATABASE_URL"]
async fn calendar_create_without_phone_is_rejected(pool: PgPool) {
    let token = login(build_test_app(pool.clone()), &pool).await;
    let (client_id, dog_id) = seed_client_and_dog(&pool, None).await;

    let response = post_json(
        build_test_app(pool.clone()),
        "/api/v1/calendar/appointments",
        Some(&token),
        json!({
            "client_id": client_id,
            "dog_id": dog_id,
            "starts_at": in_two_days(),
            "reminder_confirmed": true
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = body_json(response).await;
    assert_eq!(json["error"]["message"], "Enter the client's WhatsApp number.");
}

#[sqlx::test]
#[ignore = "needs DATABASE_URL"]
async fn derive_clears_dog_when_client_changes(pool: PgPool) {
    let token = login(build_test_app(pool.clone()), &pool).await;
    let (client_id, dog_id) = seed_client_and_dog(&pool, Some("3331234567")).await;

    let response = post_json(
        build_test_app(pool.clone()),
        "/api/v1/calendar/form/derive",
        Some(&token),
        json!({
            "changed": "client",
            "form": { "client_id": client_id, "dog_id": dog_id, "starts_at": in_two_days() }
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json["data"]["form"]["dog_id"].is_null());
    assert_eq!(json["data"]["reminder"]["required"], true);
    assert_eq!(json["data"]["reminder"]["phone_missing"], false);
}

#[sqlx::test]
#[ignore = "needs DATABASE_URL"]
async fn dog_of_another_client_is_rejected(pool: PgPool) {
    let token = login(build_test_app(pool.clone()), &pool).await;
    let (client_a, _) = seed_client_and_dog(&pool, None).await;
    let (_, dog_b) = seed_client_and_dog(&pool, None).await;

    let response = post_json(
        build_test_app(pool.clone()),
        "/api/v1/appointments",
        Some(&token),
        json!({ "client_id": client_a, "dog_id": dog_b }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = body_json(response).await;
    assert_eq!(json["error"]["field"], "dog_id");
}

// ---------------------------------------------------------------------------
// HTTP: pending list and the schedule action
// ---------------------------------------------------------------------------

#[sqlx::test]
#[ignore = "needs DATABASE_URL"]
async fn pending_appointment_is_scheduled_once(pool: PgPool) {
    let token = login(build_test_app(pool.clone()), &pool).await;
    let (client_id, dog_id) = seed_client_and_dog(&pool, Some("+39 333 123 4567")).await;

    let response = post_json(
        build_test_app(pool.clone()),
        "/api/v1/appointments",
        Some(&token),
        json!({ "client_id": client_id, "dog_id": dog_id }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let id = body_json(response).await["data"]["id"].as_i64().unwrap();

    let response = get(build_test_app(pool.clone()), "/api/v1/pending-appointments", Some(&token)).await;
    let json = body_json(response).await;
    assert_eq!(json["data"]["poll_interval_seconds"], 5);
    assert_eq!(json["data"]["items"][0]["id"], id);

    let uri = format!("/api/v1/pending-appointments/{id}/schedule");
    let body = json!({ "starts_at": in_two_days(), "reminder_confirmed": true });

    let response = post_json(build_test_app(pool.clone()), &uri, Some(&token), body.clone()).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["appointment"]["status"], "confirmed");

    let response = post_json(build_test_app(pool.clone()), &uri, Some(&token), body).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = get(build_test_app(pool.clone()), "/api/v1/pending-appointments", Some(&token)).await;
    let json = body_json(response).await;
    assert_eq!(json["data"]["items"].as_array().unwrap().len(), 0);
}

#[sqlx::test]
#[ignore = "needs DATABASE_URL"]
async fn schedule_rejects_past_time(pool: PgPool) {
    let token = login(build_test_app(pool.clone()), &pool).await;
    let (client_id, dog_id) = seed_client_and_dog(&pool, Some("3331234567")).await;
    let row = AppointmentRepo::create(
        &pool,
        AppointmentFields {
            client_id,
            dog_id,
            starts_at: None,
            status: AppointmentStatus::Pending,
            notes: None,
        },
    )
    .await
    .unwrap();

    let response = post_json(
        build_test_app(pool.clone()),
        &format!("/api/v1/pending-appointments/{}/schedule", row.id),
        Some(&token),
        json!({ "starts_at": (Utc::now() - Duration::hours(1)).to_rfc3339(), "reminder_confirmed": true }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = body_json(response).await;
    assert_eq!(json["error"]["field"], "starts_at");
}

#[sqlx::test]
#[ignore = "needs DATABASE_URL"]
async fn logout_revokes_the_session(pool: PgPool) {
    let token = login(build_test_app(pool.clone()), &pool).await;

    let response = send(build_test_app(pool.clone()), Method::POST, "/api/v1/auth/logout", Some(&token), None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = get(build_test_app(pool.clone()), "/api/v1/auth/me", Some(&token)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// ---------------------------------------------------------------------------
// HTTP: appointment resource start-time rules
// ---------------------------------------------------------------------------

#[sqlx::test]
#[ignore = "needs DATABASE_URL"]
async fn resource_create_rejects_past_start(pool: PgPool) {
    let token = login(build_test_app(pool.clone()), &pool).await;
    let (client_id, dog_id) = seed_client_and_dog(&pool, None).await;

    let response = post_json(
        build_test_app(pool.clone()),
        "/api/v1/appointments",
        Some(&token),
        json!({
            "client_id": client_id,
            "dog_id": dog_id,
            "starts_at": stamp(Utc::now() - Duration::days(30))
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(json["error"]["field"], "starts_at");
}

#[sqlx::test]
#[ignore = "needs DATABASE_URL"]
async fn resource_patch_checks_only_a_moved_start(pool: PgPool) {
    let token = login(build_test_app(pool.clone()), &pool).await;
    let (client_id, dog_id) = seed_client_and_dog(&pool, None).await;
    let past = minute_in_days(-3);
    let id = seed_appointment(&pool, client_id, dog_id, Some(past)).await;
    let uri = format!("/api/v1/appointments/{id}");

    let response = patch_json(
        build_test_app(pool.clone()),
        &uri,
        Some(&token),
        json!({ "starts_at": stamp(Utc::now() - Duration::days(60)) }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body_json(response).await["error"]["field"], "starts_at");

    // the stored time is not re-checked when it is resubmitted unchanged
    let response = patch_json(
        build_test_app(pool.clone()),
        &uri,
        Some(&token),
        json!({ "starts_at": stamp(past), "notes": "short coat" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(returned_start(&json), Some(past));
    assert_eq!(json["data"]["notes"], "short coat");
}

#[sqlx::test]
#[ignore = "needs DATABASE_URL"]
async fn picker_time_without_offset_is_business_local(pool: PgPool) {
    let token = login(build_test_app(pool.clone()), &pool).await;
    let (client_id, dog_id) = seed_client_and_dog(&pool, None).await;
    let at = minute_in_days(2);
    let local = at
        .with_timezone(&chrono_tz::Europe::Rome)
        .format("%Y-%m-%dT%H:%M")
        .to_string();

    let response = post_json(
        build_test_app(pool.clone()),
        "/api/v1/appointments",
        Some(&token),
        json!({ "client_id": client_id, "dog_id": dog_id, "starts_at": local }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(returned_start(&json), Some(at));
    assert_eq!(json["data"]["status"], "confirmed");

    let response = post_json(
        build_test_app(pool.clone()),
        "/api/v1/appointments",
        Some(&token),
        json!({ "client_id": client_id, "dog_id": dog_id, "starts_at": "next tuesday" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(json["error"]["field"], "starts_at");
}

#[sqlx::test]
#[ignore = "needs DATABASE_URL"]
async fn cancelled_stays_cancelled_when_start_is_cleared(pool: PgPool) {
    let token = login(build_test_app(pool.clone()), &pool).await;
    let (client_id, dog_id) = seed_client_and_dog(&pool, None).await;
    let id = seed_appointment(&pool, client_id, dog_id, Some(minute_in_days(2))).await;

    let response = post_json(
        build_test_app(pool.clone()),
        &format!("/api/v1/appointments/{id}/cancel"),
        Some(&token),
        json!({}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["status"], "cancelled");

    let response = patch_json(
        build_test_app(pool.clone()),
        &format!("/api/v1/appointments/{id}"),
        Some(&token),
        json!({ "starts_at": null }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["status"], "cancelled");
    assert!(json["data"]["starts_at"].is_null());
}

// ---------------------------------------------------------------------------
// HTTP: calendar edit (drag/drop) and the events feed
// ---------------------------------------------------------------------------

#[sqlx::test]
#[ignore = "needs DATABASE_URL"]
async fn calendar_edit_confirms_first_scheduling_only(pool: PgPool) {
    let token = login(build_test_app(pool.clone()), &pool).await;
    let (client_id, dog_id) = seed_client_and_dog(&pool, Some("333 123 4567")).await;
    let id = seed_appointment(&pool, client_id, dog_id, None).await;
    let uri = format!("/api/v1/calendar/appointments/{id}");
    let first = stamp(minute_in_days(2));

    let response = patch_json(
        build_test_app(pool.clone()),
        &uri,
        Some(&token),
        json!({ "client_id": client_id, "dog_id": dog_id, "starts_at": first }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body_json(response).await["error"]["field"], "reminder_confirmed");

    let response = patch_json(
        build_test_app(pool.clone()),
        &uri,
        Some(&token),
        json!({
            "client_id": client_id,
            "dog_id": dog_id,
            "starts_at": first,
            "reminder_confirmed": true
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["appointment"]["status"], "confirmed");
    let link = json["data"]["whatsapp_link"].as_str().unwrap();
    assert!(link.starts_with("https://wa.me/393331234567?text="));

    // moving an already scheduled appointment needs no confirmation
    let moved = minute_in_days(3);
    let response = patch_json(
        build_test_app(pool.clone()),
        &uri,
        Some(&token),
        json!({
            "client_id": client_id,
            "dog_id": dog_id,
            "starts_at": stamp(moved),
            "status": "confirmed"
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json["data"]["whatsapp_link"].is_null());
    assert_eq!(
        json["data"]["appointment"]["starts_at"].as_str().map(|s| s.parse::<DateTime<Utc>>().unwrap()),
        Some(moved)
    );
}

#[sqlx::test]
#[ignore = "needs DATABASE_URL"]
async fn calendar_events_include_both_bounds(pool: PgPool) {
    let token = login(build_test_app(pool.clone()), &pool).await;
    let (client_id, dog_id) = seed_client_and_dog(&pool, None).await;
    let at = minute_in_days(2);
    let id = seed_appointment(&pool, client_id, dog_id, Some(at)).await;
    let bound = urlencoding::encode(&stamp(at)).into_owned();

    let response = get(
        build_test_app(pool.clone()),
        &format!("/api/v1/calendar/events?start={bound}&end={bound}"),
        Some(&token),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let events = json["data"].as_array().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["id"], id);
    assert_eq!(events[0]["title"], "Fido - Maria Rossi");

    let response = get(
        build_test_app(pool.clone()),
        "/api/v1/calendar/events?start=yesterday&end=today",
        Some(&token),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"]["code"], "BAD_REQUEST");
}

// ---------------------------------------------------------------------------
// HTTP: dogs and search
// ---------------------------------------------------------------------------

#[sqlx::test]
#[ignore = "needs DATABASE_URL"]
async fn dog_with_appointments_keeps_its_owner(pool: PgPool) {
    let token = login(build_test_app(pool.clone()), &pool).await;
    let (client_a, dog_a) = seed_client_and_dog(&pool, None).await;
    let (client_b, dog_b) = seed_client_and_dog(&pool, None).await;
    seed_appointment(&pool, client_a, dog_a, None).await;

    let response = patch_json(
        build_test_app(pool.clone()),
        &format!("/api/v1/dogs/{dog_a}"),
        Some(&token),
        json!({ "client_id": client_b }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body_json(response).await["error"]["field"], "client_id");
    assert_eq!(DogRepo::find_by_id(&pool, dog_a).await.unwrap().unwrap().client_id, client_a);

    // a dog with no appointments can move
    let response = patch_json(
        build_test_app(pool.clone()),
        &format!("/api/v1/dogs/{dog_b}"),
        Some(&token),
        json!({ "client_id": client_a }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["client_id"], client_a);
}

#[sqlx::test]
#[ignore = "needs DATABASE_URL"]
async fn dog_bulk_delete_counts_only_removed_rows(pool: PgPool) {
    let token = login(build_test_app(pool.clone()), &pool).await;
    let (_, dog_id) = seed_client_and_dog(&pool, None).await;

    let response = post_json(
        build_test_app(pool.clone()),
        "/api/v1/dogs/bulk_delete",
        Some(&token),
        json!({ "ids": [dog_id, 999_999] }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["requested"], 2);
    assert_eq!(json["data"]["deleted"], 1);

    assert_eq!(DogRepo::delete_many(&pool, &[dog_id]).await.unwrap(), Vec::<i64>::new());
}

#[sqlx::test]
#[ignore = "needs DATABASE_URL"]
async fn search_wildcards_match_literally(pool: PgPool) {
    let token = login(build_test_app(pool.clone()), &pool).await;
    seed_client_and_dog(&pool, None).await;

    let response = get(build_test_app(pool.clone()), "/api/v1/clients?search=_", Some(&token)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"].as_array().unwrap().len(), 0);

    let response = get(build_test_app(pool.clone()), "/api/v1/clients?search=ross", Some(&token)).await;
    assert_eq!(body_json(response).await["data"].as_array().unwrap().len(), 1);
}
