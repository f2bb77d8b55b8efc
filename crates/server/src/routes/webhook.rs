use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    Json,
};
use uuid::Uuid;

use tablier_api::webhook::{self, WebhookEvent};
use tablier_api::{crypto, db as dbq, OkResponse, ServiceError};

use crate::error::ApiErr;
use crate::storage::{sq_execute, Db};
use crate::AppState;

/// POST /api/webhooks/identity — signed delivery from the identity provider.
pub async fn receive(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<OkResponse>, ApiErr> {
    let secret = &state.config.webhook_secret;
    if secret.is_empty() {
        return Err(ServiceError::Unavailable("webhook ingestion not configured".into()).into());
    }

    let msg_id = delivery_header(&headers, "id")?;
    let timestamp = delivery_header(&headers, "timestamp")?;
    let signature = delivery_header(&headers, "signature")?;

    crypto::verify(
        secret,
        &msg_id,
        &timestamp,
        &signature,
        &body,
        chrono::Utc::now().timestamp(),
    )
    .map_err(|e| {
        tracing::warn!(%msg_id, "webhook rejected: {e}");
        ApiErr::from(e)
    })?;

    let event = webhook::parse_event(&body).map_err(ApiErr::from)?;
    apply_event(&state.db, event).map_err(|e| {
        tracing::error!(%msg_id, "webhook apply failed: {e}");
        ApiErr::from(e)
    })?;

    Ok(Json(OkResponse { ok: true }))
}

/// Read a `webhook-*` header, accepting the provider's `svix-*` aliases.
fn delivery_header(headers: &HeaderMap, name: &str) -> Result<String, ApiErr> {
    for prefix in ["webhook", "svix"] {
        if let Some(v) = headers.get(format!("{prefix}-{name}")) {
            return v
                .to_str()
                .map(str::to_string)
                .map_err(|_| ApiErr::unauthorized(format!("invalid webhook-{name} header")));
        }
    }
    Err(ApiErr::unauthorized(format!("missing webhook-{name} header")))
}

/// Apply a verified event to the local mirror, atomically. Idempotent:
/// replays upsert in place and deletes of absent rows succeed. Rows whose
/// provider id changed but still occupy a secondary unique slot (email,
/// membership pair, slug) are swept before the upsert so a lost `*.deleted`
/// delivery never wedges the statement on a constraint.
fn apply_event(db: &Db, event: WebhookEvent) -> Result<(), ServiceError> {
    let map_db = |context: &'static str| {
        move |e: rusqlite::Error| ServiceError::Internal(format!("{context}: {e}"))
    };

    let mut conn = db.conn();
    let tx = conn.transaction().map_err(map_db("begin transaction"))?;
    match event {
        WebhookEvent::UserCreated(user) | WebhookEvent::UserUpdated(user) => {
            if let Some(email) = user.primary_email() {
                sq_execute(&tx, dbq::users::delete_stale_by_email(email, &user.id))
                    .map_err(map_db("stale user sweep"))?;
            }
            sq_execute(
                &tx,
                dbq::users::upsert(
                    &Uuid::new_v4().to_string(),
                    &user.id,
                    user.primary_email(),
                    user.first_name.as_deref(),
                    user.last_name.as_deref(),
                ),
            )
            .map_err(map_db("user upsert"))?;
            tracing::info!(user = %user.id, "user synced to local DB");
        }
        WebhookEvent::UserDeleted(data) => {
            sq_execute(&tx, dbq::users::delete_by_external_id(&data.id))
                .map_err(map_db("user delete"))?;
            tracing::info!(user = %data.id, "user removed from local DB");
        }
        WebhookEvent::OrganizationCreated(org) | WebhookEvent::OrganizationUpdated(org) => {
            if let Some(slug) = org.slug.as_deref() {
                sq_execute(&tx, dbq::restaurants::delete_stale_by_slug(slug, &org.id))
                    .map_err(map_db("stale restaurant sweep"))?;
            }
            sq_execute(
                &tx,
                dbq::restaurants::upsert(
                    &Uuid::new_v4().to_string(),
                    &org.id,
                    &org.name,
                    org.slug.as_deref(),
                ),
            )
            .map_err(map_db("restaurant upsert"))?;
            tracing::info!(org = %org.id, "restaurant synced to local DB");
        }
        WebhookEvent::OrganizationDeleted(data) => {
            sq_execute(&tx, dbq::restaurants::delete_by_org_id(&data.id))
                .map_err(map_db("restaurant delete"))?;
            tracing::info!(org = %data.id, "restaurant removed from local DB");
        }
        WebhookEvent::MembershipCreated(m) | WebhookEvent::MembershipUpdated(m) => {
            // Membership events can outrun the user/organization events that
            // back their foreign keys; seed stub rows so the upsert lands.
            sq_execute(
                &tx,
                dbq::users::insert_stub(
                    &Uuid::new_v4().to_string(),
                    &m.public_user_data.user_id,
                    m.public_user_data.first_name.as_deref(),
                    m.public_user_data.last_name.as_deref(),
                ),
            )
            .map_err(map_db("user stub insert"))?;
            sq_execute(
                &tx,
                dbq::restaurants::insert_stub(
                    &Uuid::new_v4().to_string(),
                    &m.organization.id,
                    m.organization.name.as_deref().unwrap_or(&m.organization.id),
                    m.organization.slug.as_deref(),
                ),
            )
            .map_err(map_db("restaurant stub insert"))?;

            sq_execute(
                &tx,
                dbq::memberships::delete_stale_pair(
                    &m.public_user_data.user_id,
                    &m.organization.id,
                    &m.id,
                ),
            )
            .map_err(map_db("stale membership sweep"))?;
            sq_execute(
                &tx,
                dbq::memberships::upsert(
                    &m.id,
                    &m.public_user_data.user_id,
                    &m.organization.id,
                    &m.role,
                ),
            )
            .map_err(map_db("membership upsert"))?;

            sq_execute(
                &tx,
                dbq::staff::upsert(
                    &Uuid::new_v4().to_string(),
                    &m.public_user_data.user_id,
                    &m.organization.id,
                    &m.public_user_data.display_name(),
                    m.public_user_data.image_url.as_deref(),
                ),
            )
            .map_err(map_db("staff upsert"))?;
            tracing::info!(membership = %m.id, "membership synced to local DB");
        }
        WebhookEvent::MembershipDeleted(m) => {
            sq_execute(&tx, dbq::memberships::delete_by_external_id(&m.id))
                .map_err(map_db("membership delete"))?;
            sq_execute(
                &tx,
                dbq::staff::delete_by_user_org(&m.public_user_data.user_id, &m.organization.id),
            )
            .map_err(map_db("staff delete"))?;
            tracing::info!(membership = %m.id, "membership removed from local DB");
        }
        WebhookEvent::Unknown(ty) => {
            tracing::debug!(event = %ty, "ignoring webhook event type");
        }
    }
    tx.commit().map_err(map_db("commit transaction"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{init_test_db, sq_query_row};
    use tablier_api::webhook::parse_event;

    fn test_db() -> Db {
        let dir = tempfile::tempdir().unwrap();
        init_test_db(&dir.keep()).unwrap()
    }

    fn apply_json(db: &Db, body: &str) {
        apply_event(db, parse_event(body.as_bytes()).unwrap()).unwrap();
    }

    const USER_CREATED: &str = r#"{
        "type": "user.created",
        "data": {
            "id": "user_1",
            "email_addresses": [{"id": "em_1", "email_address": "marcel@ex.fr"}],
            "primary_email_address_id": "em_1",
            "first_name": "Marcel",
            "last_name": "Dupont"
        }
    }"#;

    const ORG_CREATED: &str = r#"{
        "type": "organization.created",
        "data": {"id": "org_1", "name": "Chez Marcel", "slug": "chez-marcel"}
    }"#;

    const MEMBERSHIP_CREATED: &str = r#"{
        "type": "organizationMembership.created",
        "data": {
            "id": "orgmem_1",
            "organization": {"id": "org_1", "name": "Chez Marcel"},
            "public_user_data": {"user_id": "user_1", "first_name": "Marcel", "last_name": "Dupont"},
            "role": "org:admin"
        }
    }"#;

    #[test]
    fn user_created_then_replayed() {
        let db = test_db();
        apply_json(&db, USER_CREATED);
        apply_json(&db, USER_CREATED);

        let conn = db.conn();
        let email: String = sq_query_row(
            &conn,
            tablier_api::db::users::get_by_external_id("user_1"),
            |row| row.get(1),
        )
        .map(|e: Option<String>| e.unwrap())
        .unwrap();
        assert_eq!(email, "marcel@ex.fr");
    }

    #[test]
    fn membership_before_user_and_org_events() {
        let db = test_db();
        // Out-of-order: membership first, then the real user/org payloads.
        apply_json(&db, MEMBERSHIP_CREATED);
        apply_json(&db, USER_CREATED);
        apply_json(&db, ORG_CREATED);

        let conn = db.conn();
        let role: String = sq_query_row(
            &conn,
            tablier_api::db::memberships::get_role("user_1", "org_1"),
            |r| r.get(0),
        )
        .unwrap();
        assert_eq!(role, "org:admin");

        let staff: i64 =
            sq_query_row(&conn, tablier_api::db::staff::count_by_org("org_1"), |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(staff, 1);
    }

    #[test]
    fn membership_deleted_removes_staff_profile() {
        let db = test_db();
        apply_json(&db, MEMBERSHIP_CREATED);
        apply_json(
            &db,
            r#"{
                "type": "organizationMembership.deleted",
                "data": {
                    "id": "orgmem_1",
                    "organization": {"id": "org_1"},
                    "public_user_data": {"user_id": "user_1"},
                    "role": "org:admin"
                }
            }"#,
        );

        let conn = db.conn();
        let staff: i64 =
            sq_query_row(&conn, tablier_api::db::staff::count_by_org("org_1"), |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(staff, 0);

        // Replayed delete is a no-op, not an error.
        drop(conn);
        apply_json(
            &db,
            r#"{
                "type": "organizationMembership.deleted",
                "data": {
                    "id": "orgmem_1",
                    "organization": {"id": "org_1"},
                    "public_user_data": {"user_id": "user_1"},
                    "role": "org:admin"
                }
            }"#,
        );
    }

    #[test]
    fn user_recreated_with_same_email_replaces_stale_row() {
        let db = test_db();
        apply_json(&db, USER_CREATED);

        // Same email under a fresh provider id; the user.deleted for the
        // old account never arrived.
        apply_json(
            &db,
            r#"{
                "type": "user.created",
                "data": {
                    "id": "user_2",
                    "email_addresses": [{"id": "em_9", "email_address": "marcel@ex.fr"}],
                    "primary_email_address_id": "em_9",
                    "first_name": "Marcel",
                    "last_name": "Dupont"
                }
            }"#,
        );

        let conn = db.conn();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM users WHERE email = 'marcel@ex.fr'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
        let external_id: String = sq_query_row(
            &conn,
            tablier_api::db::users::get_by_external_id("user_2"),
            |row| row.get(0),
        )
        .unwrap();
        assert_eq!(external_id, "user_2");
    }

    #[test]
    fn membership_recreated_under_new_id_replaces_stale_row() {
        let db = test_db();
        apply_json(&db, MEMBERSHIP_CREATED);

        // Re-invite: fresh membership id, same (user, org) pair, the delete
        // for orgmem_1 was lost.
        apply_json(
            &db,
            r#"{
                "type": "organizationMembership.created",
                "data": {
                    "id": "orgmem_2",
                    "organization": {"id": "org_1", "name": "Chez Marcel"},
                    "public_user_data": {"user_id": "user_1", "first_name": "Marcel", "last_name": "Dupont"},
                    "role": "org:member"
                }
            }"#,
        );

        let conn = db.conn();
        let members: i64 = sq_query_row(
            &conn,
            tablier_api::db::memberships::count_by_org("org_1"),
            |r| r.get(0),
        )
        .unwrap();
        assert_eq!(members, 1);

        let role: String = sq_query_row(
            &conn,
            tablier_api::db::memberships::get_role("user_1", "org_1"),
            |r| r.get(0),
        )
        .unwrap();
        assert_eq!(role, "org:member");
    }

    #[test]
    fn user_deleted_cascades_membership() {
        let db = test_db();
        apply_json(&db, MEMBERSHIP_CREATED);
        apply_json(&db, r#"{"type": "user.deleted", "data": {"id": "user_1"}}"#);

        let conn = db.conn();
        let members: i64 = sq_query_row(
            &conn,
            tablier_api::db::memberships::count_by_org("org_1"),
            |r| r.get(0),
        )
        .unwrap();
        assert_eq!(members, 0);
    }

    #[test]
    fn unknown_event_is_noop() {
        let db = test_db();
        apply_json(&db, r#"{"type": "session.created", "data": {"id": "s"}}"#);
    }
}
