use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Json,
};

use tablier_api::{db as dbq, AdminStatsResponse, ServerStatsResponse};

use crate::error::ApiErr;
use crate::routes::auth::AuthClaims;
use crate::routes::require_restaurant;
use crate::storage::{sq_query_row, Db};

/// GET /api/v1/dashboard/stats
///
/// Admins get restaurant-wide aggregates; servers get their own profile card.
/// Both shapes come from live counts, never cached.
pub async fn stats(
    State(db): State<Db>,
    AuthClaims(claims): AuthClaims,
) -> Result<Response, ApiErr> {
    let org_id = require_restaurant(&db, &claims)?;

    if claims.is_admin() {
        let body = admin_stats(&db, &org_id)?;
        return Ok(Json(body).into_response());
    }

    let user_id = claims.sub.clone();
    let body = server_stats(&db, &user_id, &org_id)?;
    Ok(Json(body).into_response())
}

fn admin_stats(db: &Db, org_id: &str) -> Result<AdminStatsResponse, ApiErr> {
    let conn = db.conn();

    let member_count = sq_query_row(&conn, dbq::memberships::count_by_org(org_id), |row| {
        row.get(0)
    })
    .map_err(ApiErr::from_db("counting members"))?;
    let server_count = sq_query_row(&conn, dbq::staff::count_by_org(org_id), |row| row.get(0))
        .map_err(ApiErr::from_db("counting servers"))?;
    let dish_count = sq_query_row(&conn, dbq::dishes::count_by_org(org_id), |row| row.get(0))
        .map_err(ApiErr::from_db("counting dishes"))?;

    Ok(AdminStatsResponse {
        member_count,
        server_count,
        dish_count,
    })
}

fn server_stats(db: &Db, user_id: &str, org_id: &str) -> Result<ServerStatsResponse, ApiErr> {
    let conn = db.conn();

    let (name, avatar_url): (String, Option<String>) =
        sq_query_row(&conn, dbq::staff::get_by_user_org(user_id, org_id), |row| {
            Ok((row.get(1)?, row.get(2)?))
        })
        .map_err(|_| ApiErr::not_found("no server profile for this user"))?;

    let restaurant_name: String =
        sq_query_row(&conn, dbq::restaurants::get_name(org_id), |row| row.get(0))
            .map_err(ApiErr::from_db("loading restaurant name"))?;

    let dish_count = sq_query_row(&conn, dbq::dishes::count_by_org(org_id), |row| row.get(0))
        .map_err(ApiErr::from_db("counting dishes"))?;

    Ok(ServerStatsResponse {
        name,
        avatar_url,
        restaurant_name,
        dish_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{init_test_db, sq_execute};

    fn test_db() -> Db {
        let dir = tempfile::tempdir().unwrap();
        init_test_db(&dir.keep()).unwrap()
    }

    fn seed(db: &Db) {
        let conn = db.conn();
        sq_execute(
            &conn,
            dbq::restaurants::upsert("r1", "org_1", "Chez Test", None),
        )
        .unwrap();
        sq_execute(
            &conn,
            dbq::users::upsert("u1", "user_1", Some("a@b.c"), None, None),
        )
        .unwrap();
        sq_execute(
            &conn,
            dbq::memberships::upsert("m1", "user_1", "org_1", "org:member"),
        )
        .unwrap();
        sq_execute(
            &conn,
            dbq::staff::upsert("s1", "user_1", "org_1", "Alice", None),
        )
        .unwrap();
        sq_execute(&conn, dbq::dishes::insert("d1", "org_1", "Soupe", "Entrées")).unwrap();
        sq_execute(&conn, dbq::dishes::insert("d2", "org_1", "Steak", "Plats")).unwrap();
    }

    #[test]
    fn admin_aggregates_count_live_rows() {
        let db = test_db();
        seed(&db);

        let stats = admin_stats(&db, "org_1").unwrap();
        assert_eq!(stats.member_count, 1);
        assert_eq!(stats.server_count, 1);
        assert_eq!(stats.dish_count, 2);

        {
            let conn = db.conn();
            sq_execute(&conn, dbq::dishes::delete_scoped("d1", "org_1")).unwrap();
        }
        let stats = admin_stats(&db, "org_1").unwrap();
        assert_eq!(stats.dish_count, 1);
    }

    #[test]
    fn server_stats_include_profile_and_restaurant() {
        let db = test_db();
        seed(&db);

        let stats = server_stats(&db, "user_1", "org_1").unwrap();
        assert_eq!(stats.name, "Alice");
        assert_eq!(stats.restaurant_name, "Chez Test");
        assert_eq!(stats.dish_count, 2);
    }

    #[test]
    fn missing_server_profile_is_not_found() {
        let db = test_db();
        seed(&db);

        assert!(server_stats(&db, "user_unknown", "org_1").is_err());
    }
}
