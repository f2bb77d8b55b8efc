use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use tablier_api::{
    db as dbq, validate_name, CreateDishRequest, DishResponse, ListDishesResponse,
    ListStaffResponse, OkResponse, StaffResponse,
};

use crate::error::ApiErr;
use crate::routes::auth::AuthClaims;
use crate::routes::require_restaurant;
use crate::storage::{sq_execute, sq_query_map, Db};

// ---------------------------------------------------------------------------
// Dishes
// ---------------------------------------------------------------------------

/// GET /api/v1/dishes — the restaurant menu, visible to every member.
pub async fn list_dishes(
    State(db): State<Db>,
    AuthClaims(claims): AuthClaims,
) -> Result<Json<ListDishesResponse>, ApiErr> {
    let org_id = require_restaurant(&db, &claims)?;

    let conn = db.conn();
    let dishes = sq_query_map(&conn, dbq::dishes::list_by_org(&org_id), |row| {
        Ok(DishResponse {
            id: row.get(0)?,
            name: row.get(1)?,
            category: row.get(2)?,
        })
    })
    .map_err(ApiErr::from_db("listing dishes"))?;

    Ok(Json(ListDishesResponse { dishes }))
}

/// POST /api/v1/dishes — add a menu item. Admin only.
pub async fn create_dish(
    State(db): State<Db>,
    AuthClaims(claims): AuthClaims,
    Json(req): Json<CreateDishRequest>,
) -> Result<(StatusCode, Json<DishResponse>), ApiErr> {
    if !claims.is_admin() {
        return Err(ApiErr::forbidden("admin role required"));
    }
    let org_id = require_restaurant(&db, &claims)?;

    let name = validate_name(&req.name)?;
    let category = validate_name(&req.category)?;
    let id = Uuid::new_v4().to_string();

    let conn = db.conn();
    sq_execute(&conn, dbq::dishes::insert(&id, &org_id, &name, &category))
        .map_err(ApiErr::from_db("inserting dish"))?;

    Ok((StatusCode::CREATED, Json(DishResponse { id, name, category })))
}

/// DELETE /api/v1/dishes/{id} — remove a menu item. Admin only, scoped to
/// the caller's restaurant.
pub async fn delete_dish(
    State(db): State<Db>,
    AuthClaims(claims): AuthClaims,
    Path(dish_id): Path<String>,
) -> Result<Json<OkResponse>, ApiErr> {
    if !claims.is_admin() {
        return Err(ApiErr::forbidden("admin role required"));
    }
    let org_id = require_restaurant(&db, &claims)?;

    let conn = db.conn();
    let affected = sq_execute(&conn, dbq::dishes::delete_scoped(&dish_id, &org_id))
        .map_err(ApiErr::from_db("deleting dish"))?;
    if affected == 0 {
        return Err(ApiErr::not_found("dish not found"));
    }

    Ok(Json(OkResponse { ok: true }))
}

// ---------------------------------------------------------------------------
// Servers
// ---------------------------------------------------------------------------

/// GET /api/v1/servers — staff roster, visible to every member.
pub async fn list_servers(
    State(db): State<Db>,
    AuthClaims(claims): AuthClaims,
) -> Result<Json<ListStaffResponse>, ApiErr> {
    let org_id = require_restaurant(&db, &claims)?;

    let conn = db.conn();
    let servers = sq_query_map(&conn, dbq::staff::list_by_org(&org_id), |row| {
        Ok(StaffResponse {
            id: row.get(0)?,
            name: row.get(1)?,
            avatar_url: row.get(2)?,
        })
    })
    .map_err(ApiErr::from_db("listing servers"))?;

    Ok(Json(ListStaffResponse { servers }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{init_test_db, sq_query_row};

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
            dbq::restaurants::upsert("r2", "org_2", "Other", None),
        )
        .unwrap();
    }

    #[test]
    fn menu_lists_in_category_then_name_order() {
        let db = test_db();
        seed(&db);

        let conn = db.conn();
        sq_execute(&conn, dbq::dishes::insert("d1", "org_1", "Tarte", "Desserts")).unwrap();
        sq_execute(&conn, dbq::dishes::insert("d2", "org_1", "Soupe", "Entrées")).unwrap();
        sq_execute(&conn, dbq::dishes::insert("d3", "org_1", "Salade", "Entrées")).unwrap();

        let names: Vec<String> =
            sq_query_map(&conn, dbq::dishes::list_by_org("org_1"), |row| row.get(1)).unwrap();
        assert_eq!(names, vec!["Tarte", "Salade", "Soupe"]);
    }

    #[test]
    fn delete_is_scoped_to_the_restaurant() {
        let db = test_db();
        seed(&db);

        let conn = db.conn();
        sq_execute(&conn, dbq::dishes::insert("d1", "org_1", "Soupe", "Entrées")).unwrap();

        // another tenant cannot delete it
        let affected = sq_execute(&conn, dbq::dishes::delete_scoped("d1", "org_2")).unwrap();
        assert_eq!(affected, 0);

        let affected = sq_execute(&conn, dbq::dishes::delete_scoped("d1", "org_1")).unwrap();
        assert_eq!(affected, 1);

        let count: i64 =
            sq_query_row(&conn, dbq::dishes::count_by_org("org_1"), |row| row.get(0)).unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn roster_is_ordered_by_name() {
        let db = test_db();
        seed(&db);

        let conn = db.conn();
        for (id, user, name) in [("s1", "user_b", "Zoé"), ("s2", "user_a", "Alice")] {
            sq_execute(
                &conn,
                dbq::users::upsert(&format!("u-{user}"), user, None, None, None),
            )
            .unwrap();
            sq_execute(&conn, dbq::staff::upsert(id, user, "org_1", name, None)).unwrap();
        }

        let names: Vec<String> =
            sq_query_map(&conn, dbq::staff::list_by_org("org_1"), |row| row.get(1)).unwrap();
        assert_eq!(names, vec!["Alice", "Zoé"]);
    }
}
