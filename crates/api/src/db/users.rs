//! User mirror query builders.

use sea_query::{Expr, OnConflict, Query, SqliteQueryBuilder};

use super::tables::Users;
use super::Built;

/// Upsert a user row by provider id. Replayed deliveries update in place.
pub fn upsert(
    id: &str,
    external_id: &str,
    email: Option<&str>,
    first_name: Option<&str>,
    last_name: Option<&str>,
) -> Built {
    Query::insert()
        .into_table(Users::Table)
        .columns([
            Users::Id,
            Users::ExternalId,
            Users::Email,
            Users::FirstName,
            Users::LastName,
        ])
        .values_panic([
            id.into(),
            external_id.into(),
            email.map(str::to_string).into(),
            first_name.map(str::to_string).into(),
            last_name.map(str::to_string).into(),
        ])
        .on_conflict(
            OnConflict::column(Users::ExternalId)
                .update_columns([Users::Email, Users::FirstName, Users::LastName])
                .to_owned(),
        )
        .build(SqliteQueryBuilder)
}

/// Minimal insert from a membership snapshot, ignored if the full `user.*`
/// event already arrived. Covers out-of-order webhook delivery.
pub fn insert_stub(id: &str, external_id: &str, first_name: Option<&str>, last_name: Option<&str>) -> Built {
    let sql = "INSERT OR IGNORE INTO \"users\" (\"id\", \"external_id\", \"first_name\", \"last_name\") VALUES (?, ?, ?, ?)"
        .to_string();
    let values = sea_query::Values(vec![
        id.into(),
        external_id.into(),
        first_name.map(str::to_string).into(),
        last_name.map(str::to_string).into(),
    ]);
    (sql, values)
}

/// Remove a user row holding the same email under a different provider id.
///
/// The provider can recreate an account with a fresh id while the old
/// `user.deleted` delivery was lost; the stale mirror row would otherwise
/// trip the email uniqueness constraint on the next upsert.
pub fn delete_stale_by_email(email: &str, keep_external_id: &str) -> Built {
    Query::delete()
        .from_table(Users::Table)
        .and_where(Expr::col(Users::Email).eq(email))
        .and_where(Expr::col(Users::ExternalId).ne(keep_external_id))
        .build(SqliteQueryBuilder)
}

/// Find user by provider id.
pub fn get_by_external_id(external_id: &str) -> Built {
    Query::select()
        .columns([
            Users::ExternalId,
            Users::Email,
            Users::FirstName,
            Users::LastName,
        ])
        .from(Users::Table)
        .and_where(Expr::col(Users::ExternalId).eq(external_id))
        .build(SqliteQueryBuilder)
}

/// Delete user by provider id. Memberships and staff profiles cascade.
pub fn delete_by_external_id(external_id: &str) -> Built {
    Query::delete()
        .from_table(Users::Table)
        .and_where(Expr::col(Users::ExternalId).eq(external_id))
        .build(SqliteQueryBuilder)
}
