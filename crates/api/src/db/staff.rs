//! Staff profile (`servers` table) query builders.

use sea_query::{Asterisk, Expr, Func, OnConflict, Query, SqliteQueryBuilder};

use super::tables::Servers;
use super::Built;

/// Upsert the staff profile seeded from a membership event.
pub fn upsert(
    id: &str,
    user_external_id: &str,
    org_external_id: &str,
    name: &str,
    avatar_url: Option<&str>,
) -> Built {
    Query::insert()
        .into_table(Servers::Table)
        .columns([
            Servers::Id,
            Servers::UserExternalId,
            Servers::OrgExternalId,
            Servers::Name,
            Servers::AvatarUrl,
        ])
        .values_panic([
            id.into(),
            user_external_id.into(),
            org_external_id.into(),
            name.into(),
            avatar_url.map(str::to_string).into(),
        ])
        .on_conflict(
            OnConflict::columns([Servers::UserExternalId, Servers::OrgExternalId])
                .update_columns([Servers::Name, Servers::AvatarUrl])
                .to_owned(),
        )
        .build(SqliteQueryBuilder)
}

/// Remove the staff profile when the membership goes away.
pub fn delete_by_user_org(user_external_id: &str, org_external_id: &str) -> Built {
    Query::delete()
        .from_table(Servers::Table)
        .and_where(Expr::col(Servers::UserExternalId).eq(user_external_id))
        .and_where(Expr::col(Servers::OrgExternalId).eq(org_external_id))
        .build(SqliteQueryBuilder)
}

/// Staff list for a restaurant, ordered by name.
pub fn list_by_org(org_external_id: &str) -> Built {
    Query::select()
        .columns([Servers::Id, Servers::Name, Servers::AvatarUrl])
        .from(Servers::Table)
        .and_where(Expr::col(Servers::OrgExternalId).eq(org_external_id))
        .order_by(Servers::Name, sea_query::Order::Asc)
        .build(SqliteQueryBuilder)
}

/// A single staff profile for the given user in the given restaurant.
pub fn get_by_user_org(user_external_id: &str, org_external_id: &str) -> Built {
    Query::select()
        .columns([Servers::Id, Servers::Name, Servers::AvatarUrl])
        .from(Servers::Table)
        .and_where(Expr::col(Servers::UserExternalId).eq(user_external_id))
        .and_where(Expr::col(Servers::OrgExternalId).eq(org_external_id))
        .build(SqliteQueryBuilder)
}

/// Staff headcount for a restaurant.
pub fn count_by_org(org_external_id: &str) -> Built {
    Query::select()
        .expr(Func::count(Expr::col(Asterisk)))
        .from(Servers::Table)
        .and_where(Expr::col(Servers::OrgExternalId).eq(org_external_id))
        .build(SqliteQueryBuilder)
}
