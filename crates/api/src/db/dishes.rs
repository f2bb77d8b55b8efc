//! Menu item query builders.

use sea_query::{Asterisk, Expr, Func, Query, SqliteQueryBuilder};

use super::tables::Dishes;
use super::Built;

pub fn insert(id: &str, org_external_id: &str, name: &str, category: &str) -> Built {
    Query::insert()
        .into_table(Dishes::Table)
        .columns([
            Dishes::Id,
            Dishes::OrgExternalId,
            Dishes::Name,
            Dishes::Category,
        ])
        .values_panic([
            id.into(),
            org_external_id.into(),
            name.into(),
            category.into(),
        ])
        .build(SqliteQueryBuilder)
}

/// Menu for a restaurant, grouped by category then name.
pub fn list_by_org(org_external_id: &str) -> Built {
    Query::select()
        .columns([Dishes::Id, Dishes::Name, Dishes::Category])
        .from(Dishes::Table)
        .and_where(Expr::col(Dishes::OrgExternalId).eq(org_external_id))
        .order_by(Dishes::Category, sea_query::Order::Asc)
        .order_by(Dishes::Name, sea_query::Order::Asc)
        .build(SqliteQueryBuilder)
}

/// Delete a dish, scoped to its restaurant so one tenant cannot remove
/// another tenant's rows.
pub fn delete_scoped(id: &str, org_external_id: &str) -> Built {
    Query::delete()
        .from_table(Dishes::Table)
        .and_where(Expr::col(Dishes::Id).eq(id))
        .and_where(Expr::col(Dishes::OrgExternalId).eq(org_external_id))
        .build(SqliteQueryBuilder)
}

pub fn count_by_org(org_external_id: &str) -> Built {
    Query::select()
        .expr(Func::count(Expr::col(Asterisk)))
        .from(Dishes::Table)
        .and_where(Expr::col(Dishes::OrgExternalId).eq(org_external_id))
        .build(SqliteQueryBuilder)
}
