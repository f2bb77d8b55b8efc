//! Membership (user ↔ organization) query builders.

use sea_query::{Asterisk, Expr, Func, OnConflict, Query, SqliteQueryBuilder};

use super::tables::Memberships;
use super::Built;

/// Upsert a membership by provider membership id. Role changes arrive as
/// `organizationMembership.updated` with the same id.
pub fn upsert(external_id: &str, user_external_id: &str, org_external_id: &str, role: &str) -> Built {
    Query::insert()
        .into_table(Memberships::Table)
        .columns([
            Memberships::ExternalId,
            Memberships::UserExternalId,
            Memberships::OrgExternalId,
            Memberships::Role,
        ])
        .values_panic([
            external_id.into(),
            user_external_id.into(),
            org_external_id.into(),
            role.into(),
        ])
        .on_conflict(
            OnConflict::column(Memberships::ExternalId)
                .update_columns([Memberships::Role])
                .to_owned(),
        )
        .build(SqliteQueryBuilder)
}

/// Remove a membership occupying the same (user, org) slot under a
/// different provider id.
///
/// A re-invite mints a fresh membership id for the same pair; if the
/// delete for the old one was lost, the stale row would trip the pair
/// uniqueness constraint on the next upsert.
pub fn delete_stale_pair(
    user_external_id: &str,
    org_external_id: &str,
    keep_external_id: &str,
) -> Built {
    Query::delete()
        .from_table(Memberships::Table)
        .and_where(Expr::col(Memberships::UserExternalId).eq(user_external_id))
        .and_where(Expr::col(Memberships::OrgExternalId).eq(org_external_id))
        .and_where(Expr::col(Memberships::ExternalId).ne(keep_external_id))
        .build(SqliteQueryBuilder)
}

/// Delete a membership by provider membership id.
pub fn delete_by_external_id(external_id: &str) -> Built {
    Query::delete()
        .from_table(Memberships::Table)
        .and_where(Expr::col(Memberships::ExternalId).eq(external_id))
        .build(SqliteQueryBuilder)
}

/// Member count for an organization.
pub fn count_by_org(org_external_id: &str) -> Built {
    Query::select()
        .expr(Func::count(Expr::col(Asterisk)))
        .from(Memberships::Table)
        .and_where(Expr::col(Memberships::OrgExternalId).eq(org_external_id))
        .build(SqliteQueryBuilder)
}

/// Stored role of a user in an organization.
pub fn get_role(user_external_id: &str, org_external_id: &str) -> Built {
    Query::select()
        .column(Memberships::Role)
        .from(Memberships::Table)
        .and_where(Expr::col(Memberships::UserExternalId).eq(user_external_id))
        .and_where(Expr::col(Memberships::OrgExternalId).eq(org_external_id))
        .build(SqliteQueryBuilder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_updates_role_on_replay() {
        let (sql, values) = upsert("orgmem_1", "user_1", "org_1", "org:member");
        assert!(sql.contains("ON CONFLICT"));
        assert!(sql.contains("\"role\""));
        assert_eq!(values.0.len(), 4);
    }

    #[test]
    fn count_scopes_to_org() {
        let (sql, _) = count_by_org("org_1");
        assert!(sql.contains("COUNT"));
        assert!(sql.contains("\"org_external_id\" = ?"));
    }
}
