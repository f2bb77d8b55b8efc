//! Restaurant (organization mirror) query builders.

use sea_query::{Expr, OnConflict, Query, SqliteQueryBuilder};

use super::tables::Restaurants;
use super::Built;

/// Columns returned by settings lookups, in row order.
pub const SETTINGS_COLUMNS: [Restaurants; 7] = [
    Restaurants::ExternalOrgId,
    Restaurants::Name,
    Restaurants::Slug,
    Restaurants::LogoFile,
    Restaurants::PrimaryColor,
    Restaurants::GoogleLink,
    Restaurants::TripadvisorLink,
];

/// Upsert an organization mirror row. Only name and slug come from the
/// provider; local settings columns are left untouched on replay.
pub fn upsert(id: &str, external_org_id: &str, name: &str, slug: Option<&str>) -> Built {
    Query::insert()
        .into_table(Restaurants::Table)
        .columns([
            Restaurants::Id,
            Restaurants::ExternalOrgId,
            Restaurants::Name,
            Restaurants::Slug,
        ])
        .values_panic([
            id.into(),
            external_org_id.into(),
            name.into(),
            slug.map(str::to_string).into(),
        ])
        .on_conflict(
            OnConflict::column(Restaurants::ExternalOrgId)
                .update_columns([Restaurants::Name, Restaurants::Slug])
                .to_owned(),
        )
        .build(SqliteQueryBuilder)
}

/// Minimal insert from a membership snapshot, ignored if the full
/// `organization.*` event already arrived. Covers out-of-order delivery.
pub fn insert_stub(id: &str, external_org_id: &str, name: &str, slug: Option<&str>) -> Built {
    let sql = "INSERT OR IGNORE INTO \"restaurants\" (\"id\", \"external_org_id\", \"name\", \"slug\") VALUES (?, ?, ?, ?)"
        .to_string();
    let values = sea_query::Values(vec![
        id.into(),
        external_org_id.into(),
        name.into(),
        slug.map(str::to_string).into(),
    ]);
    (sql, values)
}

/// Remove an organization mirror holding the same slug under a different
/// provider org id. The provider reuses slugs once the old organization is
/// gone; a stale mirror row would trip the slug uniqueness constraint.
pub fn delete_stale_by_slug(slug: &str, keep_org_id: &str) -> Built {
    Query::delete()
        .from_table(Restaurants::Table)
        .and_where(Expr::col(Restaurants::Slug).eq(slug))
        .and_where(Expr::col(Restaurants::ExternalOrgId).ne(keep_org_id))
        .build(SqliteQueryBuilder)
}

/// Settings row for an organization.
pub fn get_settings(external_org_id: &str) -> Built {
    Query::select()
        .columns(SETTINGS_COLUMNS)
        .column(Restaurants::EnabledLanguages)
        .from(Restaurants::Table)
        .and_where(Expr::col(Restaurants::ExternalOrgId).eq(external_org_id))
        .build(SqliteQueryBuilder)
}

/// Restaurant display name only.
pub fn get_name(external_org_id: &str) -> Built {
    Query::select()
        .column(Restaurants::Name)
        .from(Restaurants::Table)
        .and_where(Expr::col(Restaurants::ExternalOrgId).eq(external_org_id))
        .build(SqliteQueryBuilder)
}

pub fn update_name(external_org_id: &str, name: &str) -> Built {
    Query::update()
        .table(Restaurants::Table)
        .value(Restaurants::Name, name)
        .and_where(Expr::col(Restaurants::ExternalOrgId).eq(external_org_id))
        .build(SqliteQueryBuilder)
}

pub fn update_primary_color(external_org_id: &str, color: &str) -> Built {
    Query::update()
        .table(Restaurants::Table)
        .value(Restaurants::PrimaryColor, color)
        .and_where(Expr::col(Restaurants::ExternalOrgId).eq(external_org_id))
        .build(SqliteQueryBuilder)
}

pub fn update_google_link(external_org_id: &str, link: &str) -> Built {
    Query::update()
        .table(Restaurants::Table)
        .value(Restaurants::GoogleLink, link)
        .and_where(Expr::col(Restaurants::ExternalOrgId).eq(external_org_id))
        .build(SqliteQueryBuilder)
}

pub fn update_tripadvisor_link(external_org_id: &str, link: &str) -> Built {
    Query::update()
        .table(Restaurants::Table)
        .value(Restaurants::TripadvisorLink, link)
        .and_where(Expr::col(Restaurants::ExternalOrgId).eq(external_org_id))
        .build(SqliteQueryBuilder)
}

/// Store the bare logo filename (the URL is derived at read time).
pub fn update_logo_file(external_org_id: &str, file: &str) -> Built {
    Query::update()
        .table(Restaurants::Table)
        .value(Restaurants::LogoFile, file)
        .and_where(Expr::col(Restaurants::ExternalOrgId).eq(external_org_id))
        .build(SqliteQueryBuilder)
}

/// Store the enabled-languages JSON array.
pub fn update_enabled_languages(external_org_id: &str, languages_json: &str) -> Built {
    Query::update()
        .table(Restaurants::Table)
        .value(Restaurants::EnabledLanguages, languages_json)
        .and_where(Expr::col(Restaurants::ExternalOrgId).eq(external_org_id))
        .build(SqliteQueryBuilder)
}

/// Delete an organization mirror row. Staff and dishes cascade.
pub fn delete_by_org_id(external_org_id: &str) -> Built {
    Query::delete()
        .from_table(Restaurants::Table)
        .and_where(Expr::col(Restaurants::ExternalOrgId).eq(external_org_id))
        .build(SqliteQueryBuilder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_never_touches_settings_columns() {
        let (sql, _) = upsert("r-1", "org_1", "Chez Marcel", Some("chez-marcel"));
        assert!(sql.contains("ON CONFLICT"));
        assert!(!sql.contains("primary_color"));
        assert!(!sql.contains("logo_file"));
    }

    #[test]
    fn settings_select_includes_languages() {
        let (sql, _) = get_settings("org_1");
        assert!(sql.contains("\"enabled_languages\""));
        assert!(sql.contains("\"external_org_id\" = ?"));
    }
}
