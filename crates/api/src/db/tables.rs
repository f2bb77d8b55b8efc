//! Column identifiers for all tables.

use sea_query::Iden;

#[derive(Iden)]
pub enum Users {
    Table,
    Id,
    ExternalId,
    Email,
    FirstName,
    LastName,
    CreatedAt,
}

#[derive(Iden)]
pub enum Restaurants {
    Table,
    Id,
    ExternalOrgId,
    Name,
    Slug,
    LogoFile,
    PrimaryColor,
    GoogleLink,
    TripadvisorLink,
    EnabledLanguages,
    CreatedAt,
}

#[derive(Iden)]
pub enum Memberships {
    Table,
    ExternalId,
    UserExternalId,
    OrgExternalId,
    Role,
    CreatedAt,
}

#[derive(Iden)]
pub enum Servers {
    Table,
    Id,
    UserExternalId,
    OrgExternalId,
    Name,
    AvatarUrl,
}

#[derive(Iden)]
pub enum Dishes {
    Table,
    Id,
    OrgExternalId,
    Name,
    Category,
    CreatedAt,
}
