pub mod auth;
pub mod health;
pub mod menu;
pub mod settings;
pub mod stats;
pub mod webhook;

use tablier_api::claims::TokenClaims;

use crate::error::ApiErr;
use crate::storage::{sq_query_row, Db};

/// Resolve the caller's restaurant from the active-organization claim.
///
/// Returns the provider org id after checking the mirror row exists. 401 when
/// the session has no active organization, 404 when the webhook sync has not
/// created the restaurant yet.
pub fn require_restaurant(db: &Db, claims: &TokenClaims) -> Result<String, ApiErr> {
    let org_id = claims.require_org().map_err(ApiErr::from)?.to_string();

    let conn = db.conn();
    sq_query_row(
        &conn,
        tablier_api::db::restaurants::get_name(&org_id),
        |row| row.get::<_, String>(0),
    )
    .map_err(|_| ApiErr::not_found("restaurant not found for this organization"))?;

    Ok(org_id)
}
