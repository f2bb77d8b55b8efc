use axum::{
    extract::{FromRef, FromRequestParts, State},
    http::request::Parts,
    response::{IntoResponse, Response},
    Json,
};

use tablier_api::claims::TokenClaims;
use tablier_api::{db as dbq, MeResponse};

use crate::error::ApiErr;
use crate::storage::{sq_query_row, Db};
use crate::verifier::TokenVerifier;

// ---------------------------------------------------------------------------
// Auth extractor
// ---------------------------------------------------------------------------

/// Verified claims extracted from the `Authorization: Bearer <token>` header.
pub struct AuthClaims(pub TokenClaims);

impl<S> FromRequestParts<S> for AuthClaims
where
    S: Send + Sync,
    TokenVerifier: FromRef<S>,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let verifier = TokenVerifier::from_ref(state);

        let token = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or_else(|| {
                ApiErr::unauthorized("missing or invalid Authorization header").into_response()
            })?
            .to_string();

        match verifier.verify(&token).await {
            Ok(claims) => Ok(AuthClaims(claims)),
            Err(e) => {
                tracing::debug!("token verification failed: {e}");
                Err(ApiErr::from(e).into_response())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Current user
// ---------------------------------------------------------------------------

/// GET /api/v1/me — claims echo plus the local user mirror row.
pub async fn me(
    State(db): State<Db>,
    AuthClaims(claims): AuthClaims,
) -> Result<Json<MeResponse>, ApiErr> {
    let conn = db.conn();
    let row = sq_query_row(
        &conn,
        dbq::users::get_by_external_id(&claims.sub),
        |row| {
            Ok((
                row.get::<_, Option<String>>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, Option<String>>(3)?,
            ))
        },
    );

    // The mirror row may lag behind the provider if the user.created webhook
    // has not landed yet; claims alone are still useful to the frontend.
    let (email, first_name, last_name) = row.unwrap_or((None, None, None));

    Ok(Json(MeResponse {
        user_id: claims.sub.clone(),
        email,
        first_name,
        last_name,
        org_id: claims.org_id.clone(),
        org_role: claims.org_role.clone(),
    }))
}
