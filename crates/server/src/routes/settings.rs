use axum::{
    extract::{Multipart, State},
    Json,
};
use uuid::Uuid;

use tablier_api::{
    db as dbq, validate_color, validate_name, RestaurantSettingsResponse, ServiceError,
    UpdateSettingsResponse,
};

use crate::error::ApiErr;
use crate::routes::auth::AuthClaims;
use crate::routes::require_restaurant;
use crate::storage::{sq_execute, sq_query_row, Db};

/// File extensions accepted for logo uploads.
const ALLOWED_LOGO_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "gif"];

// ---------------------------------------------------------------------------
// GET /api/v1/restaurant/settings
// ---------------------------------------------------------------------------

pub async fn get_settings(
    State(db): State<Db>,
    AuthClaims(claims): AuthClaims,
) -> Result<Json<RestaurantSettingsResponse>, ApiErr> {
    if !claims.is_admin() {
        return Err(ApiErr::forbidden("admin role required"));
    }
    let org_id = require_restaurant(&db, &claims)?;

    let conn = db.conn();
    let row = sq_query_row(&conn, dbq::restaurants::get_settings(&org_id), |row| {
        Ok(SettingsRow {
            name: row.get(1)?,
            slug: row.get(2)?,
            logo_file: row.get(3)?,
            primary_color: row.get(4)?,
            google_link: row.get(5)?,
            tripadvisor_link: row.get(6)?,
            enabled_languages: row.get(7)?,
        })
    })
    .map_err(ApiErr::from_db("loading restaurant settings"))?;

    Ok(Json(row.into_response()))
}

/// Settings columns as stored, before wire formatting.
struct SettingsRow {
    name: String,
    slug: Option<String>,
    logo_file: Option<String>,
    primary_color: String,
    google_link: Option<String>,
    tripadvisor_link: Option<String>,
    enabled_languages: String,
}

impl SettingsRow {
    fn into_response(self) -> RestaurantSettingsResponse {
        RestaurantSettingsResponse {
            name: self.name,
            slug: self.slug.unwrap_or_default(),
            logo_url: self.logo_file.map(logo_url),
            primary_color: self.primary_color,
            google_link: self.google_link,
            tripadvisor_link: self.tripadvisor_link,
            enabled_languages: parse_languages(&self.enabled_languages),
        }
    }
}

/// Public URL for a stored logo file.
fn logo_url(file: String) -> String {
    format!("/uploads/{file}")
}

/// Stored as a JSON array; tolerate hand-edited rows by falling back to the
/// schema default.
fn parse_languages(raw: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_else(|_| vec!["fr".to_string(), "en".to_string()])
}

// ---------------------------------------------------------------------------
// PUT /api/v1/restaurant/settings
// ---------------------------------------------------------------------------

/// Multipart update. Every part is optional; only the fields present in the
/// request are written. All parts are read and validated first, then the
/// update is applied in one transaction, so a bad later field leaves earlier
/// fields untouched.
pub async fn update_settings(
    State(db): State<Db>,
    AuthClaims(claims): AuthClaims,
    mut multipart: Multipart,
) -> Result<Json<UpdateSettingsResponse>, ApiErr> {
    if !claims.is_admin() {
        return Err(ApiErr::forbidden("admin role required"));
    }
    let org_id = require_restaurant(&db, &claims)?;

    let mut pending = PendingUpdate::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiErr::bad_request(format!("malformed multipart body: {e}")))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if name == "logo" {
            let original = field.file_name().map(str::to_string).unwrap_or_default();
            let extension = logo_extension(&original)?;
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiErr::bad_request(format!("reading logo upload: {e}")))?;
            if bytes.is_empty() {
                return Err(ApiErr::bad_request("logo file is empty"));
            }
            pending.logo = Some(LogoUpload { extension, bytes });
        } else if !pending.set_text(&name, read_text(field).await?)? {
            tracing::debug!(field = %name, "ignoring unknown settings field");
        }
    }

    let logo_url = apply_update(&db, &org_id, pending)?;

    Ok(Json(UpdateSettingsResponse {
        message: "settings updated".to_string(),
        logo_url,
    }))
}

/// A validated settings update buffered from the multipart stream.
#[derive(Default)]
struct PendingUpdate {
    name: Option<String>,
    primary_color: Option<String>,
    google_link: Option<String>,
    tripadvisor_link: Option<String>,
    enabled_languages: Option<String>,
    logo: Option<LogoUpload>,
}

struct LogoUpload {
    extension: String,
    bytes: axum::body::Bytes,
}

impl PendingUpdate {
    /// Validate and stage one text field. `Ok(false)` means the field name
    /// is not one we know.
    fn set_text(&mut self, field: &str, value: String) -> Result<bool, ServiceError> {
        match field {
            "name" => self.name = Some(validate_name(&value)?),
            "primaryColor" => self.primary_color = Some(validate_color(&value)?),
            "googleLink" => self.google_link = Some(value.trim().to_string()),
            "tripadvisorLink" => self.tripadvisor_link = Some(value.trim().to_string()),
            "enabledLanguages" => {
                let languages: Vec<String> = serde_json::from_str(&value).map_err(|_| {
                    ServiceError::BadRequest(
                        "enabledLanguages must be a JSON array of strings".into(),
                    )
                })?;
                if languages.is_empty() {
                    return Err(ServiceError::BadRequest(
                        "at least one language must be enabled".into(),
                    ));
                }
                self.enabled_languages = Some(
                    serde_json::to_string(&languages)
                        .map_err(|e| ServiceError::Internal(format!("encoding languages: {e}")))?,
                );
            }
            _ => return Ok(false),
        }
        Ok(true)
    }
}

/// Write a fully validated update: logo file to disk, then every staged
/// field in a single transaction. Returns the new logo URL, if any.
fn apply_update(db: &Db, org_id: &str, pending: PendingUpdate) -> Result<Option<String>, ApiErr> {
    let stored = match &pending.logo {
        Some(logo) => {
            let stored = format!(
                "{}_{}.{}",
                sanitize_filename(org_id),
                Uuid::new_v4(),
                logo.extension
            );
            db.write_logo(&stored, &logo.bytes)
                .map_err(|e| ApiErr::internal(format!("storing logo: {e}")))?;
            Some(stored)
        }
        None => None,
    };

    let mut conn = db.conn();
    let tx = conn
        .transaction()
        .map_err(ApiErr::from_db("starting settings update"))?;

    if let Some(name) = &pending.name {
        sq_execute(&tx, dbq::restaurants::update_name(org_id, name))
            .map_err(ApiErr::from_db("updating restaurant name"))?;
    }
    if let Some(color) = &pending.primary_color {
        sq_execute(&tx, dbq::restaurants::update_primary_color(org_id, color))
            .map_err(ApiErr::from_db("updating primary color"))?;
    }
    if let Some(link) = &pending.google_link {
        sq_execute(&tx, dbq::restaurants::update_google_link(org_id, link))
            .map_err(ApiErr::from_db("updating google link"))?;
    }
    if let Some(link) = &pending.tripadvisor_link {
        sq_execute(&tx, dbq::restaurants::update_tripadvisor_link(org_id, link))
            .map_err(ApiErr::from_db("updating tripadvisor link"))?;
    }
    if let Some(json) = &pending.enabled_languages {
        sq_execute(&tx, dbq::restaurants::update_enabled_languages(org_id, json))
            .map_err(ApiErr::from_db("updating enabled languages"))?;
    }
    if let Some(file) = &stored {
        sq_execute(&tx, dbq::restaurants::update_logo_file(org_id, file))
            .map_err(ApiErr::from_db("updating logo"))?;
    }

    tx.commit()
        .map_err(ApiErr::from_db("committing settings update"))?;

    Ok(stored.map(logo_url))
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, ApiErr> {
    field
        .text()
        .await
        .map_err(|e| ApiErr::bad_request(format!("reading form field: {e}")))
}

/// Lowercased extension of the uploaded filename, restricted to the image
/// formats the dashboard can display.
fn logo_extension(filename: &str) -> Result<String, ApiErr> {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    if !ALLOWED_LOGO_EXTENSIONS.contains(&ext.as_str()) {
        return Err(ApiErr::bad_request(
            "logo must be a png, jpg, jpeg or gif file",
        ));
    }
    Ok(ext)
}

/// Keep only characters safe for a filename on disk.
fn sanitize_filename(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::init_test_db;

    fn test_db() -> Db {
        let dir = tempfile::tempdir().unwrap();
        init_test_db(&dir.keep()).unwrap()
    }

    fn seed_restaurant(db: &Db, org_id: &str) {
        let conn = db.conn();
        sq_execute(
            &conn,
            dbq::restaurants::upsert("r1", org_id, "Chez Test", Some("chez-test")),
        )
        .unwrap();
    }

    #[test]
    fn settings_row_maps_to_wire_shape() {
        let db = test_db();
        seed_restaurant(&db, "org_1");

        let conn = db.conn();
        sq_execute(&conn, dbq::restaurants::update_logo_file("org_1", "org_1_x.png")).unwrap();

        let row = sq_query_row(&conn, dbq::restaurants::get_settings("org_1"), |row| {
            Ok(SettingsRow {
                name: row.get(1)?,
                slug: row.get(2)?,
                logo_file: row.get(3)?,
                primary_color: row.get(4)?,
                google_link: row.get(5)?,
                tripadvisor_link: row.get(6)?,
                enabled_languages: row.get(7)?,
            })
        })
        .unwrap();

        let resp = row.into_response();
        assert_eq!(resp.name, "Chez Test");
        assert_eq!(resp.slug, "chez-test");
        assert_eq!(resp.logo_url.as_deref(), Some("/uploads/org_1_x.png"));
        assert_eq!(resp.primary_color, "#D69E2E");
        assert_eq!(resp.enabled_languages, vec!["fr", "en"]);
    }

    #[test]
    fn field_updates_persist_independently() {
        let db = test_db();
        seed_restaurant(&db, "org_1");

        let conn = db.conn();
        sq_execute(&conn, dbq::restaurants::update_name("org_1", "Renamed")).unwrap();
        sq_execute(&conn, dbq::restaurants::update_primary_color("org_1", "#112233")).unwrap();

        let (name, color): (String, String) =
            sq_query_row(&conn, dbq::restaurants::get_settings("org_1"), |row| {
                Ok((row.get(1)?, row.get(4)?))
            })
            .unwrap();
        assert_eq!(name, "Renamed");
        assert_eq!(color, "#112233");
    }

    #[test]
    fn bad_field_rejects_before_any_write() {
        let db = test_db();
        seed_restaurant(&db, "org_1");

        // Handler flow: stage every part, then apply. A bad later part
        // fails staging, so nothing reaches the database.
        let mut pending = PendingUpdate::default();
        pending.set_text("name", "Renamed".into()).unwrap();
        assert!(pending.set_text("primaryColor", "not-a-color".into()).is_err());

        let conn = db.conn();
        let name: String = sq_query_row(&conn, dbq::restaurants::get_settings("org_1"), |row| {
            row.get(1)
        })
        .unwrap();
        assert_eq!(name, "Chez Test");
    }

    #[test]
    fn apply_writes_all_staged_fields_at_once() {
        let db = test_db();
        seed_restaurant(&db, "org_1");

        let mut pending = PendingUpdate::default();
        pending.set_text("name", "Renamed".into()).unwrap();
        pending.set_text("primaryColor", "#112233".into()).unwrap();
        pending
            .set_text("enabledLanguages", r#"["de","it"]"#.into())
            .unwrap();
        let logo_url = apply_update(&db, "org_1", pending).unwrap();
        assert!(logo_url.is_none());

        let conn = db.conn();
        let (name, color, languages): (String, String, String) =
            sq_query_row(&conn, dbq::restaurants::get_settings("org_1"), |row| {
                Ok((row.get(1)?, row.get(4)?, row.get(7)?))
            })
            .unwrap();
        assert_eq!(name, "Renamed");
        assert_eq!(color, "#112233");
        assert_eq!(languages, r#"["de","it"]"#);
    }

    #[test]
    fn unknown_field_is_ignored_not_rejected() {
        let mut pending = PendingUpdate::default();
        assert!(!pending.set_text("csrfToken", "x".into()).unwrap());
    }

    #[test]
    fn logo_extension_allow_list() {
        assert_eq!(logo_extension("photo.PNG").unwrap(), "png");
        assert_eq!(logo_extension("a.b.jpeg").unwrap(), "jpeg");
        assert!(logo_extension("script.svg").is_err());
        assert!(logo_extension("noextension").is_err());
    }

    #[test]
    fn filenames_are_sanitized() {
        assert_eq!(sanitize_filename("org_2abc"), "org_2abc");
        assert_eq!(sanitize_filename("../etc/passwd"), "___etc_passwd");
    }

    #[test]
    fn bad_languages_fall_back_to_default() {
        assert_eq!(parse_languages("not json"), vec!["fr", "en"]);
        assert_eq!(parse_languages(r#"["de"]"#), vec!["de"]);
    }
}
