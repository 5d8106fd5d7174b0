//! Database operations for `user_profiles`.

use boutique_core::ProfileDefaults;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use crate::DbError;

/// A row from the `user_profiles` table.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct ProfileRow {
    pub id: i64,
    pub username: String,
    pub default_phone_number: Option<String>,
    pub default_street_address1: Option<String>,
    pub default_street_address2: Option<String>,
    pub default_town_or_city: Option<String>,
    pub default_county: Option<String>,
    pub default_postcode: Option<String>,
    pub default_country: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProfileRow {
    #[must_use]
    pub fn defaults(&self) -> ProfileDefaults {
        ProfileDefaults {
            default_phone_number: self.default_phone_number.clone(),
            default_street_address1: self.default_street_address1.clone(),
            default_street_address2: self.default_street_address2.clone(),
            default_town_or_city: self.default_town_or_city.clone(),
            default_county: self.default_county.clone(),
            default_postcode: self.default_postcode.clone(),
            default_country: self.default_country.clone(),
        }
    }
}

const PROFILE_COLUMNS: &str = "id, username, default_phone_number, default_street_address1, \
     default_street_address2, default_town_or_city, default_county, default_postcode, \
     default_country, created_at, updated_at";

/// Returns the profile for `username`, creating an empty one on first use.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn get_or_create_profile(pool: &PgPool, username: &str) -> Result<ProfileRow, DbError> {
    // The no-op update makes RETURNING yield the existing row on conflict.
    let row = sqlx::query_as::<_, ProfileRow>(&format!(
        "INSERT INTO user_profiles (username) VALUES ($1) \
         ON CONFLICT (username) DO UPDATE SET username = EXCLUDED.username \
         RETURNING {PROFILE_COLUMNS}"
    ))
    .bind(username)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_profile_by_username(
    pool: &PgPool,
    username: &str,
) -> Result<Option<ProfileRow>, DbError> {
    let row = sqlx::query_as::<_, ProfileRow>(&format!(
        "SELECT {PROFILE_COLUMNS} FROM user_profiles WHERE username = $1"
    ))
    .bind(username)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Overwrites every default field on the profile.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the profile does not exist, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn update_profile_defaults(
    pool: &PgPool,
    profile_id: i64,
    defaults: &ProfileDefaults,
) -> Result<ProfileRow, DbError> {
    let row = sqlx::query_as::<_, ProfileRow>(&format!(
        "UPDATE user_profiles SET \
             default_phone_number    = $2, \
             default_street_address1 = $3, \
             default_street_address2 = $4, \
             default_town_or_city    = $5, \
             default_county          = $6, \
             default_postcode        = $7, \
             default_country         = $8, \
             updated_at              = NOW() \
         WHERE id = $1 \
         RETURNING {PROFILE_COLUMNS}"
    ))
    .bind(profile_id)
    .bind(&defaults.default_phone_number)
    .bind(&defaults.default_street_address1)
    .bind(&defaults.default_street_address2)
    .bind(&defaults.default_town_or_city)
    .bind(&defaults.default_county)
    .bind(&defaults.default_postcode)
    .bind(&defaults.default_country)
    .fetch_optional(pool)
    .await?;

    row.ok_or(DbError::NotFound)
}
