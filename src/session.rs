//! Authenticated session state.
//!
//! A [`Session`] is an immutable value parsed atomically from a successful
//! two-phase login response. It is never partially constructed and never
//! refreshed in place; logging in again produces a new value.
//!
//! The expiry is read from the token's JWT `exp` claim without verifying the
//! signature. This client is not the trust boundary; the server is the
//! verification authority, and the expiry is informational only.

use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{PortalError, Result};

/// The authenticated context produced by a successful login.
#[derive(Debug, Clone)]
pub struct Session {
    /// Opaque bearer token (a JWT, signature unverified).
    pub token: String,
    /// Expiry from the token's `exp` claim. Informational: an expired token
    /// is only discovered via HTTP 401 on the next call.
    pub expiry: DateTime<Utc>,
    /// Display name of the institute (first entry of the institute list).
    pub institute: String,
    /// Institute identifier.
    pub institute_id: String,
    /// Member identifier.
    pub member_id: String,
    /// User identifier.
    pub user_id: String,
    /// Client identifier.
    pub client_id: String,
    /// Member type code (students are `"S"`).
    pub member_type: String,
    /// Student's display name.
    pub name: String,
    /// Enrollment number, when the backend provides one.
    pub enrollment_no: Option<String>,
}

impl Session {
    /// Builds a session from the phase-two login response. All fields are
    /// extracted before anything is constructed, so a malformed response
    /// never yields a partial session.
    pub(crate) fn from_login_response(response: &Value) -> Result<Self> {
        let regdata = response
            .get("regdata")
            .ok_or_else(|| PortalError::parse("login response missing 'regdata'"))?;

        let institute_entry = regdata
            .get("institutelist")
            .and_then(Value::as_array)
            .and_then(|list| list.first())
            .ok_or_else(|| PortalError::parse("login response has an empty institute list"))?;

        let token = field_string(regdata, "token")?;
        let expiry = decode_expiry(&token)?;

        Ok(Session {
            expiry,
            institute: field_string(institute_entry, "label")?,
            institute_id: field_string(institute_entry, "value")?,
            member_id: field_string(regdata, "memberid")?,
            user_id: field_string(regdata, "userid")?,
            client_id: field_string(regdata, "clientid")?,
            member_type: field_string(regdata, "membertype")?,
            name: field_string(regdata, "name")?,
            enrollment_no: field_string(regdata, "enrollmentno").ok(),
            token,
        })
    }

    /// `Authorization` header value for authenticated calls.
    pub(crate) fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

/// Claims we care about; everything else in the token is ignored.
#[derive(Debug, Deserialize)]
struct TokenClaims {
    exp: i64,
}

/// Reads the `exp` claim out of a JWT without verifying the signature.
pub(crate) fn decode_expiry(token: &str) -> Result<DateTime<Utc>> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;

    let data = decode::<TokenClaims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map_err(|e| PortalError::parse(format!("cannot decode session token: {e}")))?;

    Utc.timestamp_opt(data.claims.exp, 0)
        .single()
        .ok_or_else(|| PortalError::parse("session token has an out-of-range expiry"))
}

/// Extracts a field as a string, tolerating backends that send numbers where
/// identifiers are expected.
pub(crate) fn field_string(object: &Value, key: &str) -> Result<String> {
    match object.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(PortalError::parse(format!("response missing '{key}'"))),
    }
}
