use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{TimeZone, Utc};
use tracing::debug;

use shared_models::auth::{Identity, JwtClaims};

/// Decode the identity carried by a bearer token.
///
/// The client holds no signing secret, so the signature segment is only
/// checked for presence; the backend remains the authority on validity.
/// Malformed and expired tokens are rejected.
pub fn decode_token(token: &str) -> Result<Identity, String> {
    let parts: Vec<&str> = token.trim().split('.').collect();
    if parts.len() != 3 || parts.iter().any(|part| part.is_empty()) {
        return Err("Invalid token format".to_string());
    }

    let claims_json = match URL_SAFE_NO_PAD.decode(parts[1].trim_end_matches('=')) {
        Ok(bytes) => match String::from_utf8(bytes) {
            Ok(json_str) => json_str,
            Err(_) => return Err("Invalid claims encoding".to_string()),
        },
        Err(_) => return Err("Invalid claims encoding".to_string()),
    };

    let claims: JwtClaims = match serde_json::from_str(&claims_json) {
        Ok(c) => c,
        Err(e) => {
            debug!("Failed to parse claims: {}", e);
            return Err("Invalid claims format".to_string());
        }
    };

    if let Some(exp) = claims.exp {
        let now = Utc::now().timestamp();
        if exp < now {
            debug!("Token expired at {} (now: {})", exp, now);
            return Err("Token expired".to_string());
        }
    }

    let expires_at = claims.exp.and_then(|ts| Utc.timestamp_opt(ts, 0).single());

    let identity = Identity {
        subject: claims.sub,
        role: claims.role,
        profile_id: claims.profile_id,
        doctor_id: claims.doctor_id,
        staff_id: claims.staff_id,
        email: claims.email,
        username: claims.username,
        expires_at,
    };

    debug!("Token decoded for {} ({})", identity.subject, identity.role);
    Ok(identity)
}
