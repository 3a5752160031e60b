use anyhow::Result;
use base64::{engine::general_purpose, Engine as _};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub email: String,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub exp: Option<i64>,
}

/// Decode JWT claims without validation.
///
/// Tokens only ever come straight from the backend's login response, and the
/// backend verifies them on every call; the claims are read here solely to
/// label the session.
pub fn decode_jwt_claims(token: &str) -> Result<JwtClaims> {
    let mut parts = token.split('.');
    let payload = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(_), Some(payload), Some(_), None) => payload,
        _ => return Err(anyhow::anyhow!("Invalid JWT format")),
    };

    let payload = general_purpose::URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| anyhow::anyhow!("Failed to decode JWT payload: {}", e))?;

    let claims: JwtClaims = serde_json::from_slice(&payload)
        .map_err(|e| anyhow::anyhow!("Failed to parse JWT claims: {}", e))?;

    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_roles_when_present() {
        // {"sub":"u9","email":"admin@area.dev","roles":["admin","user"]}
        let payload = general_purpose::URL_SAFE_NO_PAD
            .encode(br#"{"sub":"u9","email":"admin@area.dev","roles":["admin","user"]}"#);
        let token = format!("e30.{}.sig", payload);

        let claims = decode_jwt_claims(&token).unwrap();
        assert_eq!(claims.sub, "u9");
        assert_eq!(claims.roles, vec!["admin", "user"]);
        assert!(claims.exp.is_none());
    }

    #[test]
    fn rejects_wrong_segment_count() {
        assert!(decode_jwt_claims("a.b").is_err());
        assert!(decode_jwt_claims("a.b.c.d").is_err());
    }
}
