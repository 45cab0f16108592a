// Access-token expiry check. We only read `exp`; signatures are the backend's problem.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

/// `exp` (seconds since epoch) from the payload of a three-segment dotted token.
pub fn access_token_expiry(token: &str) -> Option<i64> {
    let mut parts = token.split('.');
    let (_header, payload, _sig) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }

    // Issuers disagree on padding and alphabet; normalise to unpadded base64url.
    let normalized: String = payload
        .trim_end_matches('=')
        .chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            c => c,
        })
        .collect();
    let bytes = URL_SAFE_NO_PAD.decode(normalized).ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    let exp = claims.get("exp")?;
    exp.as_i64().or_else(|| exp.as_f64().map(|f| f.floor() as i64))
}

/// Unreadable tokens count as expired.
pub fn is_token_expired(token: &str, now_secs: i64) -> bool {
    match access_token_expiry(token) {
        Some(exp) => exp < now_secs,
        None => true,
    }
}

#[cfg(test)]
pub(crate) fn make_token(claims: serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.signature")
}
