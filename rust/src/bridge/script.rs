// JavaScript snippets injected into the hosted page.
//
// Everything interpolated goes through `js_string_literal`; the page never sees
// raw, quote-spliced payloads.

/// `window.handleNativeMessage` receives the envelope as a JSON string.
pub fn deliver_message(json: &str) -> String {
    format!(
        "if (window.handleNativeMessage) {{ window.handleNativeMessage({}); }} true;",
        js_string_literal(json)
    )
}

pub fn navigate(url: &str) -> String {
    format!("window.location.href = {}; true;", js_string_literal(url))
}

fn js_string_literal(s: &str) -> String {
    // JSON string syntax is valid JS, minus the two line terminators JSON allows raw.
    serde_json::Value::String(s.to_string())
        .to_string()
        .replace('\u{2028}', "\\u2028")
        .replace('\u{2029}', "\\u2029")
}

/// Inverse of [`deliver_message`], for tests.
#[cfg(test)]
pub(crate) fn decode_delivered(script: &str) -> Option<serde_json::Value> {
    let start = script.find("window.handleNativeMessage(")? + "window.handleNativeMessage(".len();
    let end = script.rfind("); }")?;
    let literal: String = serde_json::from_str(&script[start..end]).ok()?;
    serde_json::from_str(&literal).ok()
}
