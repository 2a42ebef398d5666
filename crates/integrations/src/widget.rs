//! Embeddable widget snippet.

use helpmate_database::Integration;

/// Escape `value` for use inside a single-quoted JavaScript string literal
/// embedded in HTML.
pub fn escape_js(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            '\'' => escaped.push_str("\\'"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            '<' => escaped.push_str("\\x3C"),
            '>' => escaped.push_str("\\x3E"),
            '&' => escaped.push_str("\\x26"),
            '\u{2028}' => escaped.push_str("\\u2028"),
            '\u{2029}' => escaped.push_str("\\u2029"),
            c if c.is_control() => escaped.push_str(&format!("\\u{:04X}", c as u32)),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Script tag a tenant pastes into their site. It loads the widget from
/// `script_url` and hands it the integration's API key and appearance.
pub fn widget_code(integration: &Integration, script_url: &str) -> String {
    format!(
        r#"<script>
  (function(w, d, s, o) {{
    w.HelpMateAI = o;
    var js, fjs = d.getElementsByTagName(s)[0];
    if (d.getElementById(o.scriptId)) return;
    js = d.createElement(s); js.id = o.scriptId;
    js.src = '{src}';
    js.async = 1;
    fjs.parentNode.insertBefore(js, fjs);
  }}(window, document, 'script', {{
    scriptId: 'helpmate-widget',
    apiKey: '{api_key}',
    position: '{position}',
    primaryColor: '{color}',
    chatTitle: '{title}',
    welcomeMessage: '{welcome}'
  }}));
</script>"#,
        src = escape_js(script_url),
        api_key = escape_js(&integration.api_key),
        position = integration.position.as_str(),
        color = escape_js(&integration.primary_color),
        title = escape_js(&integration.chat_title),
        welcome = escape_js(&integration.welcome_message),
    )
}
