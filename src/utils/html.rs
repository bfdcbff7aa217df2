// src/utils/html.rs

/// Sanitizes user-supplied rich text (course welcome text, message bodies).
///
/// Whitelist based: formatting tags such as `<p>` or `<b>` survive, `<script>`
/// and `<style>` are dropped together with their content, and event handler
/// attributes are stripped.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}
