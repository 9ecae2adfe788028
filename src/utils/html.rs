// src/utils/html.rs

/// Sanitizes participant free text before it is stored.
///
/// Whitelist based (ammonia): harmless markup such as `<b>` survives,
/// `<script>` elements and event-handler attributes are removed. Stored
/// answers are shown in the admin panel, so this guards against stored XSS.
/// Grading always runs on the raw submission.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}
