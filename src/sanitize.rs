//! Escaping of user input before it enters the conversation.
//!
//! User text is echoed back into rendered chat output, so the characters that open and close
//! markup tags are replaced with their entity forms.  This keeps pasted tags from being
//! interpreted by a markup-aware display.  It is not a boundary against the model.

/// Replaces `<` with `&lt;` and `>` with `&gt;`.
///
/// `&` is left alone, so text that is already escaped passes through unchanged.
///
/// ```
/// # use bothichatva::sanitize;
/// assert_eq!(sanitize("<script>"), "&lt;script&gt;");
/// assert_eq!(sanitize("&lt;b&gt;"), "&lt;b&gt;");
/// ```
pub fn sanitize(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
    out
}

/// Reverses [`sanitize`] for displays that do not interpret markup, such as a terminal.
pub fn unescape(text: &str) -> String {
    text.replace("&lt;", "<").replace("&gt;", ">")
}

/// True when the input carries nothing worth sending.
pub fn is_blank(input: &str) -> bool {
    input.trim().is_empty()
}
