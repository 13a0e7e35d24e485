/// Makes a series name safe to use as a model term: every character that is
/// not ASCII alphanumeric becomes `_`, and a leading digit gets an `X` prefix.
pub fn sanitize_name(raw: &str) -> String {
    let trimmed = raw.trim();
    let mut out: String = trimmed
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if out.is_empty() {
        out.push('X');
    } else if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, 'X');
    }
    out
}
