use super::BindValue;

pub(crate) fn push_text(bind_params: &mut Vec<BindValue>, value: String) -> usize {
    bind_params.push(BindValue::Text(value));
    bind_params.len()
}

pub(crate) fn push_int(bind_params: &mut Vec<BindValue>, value: i32) -> usize {
    bind_params.push(BindValue::Int(value));
    bind_params.len()
}

pub(crate) fn push_big_int(bind_params: &mut Vec<BindValue>, value: i64) -> usize {
    bind_params.push(BindValue::BigInt(value));
    bind_params.len()
}

/// Escape `LIKE` metacharacters so user input matches literally.
///
/// Pair with `ESCAPE E'\\'` in the generated SQL.
pub(crate) fn escape_like_pattern(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
