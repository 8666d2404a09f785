//! Filesystem-safe key components.
//!
//! Every value that can appear as a job key dimension implements [`PathKey`],
//! which yields the string used both in the cache key and as a scratch
//! directory component.

/// Capability of rendering a value as one stable path component.
pub trait PathKey {
    fn path_key(&self) -> String;
}

impl PathKey for str {
    fn path_key(&self) -> String {
        sanitize_component(self)
    }
}

impl PathKey for String {
    fn path_key(&self) -> String {
        sanitize_component(self)
    }
}

macro_rules! display_path_key {
    ($($ty:ty),*) => {
        $(
            impl PathKey for $ty {
                fn path_key(&self) -> String {
                    self.to_string()
                }
            }
        )*
    };
}

display_path_key!(u8, u16, u32, u64, usize, i32, i64, bool);

/// Restrict a component to `[A-Za-z0-9._+-]`.
///
/// Anything else becomes `_`, and the reserved names `""`, `.` and `..` are
/// rewritten so the result can never step outside its parent directory.
pub fn sanitize_component(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '+' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    match cleaned.as_str() {
        "" => "_".to_string(),
        "." => "_.".to_string(),
        ".." => "_..".to_string(),
        _ => cleaned,
    }
}

/// Join already-rendered components with `/`.
pub fn join_components<I, S>(components: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    components
        .into_iter()
        .map(|c| sanitize_component(c.as_ref()))
        .collect::<Vec<_>>()
        .join("/")
}

/// True if `key` is a relative path made only of safe components.
pub fn is_safe_path_key(key: &str) -> bool {
    !key.is_empty()
        && !key.starts_with('/')
        && key
            .split('/')
            .all(|c| !c.is_empty() && c != "." && c != ".." && sanitize_component(c) == c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_keeps_dialect_and_header_names() {
        assert_eq!(sanitize_component("c++17"), "c++17");
        assert_eq!(sanitize_component("complex.h"), "complex.h");
        assert_eq!(sanitize_component("16.0.0"), "16.0.0");
    }

    #[test]
    fn test_sanitize_rewrites_traversal() {
        assert_eq!(sanitize_component(".."), "_..");
        assert_eq!(sanitize_component("."), "_.");
        assert_eq!(sanitize_component(""), "_");
        assert_eq!(sanitize_component("a/../b"), "a_.._b");
        assert_eq!(sanitize_component("x y\\z"), "x_y_z");
    }

    #[test]
    fn test_join_and_validate() {
        let key = join_components(["16.0.0", "c++17", "vector"]);
        assert_eq!(key, "16.0.0/c++17/vector");
        assert!(is_safe_path_key(&key));
        assert!(!is_safe_path_key("16.0.0/../etc"));
        assert!(!is_safe_path_key("/abs"));
        assert!(!is_safe_path_key(""));
    }

    #[test]
    fn test_display_fallback() {
        assert_eq!(10u32.path_key(), "10");
        assert_eq!(String::from("a b").path_key(), "a_b");
    }
}
