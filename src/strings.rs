//! String helpers shared by the template functions and providers

/// Turn an arbitrary name into a key that is safe inside a quoted TOML key.
///
/// Every run of characters that is neither a letter nor a digit becomes a
/// single `-`, and leading/trailing separators are dropped. Dots in quoted
/// keys are otherwise ambiguous for downstream TOML consumers.
///
/// ```rust
/// use config_synth::normalize;
///
/// assert_eq!(normalize("foo.bar"), "foo-bar");
/// assert_eq!(normalize("a..b"), "a-b");
/// assert_eq!(normalize("  "), "");
/// ```
pub fn normalize(name: &str) -> String {
    name.split(|c: char| !c.is_alphabetic() && !c.is_numeric())
        .filter(|fragment| !fragment.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Split `s` on every literal occurrence of `sep`.
///
/// An empty separator splits after each character.
pub fn split(sep: &str, s: &str) -> Vec<String> {
    if sep.is_empty() {
        return s.chars().map(String::from).collect();
    }
    s.split(sep).map(String::from).collect()
}

/// Reverse the order of the given strings in place
pub fn reverse_string_slice(slice: &mut [String]) {
    if slice.len() < 2 {
        return;
    }
    let (mut i, mut j) = (0, slice.len() - 1);
    while i < j {
        slice.swap(i, j);
        i += 1;
        j -= 1;
    }
}
