//! `%var` substitution. Modeled as a string→string map keyed by
//! canonical names; substitution is single-pass, literal, left-to-right
//! in binding order; a stray unreplaced `%foo` is preserved verbatim.

/// Replace every occurrence of each binding's key with its value, in
/// the given order. Because this is a straight `.replace()` chain, not
/// a single simultaneous pass, a value that itself contains another key
/// is visible to later replacements. Callers rely on the fixed binding
/// order produced by [`crate::types::Component::bindings`] /
/// [`crate::rule::Rule::env_for`].
pub fn substitute(bindings: &[(&str, String)], input: &str) -> String {
    let mut result = input.to_string();
    for (key, value) in bindings {
        result = result.replace(key, value);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_known_vars_and_preserves_unknown() {
        let bindings = vec![("%id", "a#t@c".to_string()), ("%name", "a".to_string())];
        assert_eq!(substitute(&bindings, "echo %name (%id) %unknown"), "echo a (a#t@c) %unknown");
    }

    #[test]
    fn handles_empty_string() {
        let bindings: Vec<(&str, String)> = vec![("%id", "x".into())];
        assert_eq!(substitute(&bindings, ""), "");
    }
}
