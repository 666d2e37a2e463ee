//! `${ENV_VAR}` substitution in config file text.

/// Replace `${ENV_VAR}` placeholders in the raw config text.
///
/// Unresolvable or malformed placeholders are left as-is.
pub fn substitute_env(input: &str) -> String {
    substitute_with(input, |name| std::env::var(name).ok())
}

fn substitute_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut result = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) if end > 0 => {
                let name = &after[..end];
                match lookup(name) {
                    Some(value) => result.push_str(&value),
                    None => {
                        result.push_str("${");
                        result.push_str(name);
                        result.push('}');
                    },
                }
                rest = &after[end + 1..];
            },
            _ => {
                // No closing brace (or empty name): emit literally.
                result.push_str("${");
                rest = after;
            },
        }
    }
    result.push_str(rest);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(name: &str) -> Option<String> {
        match name {
            "WABRIDGE_TEST_URL" => Some("https://backend.example.com".into()),
            "EMPTYISH" => Some(String::new()),
            _ => None,
        }
    }

    #[test]
    fn substitutes_known_var() {
        let out = substitute_with("url = \"${WABRIDGE_TEST_URL}\"", lookup);
        assert_eq!(out, "url = \"https://backend.example.com\"");
    }

    #[test]
    fn leaves_unknown_var_as_is() {
        let out = substitute_with("url = \"${NOT_SET_ANYWHERE}\"", lookup);
        assert_eq!(out, "url = \"${NOT_SET_ANYWHERE}\"");
    }

    #[test]
    fn substitutes_empty_value() {
        let out = substitute_with("x = \"${EMPTYISH}\"", lookup);
        assert_eq!(out, "x = \"\"");
    }

    #[test]
    fn unterminated_placeholder_is_literal() {
        let out = substitute_with("x = \"${OOPS", lookup);
        assert_eq!(out, "x = \"${OOPS");
    }

    #[test]
    fn multiple_placeholders() {
        let out = substitute_with("${WABRIDGE_TEST_URL}/${NOT_SET}", lookup);
        assert_eq!(out, "https://backend.example.com/${NOT_SET}");
    }
}
