//! URI templates for dynamic resources.
//!
//! Patterns like `file:///users/{user_id}.json` compile to an anchored
//! regex; a match binds every placeholder or fails. Placeholder values never
//! span a `/`.

use std::collections::HashMap;

use mcplex_protocol::{McpError, McpResult};
use regex::Regex;

/// A compiled URI template.
#[derive(Debug, Clone)]
pub struct UriTemplate {
    pattern: String,
    regex: Regex,
    variables: Vec<String>,
}

impl UriTemplate {
    /// Compile a `{var}` pattern.
    pub fn compile(pattern: &str) -> McpResult<Self> {
        let var_regex = Regex::new(r"\{([^{}]+)\}").expect("static regex");

        let mut variables = Vec::new();
        let mut regex_pattern = String::from("^");
        let mut last_end = 0;
        for captures in var_regex.captures_iter(pattern) {
            let whole = captures.get(0).expect("capture 0");
            let name = captures.get(1).expect("capture 1").as_str();
            if variables.iter().any(|v| v == name) {
                return Err(McpError::validation(format!(
                    "duplicate template variable '{name}' in '{pattern}'"
                )));
            }
            variables.push(name.to_string());
            regex_pattern.push_str(&regex::escape(&pattern[last_end..whole.start()]));
            regex_pattern.push_str("([^/]+)");
            last_end = whole.end();
        }
        regex_pattern.push_str(&regex::escape(&pattern[last_end..]));
        regex_pattern.push('$');

        let regex = Regex::new(&regex_pattern).map_err(|e| {
            McpError::validation(format!("template '{pattern}' failed to compile: {e}"))
        })?;

        Ok(Self {
            pattern: pattern.to_string(),
            regex,
            variables,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// Match a URI, binding every placeholder. `None` when the shape
    /// doesn't fit.
    pub fn match_uri(&self, uri: &str) -> Option<HashMap<String, String>> {
        let captures = self.regex.captures(uri)?;
        let mut bindings = HashMap::with_capacity(self.variables.len());
        for (i, name) in self.variables.iter().enumerate() {
            bindings.insert(name.clone(), captures.get(i + 1)?.as_str().to_string());
        }
        Some(bindings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_variable_binding() {
        let template = UriTemplate::compile("file:///users/{user_id}.json").unwrap();
        let bindings = template.match_uri("file:///users/alice.json").unwrap();
        assert_eq!(bindings["user_id"], "alice");
    }

    #[test]
    fn test_multiple_variables() {
        let template = UriTemplate::compile("db://{table}/{row}").unwrap();
        let bindings = template.match_uri("db://users/42").unwrap();
        assert_eq!(bindings["table"], "users");
        assert_eq!(bindings["row"], "42");
    }

    #[test]
    fn test_variable_does_not_span_slash() {
        let template = UriTemplate::compile("file:///docs/{name}.md").unwrap();
        assert!(template.match_uri("file:///docs/a/b.md").is_none());
    }

    #[test]
    fn test_anchored_matching() {
        let template = UriTemplate::compile("file:///{name}.txt").unwrap();
        assert!(template.match_uri("file:///a.txt.bak").is_none());
        assert!(template.match_uri("xfile:///a.txt").is_none());
    }

    #[test]
    fn test_literal_template_matches_exactly() {
        let template = UriTemplate::compile("file:///static.json").unwrap();
        assert!(template.match_uri("file:///static.json").is_some());
        assert!(template.match_uri("file:///other.json").is_none());
    }

    #[test]
    fn test_duplicate_variable_rejected() {
        assert!(UriTemplate::compile("x://{a}/{a}").is_err());
    }

    #[test]
    fn test_regex_metacharacters_in_literal_parts() {
        let template = UriTemplate::compile("file:///a+b/{x}").unwrap();
        assert!(template.match_uri("file:///a+b/1").is_some());
        assert!(template.match_uri("file:///aab/1").is_none());
    }
}
