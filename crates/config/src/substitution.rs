use anyhow::{Context, Result};
use regex::Regex;
use std::env;
use tracing::{debug, warn};

const PLACEHOLDER_PATTERN: &str = r"\$\{(\w+)\}|\$(\w+)";

fn placeholder_regex() -> Result<Regex> {
    Regex::new(PLACEHOLDER_PATTERN).context("invalid placeholder pattern")
}

/// Substitute environment variables in the format ${VAR_NAME} or $VAR_NAME
pub fn substitute_env_vars(content: &str) -> Result<String> {
    let re = placeholder_regex()?;
    let mut missing_vars = Vec::new();

    let result = re.replace_all(content, |caps: &regex::Captures<'_>| {
        let placeholder = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
        let Some(var_name) = caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str()) else {
            return placeholder.to_string();
        };

        match env::var(var_name) {
            Ok(value) => {
                debug!("Substituting environment variable: {}", var_name);
                value
            }
            Err(_) => {
                warn!("Environment variable '{}' not set", var_name);
                missing_vars.push(var_name.to_string());
                // Left in place; the validator reports it
                placeholder.to_string()
            }
        }
    });

    if !missing_vars.is_empty() {
        debug!("Environment variables not set: {:?}", missing_vars);
    }

    Ok(result.into_owned())
}

/// Names of unresolved placeholders in a string
pub fn unresolved_env_vars(content: &str) -> Vec<String> {
    let Ok(re) = placeholder_regex() else {
        return Vec::new();
    };
    re.captures_iter(content)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Check if a string contains unresolved environment variable placeholders
pub fn has_unresolved_env_vars(content: &str) -> bool {
    !unresolved_env_vars(content).is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitutes_both_forms() {
        env::set_var("HVX_SUB_A", "alpha");
        env::set_var("HVX_SUB_B", "beta");
        let out = substitute_env_vars("x: ${HVX_SUB_A}\ny: $HVX_SUB_B").unwrap();
        assert_eq!(out, "x: alpha\ny: beta");
    }

    #[test]
    fn test_missing_var_left_in_place() {
        env::remove_var("HVX_SUB_MISSING");
        let out = substitute_env_vars("key: ${HVX_SUB_MISSING}").unwrap();
        assert_eq!(out, "key: ${HVX_SUB_MISSING}");
        assert!(has_unresolved_env_vars(&out));
        assert_eq!(unresolved_env_vars(&out), vec!["HVX_SUB_MISSING".to_string()]);
    }
}
