//! `${NAME}` placeholder substitution for configuration files.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::domain::environment::EnvironmentMap;

static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    // Safety: this is a compile-time constant pattern: cannot fail.
    #[allow(clippy::expect_used)]
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution {
    pub text: String,
    /// Placeholder names with no variable, in order of first appearance.
    /// These are left in the text as written.
    pub unknown: Vec<String>,
}

impl Substitution {
    #[must_use]
    pub fn changed(&self, original: &str) -> bool {
        self.text != original
    }
}

#[must_use]
pub fn substitute(template: &str, env: &EnvironmentMap) -> Substitution {
    let mut unknown: Vec<String> = Vec::new();
    let text = PLACEHOLDER_RE.replace_all(template, |caps: &Captures<'_>| {
        let name = &caps[1];
        if let Some(value) = env.get(name) {
            value.to_string()
        } else {
            if !unknown.iter().any(|n| n == name) {
                unknown.push(name.to_string());
            }
            caps[0].to_string()
        }
    });
    Substitution {
        text: text.into_owned(),
        unknown,
    }
}
