//! `$variable` substitution for display template parameters
//!
//! Template parameters may reference per-session display variables such as
//! `$display` or `$vt`. A placeholder is a `$` followed by a maximal run of
//! non-whitespace characters. Placeholders without a binding in the variable
//! map are left in place verbatim, `$` included, so that a later substitution
//! pass (by the display manager, with variables only it knows) still finds
//! them.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$([^\s]+)").expect("placeholder pattern compiles"));

/// Replaces every `$name` in `value` with `variables[name]`.
///
/// Unknown placeholders are preserved verbatim.
pub fn apply_substitutions(value: &str, variables: &IndexMap<String, String>) -> String {
    PLACEHOLDER
        .replace_all(value, |captures: &Captures<'_>| {
            match variables.get(&captures[1]) {
                Some(replacement) => replacement.clone(),
                None => captures[0].to_owned(),
            }
        })
        .into_owned()
}

/// Applies [`apply_substitutions`] to every value of a parameter map.
///
/// Keys are preserved 1:1, in order.
pub fn evaluate_parameters(
    parameters: &IndexMap<String, String>,
    variables: &IndexMap<String, String>,
) -> IndexMap<String, String> {
    parameters
        .iter()
        .map(|(key, value)| (key.clone(), apply_substitutions(value, variables)))
        .collect()
}
