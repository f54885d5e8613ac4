//! Merge-field substitution for subject and body text.

use crate::store::Lead;

/// First whitespace-delimited word of a full name, or empty.
pub fn first_name(full_name: &str) -> &str {
    full_name.split_whitespace().next().unwrap_or("")
}

/// Replace the five recognized merge tokens with the lead's fields.
///
/// Substitution is literal text replacement: unrecognized tokens pass
/// through verbatim and no HTML escaping is applied (bodies are
/// organization-authored HTML). Absent lead fields substitute as empty
/// strings.
pub fn merge(text: &str, lead: &Lead) -> String {
    let full = lead.full_name.as_deref().unwrap_or("");
    text.replace("{{full_name}}", full)
        .replace("{{first_name}}", first_name(full))
        .replace("{{email}}", &lead.email)
        .replace("{{company}}", lead.company.as_deref().unwrap_or(""))
        .replace("{{phone}}", lead.phone.as_deref().unwrap_or(""))
}
