//! `$<NAME>` template expansion for configuration strings.
//!
//! Plugin parameters and path settings may reference environment variables
//! as `$<NAME>`. Expansion is one pass, left to right: markers never
//! overlap, and substituted values are not rescanned, so a value containing
//! `$<...>` stays literal. A marker whose name has no value is left in
//! place and logged once; downstream code then fails with a path that still
//! names the missing variable.

/// Expand `$<NAME>` markers using an arbitrary lookup.
///
/// `lookup` returning `None` leaves the marker intact and emits one warning
/// naming the variable and the template. `NAME` is any non-empty sequence
/// of characters other than `>`; an empty or unterminated marker is
/// ordinary text.
pub fn expand_with<F>(template: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("$<") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        match after.find('>') {
            Some(end) if end > 0 => {
                let name = &after[..end];
                match lookup(name) {
                    Some(value) => out.push_str(&value),
                    None => {
                        tracing::warn!(
                            variable = %name,
                            template = %template,
                            "template variable not set, marker left in place"
                        );
                        out.push_str(&rest[start..start + 2 + end + 1]);
                    }
                }
                rest = &after[end + 1..];
            }
            // "$<>" or a "$<" with no closing ">" is literal text.
            _ => {
                out.push_str("$<");
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

/// Expand markers from the process environment.
pub fn expand_env(template: &str) -> String {
    expand_with(template, |name| std::env::var(name).ok())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
