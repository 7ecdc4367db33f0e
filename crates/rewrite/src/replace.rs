use mirror_config::Replacement;

/// Apply literal find/replace pairs in order. Empty patterns are skipped.
pub(crate) fn apply_literal(text: &str, replacements: &[Replacement]) -> String {
    replacements.iter().filter(|r| !r.find.is_empty()).fold(text.to_string(), |text, r| text.replace(&r.find, &r.replace))
}
