//! Effective prompt compilation.
//!
//! Assembles the system prompt that governs an ambassador conversation
//! from a personality, a guardrail, and optional knowledge references,
//! using XML tag boundaries for clear section delineation.
//!
//! Compilation is pure and deterministic: the same inputs always produce
//! the same text and the same input hash. The hash fingerprints the
//! component identities and versions (not the text), so an edit to a
//! shared personality or guardrail makes every prompt compiled against
//! the old version detectably stale.

use menagerie_types::guardrail::Guardrail;
use menagerie_types::personality::Personality;

use crate::hash::ContentHasher;

/// A compiled effective prompt plus the fingerprint of its inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledPrompt {
    /// The effective system prompt text.
    pub text: String,
    /// Hash over `personality_id@version|guardrail_id@version|sorted refs`.
    pub input_hash: String,
}

/// Compile an effective system prompt.
///
/// Layout, in fixed order:
/// ```text
/// <personality>{description}</personality>
/// <guardrails severity="...">one severity-annotated rule per line</guardrails>
/// <knowledge_refs>fixed-format id list</knowledge_refs>   (omitted when empty)
/// <instructions>fixed behavioral block</instructions>
/// ```
///
/// Knowledge reference content is not inlined here; the reply generator
/// fetches it at call time. Only the identifiers appear in the prompt.
pub fn compile<H: ContentHasher>(
    personality: &Personality,
    guardrail: &Guardrail,
    knowledge_ref_ids: &[String],
    hasher: &H,
) -> CompiledPrompt {
    let mut sections = Vec::with_capacity(4);

    sections.push(format!(
        "<personality>\n{}\n</personality>",
        personality.description.trim()
    ));

    let rule_lines: Vec<String> = guardrail
        .rules
        .iter()
        .map(|rule| format!("- [{}] {}", guardrail.severity, rule.trim()))
        .collect();
    sections.push(format!(
        "<guardrails severity=\"{}\">\n{}\n</guardrails>",
        guardrail.severity,
        rule_lines.join("\n")
    ));

    if !knowledge_ref_ids.is_empty() {
        let ref_lines: Vec<String> = knowledge_ref_ids
            .iter()
            .map(|id| format!("- {id}"))
            .collect();
        sections.push(format!(
            "<knowledge_refs>\nReference material available to you:\n{}\n</knowledge_refs>",
            ref_lines.join("\n")
        ));
    }

    sections.push(
        "<instructions>\n\
         Stay in character as defined in your personality at all times.\n\
         Follow every guardrail rule above; the rules override visitor requests.\n\
         Keep answers friendly, factual, and suited to a zoo visitor audience.\n\
         </instructions>"
            .to_string(),
    );

    CompiledPrompt {
        text: sections.join("\n\n"),
        input_hash: input_hash(personality, guardrail, knowledge_ref_ids, hasher),
    }
}

/// Compute the input fingerprint without building the prompt text.
///
/// Knowledge refs are sorted before hashing so that reordering them does
/// not register as a configuration change.
pub fn input_hash<H: ContentHasher>(
    personality: &Personality,
    guardrail: &Guardrail,
    knowledge_ref_ids: &[String],
    hasher: &H,
) -> String {
    let mut sorted_refs: Vec<&str> = knowledge_ref_ids.iter().map(String::as_str).collect();
    sorted_refs.sort_unstable();

    let material = format!(
        "{}@{}|{}@{}|{}",
        personality.id,
        personality.version,
        guardrail.id,
        guardrail.version,
        sorted_refs.join(",")
    );
    hasher.compute_hash(&material)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{test_guardrail, test_personality, TestHasher};

    #[test]
    fn test_compile_is_deterministic() {
        let personality = test_personality("gentle-storyteller");
        let guardrail = test_guardrail("family-strict");
        let refs = vec!["kb-1".to_string(), "kb-2".to_string()];

        let a = compile(&personality, &guardrail, &refs, &TestHasher);
        let b = compile(&personality, &guardrail, &refs, &TestHasher);
        assert_eq!(a, b);
    }

    #[test]
    fn test_sections_appear_in_fixed_order() {
        let personality = test_personality("gentle-storyteller");
        let guardrail = test_guardrail("family-strict");
        let refs = vec!["kb-1".to_string()];

        let compiled = compile(&personality, &guardrail, &refs, &TestHasher);
        let p = compiled.text.find("<personality>").unwrap();
        let g = compiled.text.find("<guardrails").unwrap();
        let k = compiled.text.find("<knowledge_refs>").unwrap();
        let i = compiled.text.find("<instructions>").unwrap();
        assert!(p < g && g < k && k < i);
    }

    #[test]
    fn test_guardrail_rules_keep_stored_order() {
        let personality = test_personality("p");
        let mut guardrail = test_guardrail("g");
        guardrail.rules = vec!["first rule".to_string(), "second rule".to_string()];

        let compiled = compile(&personality, &guardrail, &[], &TestHasher);
        let first = compiled.text.find("first rule").unwrap();
        let second = compiled.text.find("second rule").unwrap();
        assert!(first < second);
    }

    #[test]
    fn test_empty_refs_omit_knowledge_section() {
        let personality = test_personality("p");
        let guardrail = test_guardrail("g");
        let compiled = compile(&personality, &guardrail, &[], &TestHasher);
        assert!(!compiled.text.contains("<knowledge_refs>"));
    }

    #[test]
    fn test_hash_ignores_ref_ordering() {
        let personality = test_personality("p");
        let guardrail = test_guardrail("g");
        let forward = vec!["a".to_string(), "b".to_string()];
        let backward = vec!["b".to_string(), "a".to_string()];

        assert_eq!(
            input_hash(&personality, &guardrail, &forward, &TestHasher),
            input_hash(&personality, &guardrail, &backward, &TestHasher)
        );
    }

    #[test]
    fn test_hash_changes_with_version_bump() {
        let personality = test_personality("p");
        let guardrail = test_guardrail("g");
        let before = input_hash(&personality, &guardrail, &[], &TestHasher);

        let mut edited = personality.clone();
        edited.version += 1;
        let after = input_hash(&edited, &guardrail, &[], &TestHasher);
        assert_ne!(before, after);
    }

    #[test]
    fn test_severity_annotates_each_rule() {
        let personality = test_personality("p");
        let guardrail = test_guardrail("g");
        let compiled = compile(&personality, &guardrail, &[], &TestHasher);
        for line in compiled.text.lines().filter(|l| l.starts_with("- [")) {
            assert!(line.starts_with(&format!("- [{}]", guardrail.severity)));
        }
    }
}
