use super::*;

#[test]
fn test_substitute_known_vars() {
    let vars = PromptVars::new().with("name", "Ada").with("lang", "Rust");
    assert_eq!(substitute("Hi {{name}}, you write {{ lang }}.", &vars), "Hi Ada, you write Rust.");
}

#[test]
fn test_substitute_unknown_var_is_empty() {
    assert_eq!(substitute("a{{missing}}b", &PromptVars::new()), "ab");
}

#[test]
fn test_substitute_unclosed_placeholder_kept() {
    assert_eq!(substitute("a {{oops", &PromptVars::new()), "a {{oops");
}

#[test]
fn test_substitute_does_not_recurse_into_values() {
    let vars = PromptVars::new().with("a", "{{b}}").with("b", "x");
    assert_eq!(substitute("{{a}}", &vars), "{{b}}");
}

#[test]
fn test_builtin_tools_template_mentions_format() {
    let renderer = TemplateRenderer::new();
    let text = renderer.render(TemplateId::Tools, &PromptVars::new().with("tools", "- search"));
    assert!(text.contains("- search"));
    assert!(text.contains("\"tool\""));
    assert!(text.contains("\"args\""));
}

#[test]
fn test_turn_template_layout() {
    let renderer = TemplateRenderer::new();
    let vars = PromptVars::new()
        .with("persona", "You are terse.")
        .with("instructions", "No tools.")
        .with("conversation", "User: hi");
    let text = renderer.render(TemplateId::Turn, &vars);
    assert!(text.starts_with("You are terse."));
    assert!(text.contains("User: hi"));
    assert!(text.ends_with("Assistant:"));
}

#[test]
fn test_override_template() {
    let renderer = TemplateRenderer::new().with_template(TemplateId::Summarize, "TL;DR {{conversation}}");
    let text = renderer.render(TemplateId::Summarize, &PromptVars::new().with("conversation", "abc"));
    assert_eq!(text, "TL;DR abc");
}

#[test]
fn test_template_ids() {
    assert_eq!(TemplateId::FollowUp.as_str(), "follow_up");
    assert_eq!(TemplateId::Router.as_str(), "router");
}
