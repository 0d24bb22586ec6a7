use ocr_bench::config::EngineVariant;
use ocr_bench::normalize::{normalize, strip_prompt_echo};
use proptest::prelude::*;

#[test]
fn strips_tags_and_markdown_symbols() {
    assert_eq!(normalize("<p>Hello Word</p>", EngineVariant::Markdown), "Hello Word");
    assert_eq!(
        normalize("# Title\n\n| a | b |\n|---|---|\n| **1** | 2 |", EngineVariant::Markdown),
        "Title a b 1 2"
    );
    assert_eq!(
        normalize("<table><tr><td>x</td><td>y</td></tr></table>", EngineVariant::Markdown),
        "x y"
    );
}

#[test]
fn hyphens_become_spaces() {
    assert_eq!(normalize("co-op", EngineVariant::Markdown), "co op");
}

#[test]
fn collapses_all_whitespace() {
    assert_eq!(normalize("  a\t\tb\n\n c  ", EngineVariant::Markdown), "a b c");
    assert_eq!(normalize("", EngineVariant::Markdown), "");
    assert_eq!(normalize(" \n\t ", EngineVariant::Markdown), "");
}

#[test]
fn unmatched_angle_brackets_survive() {
    assert_eq!(normalize("a < b", EngineVariant::Markdown), "a < b");
    assert_eq!(normalize("a <> b", EngineVariant::Markdown), "a <> b");
}

#[test]
fn removes_prompt_echo_prefix() {
    assert_eq!(
        normalize("User: OCR:\nAssistant: 허가증 <b>1994</b>", EngineVariant::PromptEcho),
        "허가증 1994"
    );
    assert_eq!(
        normalize("user:  ocr assistant:## Result", EngineVariant::PromptEcho),
        "Result"
    );
}

#[test]
fn prompt_echo_only_at_start() {
    assert_eq!(
        normalize("Text then User: OCR: Assistant: more", EngineVariant::PromptEcho),
        "Text then User: OCR: Assistant: more"
    );
    assert_eq!(strip_prompt_echo("no echo here"), "no echo here");
}

#[test]
fn markdown_variant_keeps_prompt_text() {
    assert_eq!(
        normalize("User: OCR: Assistant: hi", EngineVariant::Markdown),
        "User: OCR: Assistant: hi"
    );
}

#[test]
fn prompt_echo_hidden_behind_markup_is_idempotent() {
    let once = normalize("User: <i>OCR:</i> Assistant: x", EngineVariant::PromptEcho);
    assert_eq!(normalize(&once, EngineVariant::PromptEcho), once);
}

proptest! {
    #[test]
    fn markdown_normalization_is_idempotent(s in ".{0,80}") {
        let once = normalize(&s, EngineVariant::Markdown);
        prop_assert_eq!(normalize(&once, EngineVariant::Markdown), once);
    }

    #[test]
    fn markup_heavy_input_is_idempotent(s in r"[<>/a-zA-Z|#*\- \t\n:]{0,60}") {
        for variant in [EngineVariant::Markdown, EngineVariant::PromptEcho] {
            let once = normalize(&s, variant);
            prop_assert_eq!(normalize(&once, variant), once.clone());
            prop_assert!(!once.starts_with(' ') && !once.ends_with(' '));
            prop_assert!(!once.contains("  "));
        }
    }

    #[test]
    fn prompt_echo_output_never_starts_with_echo(body in "[a-z ]{0,20}", reps in 1usize..4) {
        let raw = format!("{}{}", "User: OCR: Assistant: ".repeat(reps), body);
        let once = normalize(&raw, EngineVariant::PromptEcho);
        prop_assert_eq!(once, body.split_whitespace().collect::<Vec<_>>().join(" "));
    }
}
