use super::*;

const CHOICE_MARKER: &str = r#"Before I start: <!--QUESTION:{"questions":[{"question":"Which approach?","header":"Approach","type":"choice","options":[{"label":"A","description":"fast"},{"label":"B","description":"safe"}]}]}--> thanks"#;

#[test]
fn finds_choice_question_with_options() {
    let questions = detect(CHOICE_MARKER);
    assert_eq!(questions.len(), 1);
    let q = &questions[0];
    assert_eq!(q.header, "Approach");
    assert_eq!(q.question, "Which approach?");
    assert_eq!(q.kind, QuestionKind::Choice);
    assert_eq!(
        q.options,
        vec![
            QuestionOption {
                label: "A".to_string(),
                description: "fast".to_string()
            },
            QuestionOption {
                label: "B".to_string(),
                description: "safe".to_string()
            },
        ]
    );
}

#[test]
fn never_synthesizes_an_other_option() {
    let questions = detect(CHOICE_MARKER);
    assert!(
        questions[0]
            .options
            .iter()
            .all(|option| option.label != OTHER_OPTION_LABEL)
    );
}

#[test]
fn no_marker_returns_empty() {
    assert!(detect("plain agent output with <!-- a comment -->").is_empty());
    assert!(detect("").is_empty());
}

#[test]
fn invalid_json_payload_is_skipped() {
    assert!(detect("<!--QUESTION:not-valid-json-->").is_empty());
    assert!(detect("<!--QUESTION:{\"questions\": [}-->").is_empty());
}

#[test]
fn missing_type_defaults_to_text() {
    let text = r#"<!--QUESTION:{"questions":[{"question":"Describe it","header":"Overview"},{"question":"More?","header":"Extra","options":[{"label":"x"},{"label":"y"}]}]}-->"#;
    let questions = detect(text);
    assert_eq!(questions.len(), 2);
    assert!(questions.iter().all(|q| q.kind == QuestionKind::Text));
    assert!(questions.iter().all(|q| q.options.is_empty()));
}

#[test]
fn choice_with_fewer_than_two_options_degrades_to_text() {
    let text = r#"<!--QUESTION:{"questions":[{"question":"Q?","header":"H","type":"choice","options":[{"label":"only"}]}]}-->"#;
    let questions = detect(text);
    assert_eq!(questions.len(), 1);
    assert_eq!(questions[0].kind, QuestionKind::Text);
}

#[test]
fn multiline_payload_and_multiple_markers_keep_order() {
    let text = "first <!--QUESTION:{\n  \"questions\": [{\"question\": \"One?\", \"header\": \"1\"}]\n}-->\n\
                second <!--QUESTION:{\"questions\":[{\"question\":\"Two?\",\"header\":\"2\",\"type\":\"text\"}]}-->";
    let questions = detect(text);
    let headers: Vec<&str> = questions.iter().map(|q| q.header.as_str()).collect();
    assert_eq!(headers, vec!["1", "2"]);
}

#[test]
fn detect_is_idempotent() {
    let text = format!("{CHOICE_MARKER}\n<!--QUESTION:{{\"questions\":[{{\"question\":\"Why?\",\"header\":\"Why\"}}]}}-->");
    let first = detect(&text);
    let second = detect(&text);
    assert_eq!(first, second);
    assert_eq!(first.len(), 2);
}

#[test]
fn options_without_labels_are_dropped() {
    let text = r#"<!--QUESTION:{"questions":[{"question":"Q","header":"H","type":"choice","options":[{"description":"nameless"},{"label":"A"},"B"]}]}-->"#;
    let questions = detect(text);
    assert_eq!(questions[0].kind, QuestionKind::Choice);
    let labels: Vec<&str> = questions[0].options.iter().map(|o| o.label.as_str()).collect();
    assert_eq!(labels, vec!["A", "B"]);
}

#[test]
fn strip_markers_keeps_surrounding_text() {
    assert_eq!(strip_markers(CHOICE_MARKER), "Before I start:  thanks");
    assert_eq!(strip_markers("no markers here"), "no markers here");
}
