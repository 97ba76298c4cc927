use std::path::PathBuf;

use super::implement::load_plan_content;
use super::spec_creator::spec_path;
use super::*;
use crate::artifact_io::{read_text_file, write_text_file};
use crate::config::Config;
use crate::questions::detect;
use crate::runner::{Event, EventKind, Prompts};
use crate::workflow::{Transition, WorkflowRun};

fn first_prompts(workflow: crate::workflow::Workflow, project: &Path) -> Prompts {
    let mut run = WorkflowRun::new(workflow, Config::default(), project);
    match run.start().expect("first step builds") {
        Transition::StartTurn(opts) => opts.prompts,
        other => panic!("expected a turn, got {other:?}"),
    }
}

#[test]
fn prompt_header_follows_knowledge_hint() {
    let prompt = build_prompt_with_header("body text", "Implementation Plan");
    assert!(prompt.starts_with("Additional project knowledge"));
    assert!(prompt.contains("`.specdrive/knowledge/`"));
    assert!(prompt.ends_with("---\n\n# Implementation Plan\n\nbody text"));
}

#[test]
fn spec_creator_has_seven_sections_each_asking_one_question() {
    let dir = tempfile::tempdir().expect("temp dir");
    let workflow = spec_creator_workflow("auth-flow", dir.path());
    assert_eq!(workflow.steps.len(), 7);
    assert_eq!(workflow.command, "new");
    let preamble = workflow.preamble.clone().unwrap_or_default();
    assert!(preamble.contains("Overview → Requirements → Acceptance Criteria"));

    let config = Config::default();
    for step in &workflow.steps {
        let prompts = (step.build)(&config, dir.path()).expect("step builds");
        let questions = detect(&prompts.user);
        assert_eq!(questions.len(), 1, "step {}", step.status_label);
        assert!(!prompts.system.is_empty());
        assert!(prompts.user.contains("<!-- FINISHED -->"));
    }
}

#[test]
fn first_spec_step_writes_template_only_when_missing() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = spec_path(dir.path(), "auth-flow");
    assert!(path.ends_with(".specdrive/specs/auth-flow.md"));

    first_prompts(spec_creator_workflow("auth-flow", dir.path()), dir.path());
    let template = read_text_file(&path).expect("template written");
    assert!(template.starts_with("# Auth Flow\n"));
    assert!(template.contains("## Non-Goals"));

    write_text_file(&path, "# Edited").expect("edit spec");
    first_prompts(spec_creator_workflow("auth-flow", dir.path()), dir.path());
    assert_eq!(read_text_file(&path).expect("spec kept"), "# Edited");
}

#[test]
fn spec_creator_completion_returns_spec_path() {
    let dir = tempfile::tempdir().expect("temp dir");
    let workflow = spec_creator_workflow("search.md", dir.path());
    let on_done = workflow.on_done.expect("completion callback");
    assert_eq!(
        on_done().expect("completion succeeds"),
        Some(dir.path().join(".specdrive/specs/search.md"))
    );
}

#[test]
fn plan_step_prepares_directory_and_removes_stale_plan() {
    let dir = tempfile::tempdir().expect("temp dir");
    let spec = dir.path().join("specs/billing.md");
    write_text_file(&spec, "# Billing\n\nCharge customers.").expect("write spec");
    let plan_dir = dir.path().join(".specdrive/plans/billing");
    write_text_file(&plan_dir.join("plan.md"), "stale").expect("stale plan");

    let prompts = first_prompts(plan_workflow(&spec, dir.path()), dir.path());

    assert!(plan_dir.is_dir());
    assert!(!plan_dir.join("plan.md").exists());
    assert!(prompts.user.contains("# Specification to Plan"));
    assert!(prompts.user.contains("Charge customers."));
    assert!(prompts.user.contains("`.specdrive/plans/billing/plan.md`"));
}

#[test]
fn plan_step_fails_for_missing_spec() {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut run = WorkflowRun::new(
        plan_workflow(Path::new("missing.md"), dir.path()),
        Config::default(),
        dir.path(),
    );
    let err = run.start().expect_err("missing spec fails");
    assert!(err.to_string().contains("missing.md"));
}

#[test]
fn plan_completion_requires_plan_file() {
    let dir = tempfile::tempdir().expect("temp dir");
    let spec = dir.path().join("feature.md");
    write_text_file(&spec, "spec").expect("write spec");
    let plan_dir = dir.path().join(".specdrive/plans/feature");

    let mut run = WorkflowRun::new(plan_workflow(&spec, dir.path()), Config::default(), dir.path());
    run.start().expect("step builds");
    let mut result = Event::new(EventKind::Result);
    result.text = "planned".to_string();
    run.on_event(&result).expect("result event");
    let err = run.on_turn_closed(None).expect_err("no plan written");
    assert!(err.to_string().contains("did not produce plan.md"));

    let mut run = WorkflowRun::new(plan_workflow(&spec, dir.path()), Config::default(), dir.path());
    run.start().expect("step builds");
    write_text_file(&plan_dir.join("plan.md"), "# Plan").expect("agent writes plan");
    run.on_event(&result).expect("result event");
    match run.on_turn_closed(None).expect("plan accepted") {
        Transition::Completed(outcome) => assert_eq!(outcome.artifact, Some(plan_dir)),
        other => panic!("expected completion, got {other:?}"),
    }
}

#[test]
fn plan_dir_resolution_tries_path_relative_and_name() {
    let dir = tempfile::tempdir().expect("temp dir");
    let named = dir.path().join(".specdrive/plans/billing");
    write_text_file(&named.join("plan.md"), "# Plan").expect("write plan");

    assert_eq!(resolve_plan_dir("billing", dir.path()), Ok(named.clone()));
    assert_eq!(
        resolve_plan_dir(".specdrive/plans/billing", dir.path()),
        Ok(named.clone())
    );
    let absolute = named.display().to_string();
    assert_eq!(resolve_plan_dir(&absolute, dir.path()), Ok(named));

    let err = resolve_plan_dir("nope", dir.path()).expect_err("unknown plan");
    assert!(err.contains("plan.md not found"));
}

#[test]
fn plan_content_orders_optional_files_around_plan() {
    let dir = tempfile::tempdir().expect("temp dir");
    write_text_file(&dir.path().join("plan.md"), "the plan").expect("plan");
    write_text_file(&dir.path().join("research.md"), "the research").expect("research");

    let content = load_plan_content(dir.path()).expect("content loads");
    assert_eq!(
        content,
        "## plan.md\nthe plan\n\n## research.md\nthe research\n\n"
    );

    write_text_file(&dir.path().join("context.md"), "the context").expect("context");
    let content = load_plan_content(dir.path()).expect("content loads");
    assert!(content.starts_with("## context.md\nthe context\n\n## plan.md"));
}

#[test]
fn implement_requires_plan_file() {
    let dir = tempfile::tempdir().expect("temp dir");
    assert!(load_plan_content(dir.path()).is_err());

    let mut run = WorkflowRun::new(
        implement_workflow(dir.path()),
        Config::default(),
        dir.path(),
    );
    assert!(run.start().is_err());
}

#[test]
fn implement_prompt_wraps_plan_content() {
    let dir = tempfile::tempdir().expect("temp dir");
    write_text_file(&dir.path().join("plan.md"), "do things").expect("plan");
    let workflow = implement_workflow(dir.path());
    assert_eq!(workflow.command, "implement");
    let prompts = first_prompts(workflow, dir.path());
    assert!(prompts.user.contains("# Implementation Plan\n\n## plan.md\ndo things"));
    assert!(!prompts.system.is_empty());
}

#[test]
fn relative_display_strips_project_prefix() {
    let project = PathBuf::from("/work/app");
    assert_eq!(
        display_relative(&project.join(".specdrive/plans/x"), &project),
        ".specdrive/plans/x"
    );
    assert_eq!(display_relative(Path::new("/elsewhere"), &project), "/elsewhere");
    assert_eq!(file_stem(Path::new("specs/auth-flow.md")), "auth-flow");
}
