use std::io;
use std::path::{Path, PathBuf};

use super::build_prompt_with_header;
use super::plan::PLAN_FILE;
use crate::artifact_io::{plans_dir, read_text_file};
use crate::runner::Prompts;
use crate::workflow::{Step, Workflow};

const SYSTEM_PROMPT: &str = "You are an implementation agent executing an approved plan.\n\
     Work through the plan's tasks in order, keeping changes scoped to what each task describes.\n\
     Run the project's tests after meaningful changes and fix failures you introduced.\n\
     If a decision is genuinely blocked on the user, ask using the \
     <!--QUESTION:{\"questions\":[{\"question\":\"...\",\"header\":\"...\",\"type\":\"text\"}]}--> \
     marker format and stop until answered.\n\
     Finish with a short summary of what changed and anything left undone.";

pub(crate) fn resolve_plan_dir(arg: &str, project: &Path) -> Result<PathBuf, String> {
    let candidates = [
        PathBuf::from(arg),
        project.join(arg),
        plans_dir(project).join(arg),
    ];
    candidates
        .iter()
        .find(|dir| dir.join(PLAN_FILE).is_file())
        .cloned()
        .ok_or_else(|| {
            format!(
                "{PLAN_FILE} not found: tried {}, {} and {}",
                candidates[0].display(),
                candidates[1].display(),
                candidates[2].display()
            )
        })
}

pub(crate) fn load_plan_content(plan_dir: &Path) -> io::Result<String> {
    let plan = read_text_file(&plan_dir.join(PLAN_FILE)).map_err(|err| {
        io::Error::new(
            err.kind(),
            format!("{PLAN_FILE} not found in {}: {err}", plan_dir.display()),
        )
    })?;
    let mut out = String::new();
    if let Ok(context) = read_text_file(&plan_dir.join("context.md")) {
        push_section(&mut out, "context.md", &context);
    }
    push_section(&mut out, PLAN_FILE, &plan);
    if let Ok(research) = read_text_file(&plan_dir.join("research.md")) {
        push_section(&mut out, "research.md", &research);
    }
    Ok(out)
}

fn push_section(out: &mut String, name: &str, body: &str) {
    out.push_str("## ");
    out.push_str(name);
    out.push('\n');
    out.push_str(body);
    out.push_str("\n\n");
}

pub(crate) fn implement_workflow(plan_dir: &Path) -> Workflow {
    let label = plan_dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| plan_dir.display().to_string());
    let preamble = format!(
        "## Implementing: {label}\n\n\
         I'll work through the plan in `{}` and report what changed.",
        plan_dir.display()
    );
    let step_dir = plan_dir.to_path_buf();
    let step = Step::new(label, move |_, _| {
        let content = load_plan_content(&step_dir).map_err(|err| format!("loading plan: {err}"))?;
        Ok(Prompts::new(
            build_prompt_with_header(&content, "Implementation Plan"),
            SYSTEM_PROMPT,
        ))
    });
    let artifact = plan_dir.to_path_buf();
    Workflow::new("implement")
        .with_preamble(preamble)
        .with_step(step)
        .with_completion(move || Ok(Some(artifact)))
}
