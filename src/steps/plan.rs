use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::{build_prompt_with_header, display_relative, file_stem};
use crate::artifact_io::{plans_dir, read_text_file};
use crate::config::PROJECT_DIR;
use crate::runner::Prompts;
use crate::workflow::{Step, Workflow};

pub(crate) const PLAN_FILE: &str = "plan.md";

const SYSTEM_PROMPT: &str = "You are a planning agent. Turn the given specification into an implementation plan.\n\
     Explore the repository first so the plan matches the real code layout and conventions.\n\
     If the specification is ambiguous in a way that changes the plan, ask the user using the \
     <!--QUESTION:{\"questions\":[{\"question\":\"...\",\"header\":\"...\",\"type\":\"choice\",\"options\":[{\"label\":\"...\",\"description\":\"...\"}]}]}--> \
     marker format and stop until answered. Prefer choice questions with 2-4 options.\n\
     Write every plan file with your Write tool; the plan is only accepted once plan.md exists.";

pub(crate) fn plan_dir_for(spec_file: &Path, project: &Path) -> PathBuf {
    plans_dir(project).join(file_stem(spec_file))
}

pub(crate) fn plan_workflow(spec_file: &Path, project: &Path) -> Workflow {
    let spec_name = file_stem(spec_file);
    let plan_dir = plan_dir_for(spec_file, project);
    let preamble = format!(
        "## Planning: {spec_name}\n\n\
         I'll read your specification and generate a structured implementation plan. \
         The plan will be written to `{PROJECT_DIR}/plans/{spec_name}/` and includes:\n\n\
         - **Tasks**: ordered, actionable implementation steps\n\
         - **Context**: architectural notes and key decisions\n\
         - **Research**: relevant patterns and references\n\n\
         I may ask clarifying questions if the spec is ambiguous."
    );
    let label = spec_file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| spec_name.clone());

    let step_spec = spec_file.to_path_buf();
    let step_plan_dir = plan_dir.clone();
    let step = Step::new(label, move |_, cwd| {
        let spec_path = if step_spec.is_absolute() {
            step_spec.clone()
        } else {
            cwd.join(&step_spec)
        };
        let spec = read_text_file(&spec_path)
            .map_err(|err| format!("reading spec {}: {err}", spec_path.display()))?;
        prepare_plan_dir(&step_plan_dir)
            .map_err(|err| format!("preparing {}: {err}", step_plan_dir.display()))?;
        let user = build_plan_prompt(&spec, &display_relative(&step_plan_dir, cwd));
        Ok(Prompts::new(user, SYSTEM_PROMPT))
    });

    Workflow::new("plan")
        .with_preamble(preamble)
        .with_step(step)
        .with_completion(move || verify_plan_output(&plan_dir).map(Some))
}

pub(crate) fn build_plan_prompt(spec: &str, plan_dir: &str) -> String {
    let content = format!(
        "{spec}\n\n\
         ---\n\n\
         Write the plan to `{plan_dir}/{PLAN_FILE}`. Put architectural notes in \
         `{plan_dir}/context.md` and references in `{plan_dir}/research.md` when they are useful."
    );
    build_prompt_with_header(&content, "Specification to Plan")
}

pub(crate) fn prepare_plan_dir(plan_dir: &Path) -> io::Result<()> {
    fs::create_dir_all(plan_dir)?;
    match fs::remove_file(plan_dir.join(PLAN_FILE)) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}

pub(crate) fn verify_plan_output(plan_dir: &Path) -> Result<PathBuf, String> {
    if plan_dir.join(PLAN_FILE).is_file() {
        Ok(plan_dir.to_path_buf())
    } else {
        Err(format!(
            "agent did not produce {PLAN_FILE} in {}",
            plan_dir.display()
        ))
    }
}
