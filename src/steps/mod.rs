use std::path::Path;

use crate::config::PROJECT_DIR;

pub(crate) mod implement;
pub(crate) mod plan;
pub(crate) mod spec_creator;

pub(crate) use implement::{implement_workflow, resolve_plan_dir};
pub(crate) use plan::plan_workflow;
pub(crate) use spec_creator::spec_creator_workflow;

pub(crate) fn build_prompt_with_header(content: &str, header: &str) -> String {
    format!(
        "Additional project knowledge, architectural context, and past learnings can be found in \
         `{PROJECT_DIR}/knowledge/`. Use your available tools to explore this directory as needed.\n\n\
         ---\n\n\
         # {header}\n\n\
         {content}"
    )
}

pub(crate) fn file_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(ToString::to_string)
        .unwrap_or_else(|| path.display().to_string())
}

pub(crate) fn display_relative(path: &Path, base: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .display()
        .to_string()
}

#[cfg(test)]
#[path = "../../tests/unit/steps_tests.rs"]
mod tests;
