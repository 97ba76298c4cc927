use std::path::{Path, PathBuf};

use serde_json::json;

use super::build_prompt_with_header;
use crate::artifact_io::{specs_dir, write_text_file_if_missing};
use crate::runner::Prompts;
use crate::workflow::{Step, Workflow};

const SYSTEM_PROMPT: &str = "You are a specification writer working with a user one section at a time.\n\
     Ask questions only through the HTML comment marker format shown in the task, exactly as given.\n\
     After asking a question, stop and wait for the answer; never invent the user's response.\n\
     Keep the spec file's headings intact and only edit the section you are working on.\n\
     Write concise, concrete, testable language. Avoid filler and marketing phrasing.\n\
     When the section is written, output <!-- FINISHED --> and nothing else.";

struct Section {
    header: &'static str,
    status_label: &'static str,
    question: &'static str,
    write_instruction: &'static str,
}

const SECTIONS: [Section; 7] = [
    Section {
        header: "Overview",
        status_label: "collecting overview",
        question: "Describe this feature in 2-3 sentences:\n• What is being built?\n• What problem does it solve?\n• Who benefits?\n\nBe specific and avoid generic phrases like 'improve the experience'.",
        write_instruction: "If the response is too vague (e.g. 'make it better'), ask one clarifying question using the same format. Maximum one clarification round.\n\nOnce you have the overview, edit the Overview section of the spec file with the response.",
    },
    Section {
        header: "Requirements",
        status_label: "collecting requirements",
        question: "List the specific, testable behaviours this feature must deliver.\n\nUse active voice:\n• 'Users can...'\n• 'The system must...'\n\nOne behaviour per line.",
        write_instruction: "If the response is too vague, ask one clarifying question. Maximum one clarification round.\n\nFormat the requirements as a markdown checklist (`- [ ] **Title** - description`) and write them to the Requirements section.",
    },
    Section {
        header: "Acceptance Criteria",
        status_label: "collecting acceptance criteria",
        question: "Requirement [N] of [total]: [Title]\n[requirement text]\n\nWhat is the pass/fail condition that proves this is done?\n\nExample: 'When X happens, Y is visible / saved / returned.'",
        write_instruction: "First list every requirement from the Requirements section, then ask about requirement 1 and stop. Ask about exactly one requirement per turn, replacing the bracketed placeholders in the question.\n\nIf an answer is not binary, ask what exactly would be observed. After two clarification rounds accept the answer and move on.\n\nAfter the last requirement, write all criteria to the Acceptance Criteria section.",
    },
    Section {
        header: "Constraints",
        status_label: "collecting constraints",
        question: "Are there any hard constraints or boundaries the solution must operate within?\n\nExamples:\n• Must integrate with the existing authentication system\n• Cannot introduce breaking changes to the public API\n\nLeave blank if there are no constraints.",
        write_instruction: "Write the response to the Constraints section. If blank, write 'None.'",
    },
    Section {
        header: "Technical Approach",
        status_label: "collecting technical approach",
        question: "Do you have any technical direction already decided?\n\nFor example:\n• Key architectural decisions\n• Preferred patterns or technologies\n• Known risks\n\nLeave blank to let the planner propose the approach.",
        write_instruction: "Write the response to the Technical Approach section. If blank, write 'None.'",
    },
    Section {
        header: "Success Metrics",
        status_label: "collecting success metrics",
        question: "How will you know this feature is working well after delivery?\n\n• Quantitative: 'p99 latency < 200ms'\n• Behavioural: 'users finish the flow without support'\n\nLeave blank if not applicable.",
        write_instruction: "Write the response to the Success Metrics section. If blank, write 'None.'",
    },
    Section {
        header: "Non-Goals",
        status_label: "collecting non-goals",
        question: "What is explicitly OUT of scope for this feature?\n\nLeave blank if there are no explicit exclusions.",
        write_instruction: "Write the response to the Non-Goals section. If blank, write 'None.'",
    },
];

pub(crate) fn spec_path(project: &Path, name: &str) -> PathBuf {
    let file_name = if name.ends_with(".md") {
        name.to_string()
    } else {
        format!("{name}.md")
    };
    specs_dir(project).join(file_name)
}

pub(crate) fn spec_creator_workflow(name: &str, project: &Path) -> Workflow {
    let path = spec_path(project, name);
    let section_names: Vec<&str> = SECTIONS.iter().map(|section| section.header).collect();
    let preamble = format!(
        "## Creating spec: {name}\n\n\
         I'll guide you through **{} sections** to build a complete specification. \
         Answer each question when prompted; the spec file is updated as we go.\n\n\
         **Sections:** {}",
        SECTIONS.len(),
        section_names.join(" → ")
    );

    let mut workflow = Workflow::new("new").with_preamble(preamble);
    for (index, section) in SECTIONS.iter().enumerate() {
        workflow = workflow.with_step(section_step(index, section, &path, name));
    }
    workflow.with_completion(move || Ok(Some(path)))
}

fn section_step(index: usize, section: &Section, path: &Path, name: &str) -> Step {
    let user = build_prompt_with_header(&section_task(index, section, path), section.header);
    let path = path.to_path_buf();
    let template = spec_template(name);
    Step::new(section.status_label, move |_, _| {
        if index == 0 {
            write_text_file_if_missing(&path, &template)
                .map_err(|err| format!("writing spec template {}: {err}", path.display()))?;
        }
        Ok(Prompts::new(user.clone(), SYSTEM_PROMPT))
    })
}

fn section_task(index: usize, section: &Section, path: &Path) -> String {
    let opening = if index == 0 {
        format!(
            "The spec file has been created at '{}'. Read it so you understand the template structure.",
            path.display()
        )
    } else {
        format!("The spec file is at '{}'. Read it.", path.display())
    };
    format!(
        "{opening}\n\n\
         Your task for this session: collect the **{header}** section only.\n\n\
         Ask the user this question:\n\n\
         {marker}\n\n\
         {instruction}\n\n\
         Then output:\n\n\
         <!-- FINISHED -->",
        header = section.header,
        marker = question_marker(section.header, section.question),
        instruction = section.write_instruction,
    )
}

fn question_marker(header: &str, question: &str) -> String {
    let payload = json!({
        "questions": [{
            "question": question,
            "header": header,
            "type": "text",
        }]
    });
    format!("<!--QUESTION:{payload}-->")
}

pub(crate) fn spec_template(name: &str) -> String {
    let title = to_title(name);
    let mut out = format!("# {title}\n\n");
    for section in &SECTIONS {
        out.push_str(&format!("## {}\n\n_To be completed._\n\n", section.header));
    }
    out
}

fn to_title(name: &str) -> String {
    name.trim_end_matches(".md")
        .split(['-', '_'])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
