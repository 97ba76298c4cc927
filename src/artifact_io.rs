use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::config::PROJECT_DIR;

pub fn read_text_file(path: &Path) -> io::Result<String> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut text = String::new();
    reader.read_to_string(&mut text)?;
    Ok(text)
}

pub fn write_text_file(path: &Path, text: &str) -> io::Result<()> {
    ensure_parent_dir(path)?;
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(text.as_bytes())?;
    writer.flush()
}

pub fn write_text_file_if_missing(path: &Path, text: &str) -> io::Result<bool> {
    ensure_parent_dir(path)?;
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => {
            let mut writer = BufWriter::new(file);
            writer.write_all(text.as_bytes())?;
            writer.flush()?;
            Ok(true)
        }
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => Ok(false),
        Err(err) => Err(err),
    }
}

pub fn open_append(path: &Path) -> io::Result<File> {
    ensure_parent_dir(path)?;
    OpenOptions::new().create(true).append(true).open(path)
}

fn ensure_parent_dir(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

pub fn project_dir(project: &Path) -> PathBuf {
    project.join(PROJECT_DIR)
}

pub fn specs_dir(project: &Path) -> PathBuf {
    project_dir(project).join("specs")
}

pub fn plans_dir(project: &Path) -> PathBuf {
    project_dir(project).join("plans")
}

pub fn debug_dir(project: &Path) -> PathBuf {
    project_dir(project).join("debug")
}

pub fn prompt_dump_path(project: &Path, command: &str, step: usize, turn: usize) -> PathBuf {
    debug_dir(project).join(format!("{command}-s{step}-t{turn}-prompt.md"))
}

pub fn render_prompt_dump(user: &str, system: &str) -> String {
    let mut out = String::new();
    if !system.trim().is_empty() {
        out.push_str("# System Prompt\n\n");
        out.push_str(system.trim_end());
        out.push_str("\n\n");
    }
    out.push_str("# User Prompt\n\n");
    out.push_str(user.trim_end());
    out.push('\n');
    out
}

pub fn agent_log_path(
    log_dir: &Path,
    agent_command: &str,
    workflow_command: &str,
    now: DateTime<Local>,
) -> PathBuf {
    let agent = Path::new(agent_command)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(agent_command);
    log_dir.join(format!(
        "{}_{agent}_{workflow_command}.log",
        now.format("%Y-%m-%d")
    ))
}

pub fn session_separator(now: DateTime<Local>) -> String {
    format!(
        "\n\n========== NEW SESSION: {} ==========\n",
        now.format("%H:%M:%S")
    )
}
