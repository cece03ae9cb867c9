//! Courses, assignments and notebooks an instructor can copy from.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};
use walkdir::WalkDir;

use ananke_core::Layout;
use ananke_core::course::CourseInfo;
use ananke_core::registry::Registry;

const FORMGRADE_PREFIX: &str = "formgrade-";
const SOURCE_DIR: &str = "source";
const BACKUP_SUFFIX: &str = " (Backup)";
const CHECKPOINTS_DIR: &str = ".ipynb_checkpoints";

/// Display names and paths, index-aligned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CourseList {
    pub names: Vec<String>,
    pub paths: Vec<PathBuf>,
}

impl CourseList {
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.paths.iter().any(|p| p == path)
    }
}

fn is_notebook(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "ipynb")
}

/// True when a `.ipynb` file exists anywhere below `dir`.
pub fn has_notebooks(dir: &Path) -> bool {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .any(|entry| {
            entry.file_type().is_file() && is_notebook(entry.path())
        })
}

/// Notebooks below `dir`, sorted, skipping Jupyter checkpoints.
pub fn notebooks(dir: &Path) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_entry(|entry| entry.file_name() != CHECKPOINTS_DIR)
        .filter_map(Result::ok)
        .filter(|entry| {
            entry.file_type().is_file() && is_notebook(entry.path())
        })
        .map(|entry| entry.into_path())
        .collect();
    found.sort();
    found
}

/// Subdirectories of `dir` that contain notebooks, sorted by name.
pub fn assignment_dirs(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() && has_notebooks(&entry.path()) {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Builds the copy list for `user`.
///
/// Active courses are those whose formgrade group lists the user, other
/// than `current_course`. Backups live below the user's private home.
pub fn list_sources(
    layout: &Layout,
    registry: &Registry,
    user: &str,
    current_course: &str,
) -> CourseList {
    let mut active: Vec<(PathBuf, String)> = registry
        .groups
        .iter()
        .filter_map(|(group, members)| {
            let course_id = group.strip_prefix(FORMGRADE_PREFIX)?;
            (course_id != current_course && members.iter().any(|m| m == user))
                .then_some(course_id)
        })
        .filter_map(|course_id| {
            let grader = registry
                .service(course_id)
                .map_or(course_id, |s| s.user.as_str());
            let source = layout.course_data_dir(grader).join(SOURCE_DIR);
            if !has_notebooks(&source) {
                return None;
            }
            let title = match CourseInfo::load(&layout.course_info_path(grader)) {
                Ok(Some(info)) => info.title,
                Ok(None) => course_id.to_string(),
                Err(err) => {
                    warn!(course_id, %err, "unreadable course info");
                    course_id.to_string()
                }
            };
            Some((source, title))
        })
        .collect();
    active.sort();

    let mut backups = backup_sources(&layout.private_home(user));
    backups.sort();
    debug!(
        user,
        active = active.len(),
        backups = backups.len(),
        "copy sources collected"
    );

    let mut list = CourseList::default();
    for group in [active, backups] {
        let (paths, names): (Vec<_>, Vec<_>) = group.into_iter().unzip();
        list.names.extend(display_names(names));
        list.paths.extend(paths);
    }
    list
}

/// Every assignment of every source, named `"{source} / {assignment}"`.
pub fn list_assignments(sources: &CourseList) -> CourseList {
    let mut list = CourseList::default();
    for (name, source) in sources.names.iter().zip(&sources.paths) {
        let dirs = match assignment_dirs(source) {
            Ok(dirs) => dirs,
            Err(err) => {
                warn!(source = %source.display(), %err, "unreadable source");
                continue;
            }
        };
        for dir in dirs {
            let assignment = dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            list.names.push(format!("{name} / {assignment}"));
            list.paths.push(dir);
        }
    }
    list
}

/// Every notebook of every assignment, named by its path below the
/// assignment: `"{source} / {assignment} / {file}"`.
pub fn list_problems(assignments: &CourseList) -> CourseList {
    let mut list = CourseList::default();
    for (name, dir) in assignments.names.iter().zip(&assignments.paths) {
        for notebook in notebooks(dir) {
            let relative =
                notebook.strip_prefix(dir).unwrap_or(notebook.as_path());
            list.names.push(format!("{name} / {}", relative.display()));
            list.paths.push(notebook);
        }
    }
    list
}

fn backup_sources(private_home: &Path) -> Vec<(PathBuf, String)> {
    let Ok(entries) = std::fs::read_dir(private_home) else {
        return Vec::new();
    };
    entries
        .filter_map(Result::ok)
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| {
            let source = entry.path().join(SOURCE_DIR);
            has_notebooks(&source).then(|| {
                let name = entry.file_name().to_string_lossy().into_owned();
                (source, format!("{name}{BACKUP_SUFFIX}"))
            })
        })
        .collect()
}

/// Suffixes repeated names with ` (n)` and title-cases them.
fn display_names(names: Vec<String>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    names
        .into_iter()
        .map(|name| {
            let count = seen.entry(name.clone()).or_default();
            let unique = if *count == 0 {
                name
            } else {
                format!("{name} ({count})")
            };
            *count += 1;
            capwords(&unique.replace('_', " "))
        })
        .collect()
}

fn capwords(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notebook(dir: &Path) {
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(dir.join("task.ipynb"), "{}").unwrap();
    }

    #[test]
    fn capwords_normalizes_case_and_spacing() {
        assert_eq!(capwords("intro  to_rust"), "Intro To_rust");
        assert_eq!(capwords("ÄPFEL und birnen"), "Äpfel Und Birnen");
    }

    #[test]
    fn duplicate_names_are_numbered() {
        let names = display_names(vec![
            "cs101".into(),
            "data_science".into(),
            "cs101".into(),
            "cs101".into(),
        ]);
        assert_eq!(names, ["Cs101", "Data Science", "Cs101 (1)", "Cs101 (2)"]);
    }

    #[test]
    fn notebooks_are_found_recursively() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!has_notebooks(dir.path()));
        std::fs::create_dir_all(dir.path().join("a/b")).unwrap();
        std::fs::write(dir.path().join("a/b/readme.md"), "").unwrap();
        assert!(!has_notebooks(dir.path()));
        notebook(&dir.path().join("a/b/c"));
        assert!(has_notebooks(dir.path()));
    }

    #[test]
    fn lists_other_courses_and_backups() {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::rooted_at(dir.path());

        let mut registry = Registry::default();
        registry.add_group_member("formgrade-c-current", "alice");
        registry.add_group_member("formgrade-c-other", "alice");
        registry.add_group_member("formgrade-c-foreign", "bob");
        registry.add_group_member("formgrade-c-empty", "alice");

        for course in ["c-current", "c-other", "c-foreign"] {
            notebook(&layout.course_data_dir(course).join("source/hw1"));
        }
        std::fs::create_dir_all(layout.course_data_dir("c-empty").join("source"))
            .unwrap();
        let info = serde_json::json!({
            "id": "c-other", "title": "algebra_one", "title_short": "A",
            "grader_user": "c-other", "target_link_uri": "",
            "aud": null, "lineitem": null
        });
        std::fs::write(
            layout.course_info_path("c-other"),
            serde_json::to_vec(&info).unwrap(),
        )
        .unwrap();
        notebook(&layout.private_home("alice").join("old course/source/hw"));
        std::fs::create_dir_all(layout.private_home("alice").join("no notebooks"))
            .unwrap();

        let list = list_sources(&layout, &registry, "alice", "c-current");

        assert_eq!(list.names, ["Algebra One", "Old Course (backup)"]);
        assert_eq!(
            list.paths,
            [
                layout.course_data_dir("c-other").join("source"),
                layout.private_home("alice").join("old course/source"),
            ]
        );
    }

    #[test]
    fn assignments_and_problems_are_named_after_their_source() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first/source");
        let second = dir.path().join("second/source");
        notebook(&first.join("hw1"));
        std::fs::write(first.join("hw1/extra.ipynb"), "{}").unwrap();
        notebook(&first.join("hw1/.ipynb_checkpoints"));
        notebook(&second.join("lab/part_a"));
        std::fs::create_dir_all(second.join("assets")).unwrap();
        let sources = CourseList {
            names: vec!["Algebra".into(), "Old Course (backup)".into()],
            paths: vec![first.clone(), second.clone()],
        };

        let assignments = list_assignments(&sources);
        assert_eq!(
            assignments.names,
            ["Algebra / hw1", "Old Course (backup) / lab"]
        );
        assert_eq!(assignments.paths, [first.join("hw1"), second.join("lab")]);

        let problems = list_problems(&assignments);
        assert_eq!(
            problems.names,
            [
                "Algebra / hw1 / extra.ipynb",
                "Algebra / hw1 / task.ipynb",
                "Old Course (backup) / lab / part_a/task.ipynb",
            ]
        );
        assert!(problems.contains(&second.join("lab/part_a/task.ipynb")));
        let checkpoint = first.join("hw1/.ipynb_checkpoints/task.ipynb");
        assert!(!problems.contains(&checkpoint));
    }

    #[test]
    fn assignment_dirs_skip_folders_without_notebooks() {
        let dir = tempfile::tempdir().unwrap();
        notebook(&dir.path().join("hw2"));
        notebook(&dir.path().join("hw1/nested"));
        std::fs::create_dir_all(dir.path().join("assets")).unwrap();
        std::fs::write(dir.path().join("loose.ipynb"), "{}").unwrap();

        let dirs = assignment_dirs(dir.path()).unwrap();
        assert_eq!(dirs, [dir.path().join("hw1"), dir.path().join("hw2")]);
    }
}
