//! The per-grader `nbgrader_config.py`.

use crate::course::CourseIdentity;
use crate::layout::Layout;

/// Which parts of hidden tests are stripped from generated feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedbackSettings {
    /// Drop hidden test cells from feedback.
    pub remove_hidden: bool,
    /// Drop tracebacks of failed hidden tests from feedback.
    pub remove_hidden_trace: bool,
}

impl Default for FeedbackSettings {
    fn default() -> Self {
        Self {
            remove_hidden: true,
            remove_hidden_trace: false,
        }
    }
}

/// Per-grader `nbgrader_config.py`.
pub fn render(
    layout: &Layout,
    identity: &CourseIdentity,
    feedback: FeedbackSettings,
) -> String {
    let toggle = |on: bool| if on { "" } else { "#" };
    let root = layout.course_data_dir(&identity.grader_account_id);
    [
        "c = get_config()".to_string(),
        String::new(),
        format!("c.CourseDirectory.root = '{}'", root.display()),
        format!("c.CourseDirectory.course_id = '{}'", identity.course_id),
        String::new(),
        "c.GenerateFeedback.preprocessors = [".to_string(),
        "    'nbgrader.preprocessors.GetGrades',".to_string(),
        "    'nbconvert.preprocessors.CSSHTMLHeaderPreprocessor',".to_string(),
        "    # uncomment next line to remove hidden tests from feedback".to_string(),
        format!(
            "    {}'nbgrader.preprocessors.ClearHiddenTests',",
            toggle(feedback.remove_hidden)
        ),
        "    # uncomment next line to remove tracebacks of hidden tests from feedback"
            .to_string(),
        format!(
            "    {}'nbgrader.preprocessors.Execute',",
            toggle(feedback.remove_hidden_trace)
        ),
        "]".to_string(),
        String::new(),
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> CourseIdentity {
        CourseIdentity {
            course_id: "c-42".into(),
            course_title: "T (c-42)".into(),
            course_title_short: "T".into(),
            grader_account_id: "c-42".into(),
        }
    }

    #[test]
    fn defaults_strip_hidden_tests_but_keep_traces() {
        let text = render(&Layout::default(), &identity(), FeedbackSettings::default());
        assert!(text.contains("c.CourseDirectory.root = '/home/c-42/course_data'"));
        assert!(text.contains("c.CourseDirectory.course_id = 'c-42'"));
        assert!(text.contains("\n    'nbgrader.preprocessors.ClearHiddenTests',"));
        assert!(text.contains("\n    #'nbgrader.preprocessors.Execute',"));
    }

    #[test]
    fn flags_toggle_independently() {
        let text = render(
            &Layout::default(),
            &identity(),
            FeedbackSettings {
                remove_hidden: false,
                remove_hidden_trace: true,
            },
        );
        assert!(text.contains("#'nbgrader.preprocessors.ClearHiddenTests',"));
        assert!(text.contains("\n    'nbgrader.preprocessors.Execute',"));
    }
}
