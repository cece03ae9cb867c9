use serde::Serialize;

use crate::course::CourseIdentity;
use crate::layout::Layout;
use crate::registry::Registry;

/// Lifecycle of one course as seen from the filesystem and the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CourseState {
    /// No grader account data on disk.
    Unknown,
    /// Course data and gradebook exist, but the hub does not know the
    /// course yet.
    Provisioned,
    /// Provisioned and present in the registry as a service.
    Registered,
}

impl CourseState {
    /// Filesystem-only check.
    ///
    /// The course data directory and the gradebook are the last things
    /// provisioning creates; a course missing either is provisioned again.
    pub fn detect(layout: &Layout, identity: &CourseIdentity) -> Self {
        let grader = &identity.grader_account_id;
        if layout.course_data_dir(grader).is_dir()
            && layout.gradebook_path(grader).is_file()
        {
            CourseState::Provisioned
        } else {
            CourseState::Unknown
        }
    }

    /// Upgrades `Provisioned` to `Registered` when `course_id` has a service.
    pub fn with_registry(self, registry: &Registry, course_id: &str) -> Self {
        match self {
            CourseState::Provisioned if registry.service(course_id).is_some() => {
                CourseState::Registered
            }
            other => other,
        }
    }

    /// Provisioned or further along.
    pub fn is_provisioned(self) -> bool {
        self >= CourseState::Provisioned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> CourseIdentity {
        CourseIdentity {
            course_id: "c-abc".into(),
            course_title: "T (c-abc)".into(),
            course_title_short: "T".into(),
            grader_account_id: "c-abc".into(),
        }
    }

    #[test]
    fn provisioned_requires_course_data_and_gradebook() {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::rooted_at(dir.path());
        let identity = identity();

        assert_eq!(CourseState::detect(&layout, &identity), CourseState::Unknown);

        std::fs::create_dir_all(layout.grader_home("c-abc")).unwrap();
        assert_eq!(CourseState::detect(&layout, &identity), CourseState::Unknown);

        std::fs::create_dir_all(layout.course_data_dir("c-abc")).unwrap();
        assert_eq!(CourseState::detect(&layout, &identity), CourseState::Unknown);

        std::fs::write(layout.gradebook_path("c-abc"), "").unwrap();
        assert_eq!(
            CourseState::detect(&layout, &identity),
            CourseState::Provisioned
        );
    }

    #[test]
    fn registry_promotes_only_provisioned_courses() {
        let registry = Registry::default();
        assert_eq!(
            CourseState::Provisioned.with_registry(&registry, "c-abc"),
            CourseState::Provisioned
        );
        assert!(CourseState::Registered.is_provisioned());
        assert!(!CourseState::Unknown.is_provisioned());
    }
}
