//! # Ananke Core
//!
//! Core library for Ananke, the LTI 1.3 classroom layer that sits on top of a
//! multi-user notebook hub and turns it into a grading platform.
//!
//! ## Overview
//!
//! - **Course identity**: deterministic course ids, titles and grader account
//!   names derived from LTI launch claims
//! - **Provisioning**: idempotent creation of the per-course grader account,
//!   its nbgrader configuration and its gradebook
//! - **Registry**: the hub-wide file of services, roles and groups, read and
//!   rewritten atomically under an advisory lock
//! - **Reconciliation**: the post-login engine that ties the above together
//!   and decides whether the hub needs a restart
//! - **LMS**: score push back to the LMS through LTI Advantage grade services
//!
//! ## Architecture
//!
//! - [`course`]: identity resolution, per-course state probing and `info.json`
//! - [`provision`]: grader accounts, instructor activation, account restore
//! - [`registry`]: registry model, file codec and store
//! - [`reconcile`]: the reconciliation engine
//! - [`restart`]: debounced hub restarts
//! - [`os`]: command specs and runners for every OS side effect
//!
//! ## Example
//!
//! ```
//! use ananke_core::{course::CourseIdentity, lti::LaunchClaims};
//! use serde_json::json;
//!
//! let claims = LaunchClaims::from_value(json!({
//!     "https://purl.imsglobal.org/spec/lti/claim/deployment_id": "d1",
//!     "https://purl.imsglobal.org/spec/lti/claim/resource_link": {
//!         "id": "r1",
//!         "title": "HW1"
//!     },
//!     "https://purl.imsglobal.org/spec/lti/claim/context": { "title": "CS101" }
//! }))
//! .unwrap();
//!
//! let identity = CourseIdentity::resolve(&claims).unwrap();
//! assert!(identity.course_id.starts_with("c-"));
//! assert_eq!(identity.course_title_short, "CS101 - HW1");
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod course;
pub mod error;
pub mod fs;
pub mod gradebook;
pub mod hub;
pub mod instructors;
pub mod layout;
pub mod lms;
pub mod lti;
pub mod os;
pub mod provision;
pub mod reconcile;
pub mod registry;
pub mod restart;
pub mod snapshot;
pub mod title_index;

pub use error::{CoreError, Result};
pub use layout::Layout;
