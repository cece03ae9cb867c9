use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::handlers::{
    assignments, courses, grades, hooks, problems, title, utils,
};
use crate::infra::app_state::AppState;

pub const POST_AUTH_HOOK: &str = "/hooks/post-auth";
pub const COURSES: &str = "/courses";
pub const ASSIGNMENTS: &str = "/assignments";
pub const PROBLEMS: &str = "/problems";
pub const TITLE: &str = "/title";
pub const GRADES: &str = "/grades";
pub const CONFIG: &str = "/config";
pub const JWKS: &str = "/jwks";

/// Every Kore route, traced.
pub fn create_api_router(state: AppState) -> Router {
    Router::new()
        .route(POST_AUTH_HOOK, post(hooks::post_auth_handler))
        .route(
            COURSES,
            get(courses::list_courses_handler)
                .post(courses::import_course_handler)
                .put(courses::backup_course_handler)
                .patch(courses::reset_course_handler)
                .delete(courses::delete_course_handler),
        )
        .route(
            ASSIGNMENTS,
            get(assignments::list_assignments_handler)
                .post(assignments::import_assignment_handler),
        )
        .route(
            PROBLEMS,
            get(problems::list_problems_handler)
                .post(problems::import_problem_handler),
        )
        .route(TITLE, get(title::title_handler))
        .route(GRADES, post(grades::push_grades_handler))
        .route(CONFIG, get(utils::config_handler))
        .route(JWKS, get(utils::jwks_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
