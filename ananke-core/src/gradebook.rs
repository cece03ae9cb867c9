//! Per-course gradebook (SQLite).
//!
//! The `student` table keeps the column set nbgrader itself expects so the
//! formgrader can open the same database. Scores are read from nbgrader's
//! grade tables once the formgrader has created them.

use std::path::{Path, PathBuf};

use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{FromRow, Row};
use thiserror::Error;
use tracing::debug;

/// Placeholder for profile fields the launch did not carry.
pub const MISSING_FIELD: &str = "none";

/// Gradebook access failures.
#[derive(Debug, Error)]
pub enum GradebookError {
    /// The file is not there and was not to be created.
    #[error("gradebook {0} does not exist")]
    Missing(PathBuf),

    /// SQLite rejected an operation.
    #[error("gradebook {path}: {source}")]
    Database {
        /// Gradebook file.
        path: PathBuf,
        /// Driver error.
        #[source]
        source: sqlx::Error,
    },
}

/// One roster entry with the student's totals.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Student {
    /// Hub user name.
    pub id: String,
    /// Given name, or `none`.
    pub first_name: String,
    /// Family name, or `none`.
    pub last_name: String,
    /// Email address, or `none`.
    pub email: String,
    /// The LMS `sub` claim; scores are posted for this id.
    pub lms_user_id: String,
    /// Manual score where graded by hand, else the autograder's, plus
    /// extra credit, over all submissions.
    pub score: f64,
    /// Sum of every grade and task cell maximum in the gradebook.
    pub max_score: f64,
}

/// Profile data taken from a student launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentProfile {
    /// Hub user name.
    pub id: String,
    /// `given_name` claim.
    pub first_name: Option<String>,
    /// `family_name` claim.
    pub last_name: Option<String>,
    /// `email` claim.
    pub email: Option<String>,
    /// `sub` claim.
    pub lms_user_id: Option<String>,
}

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS student (
    id VARCHAR(128) NOT NULL PRIMARY KEY,
    first_name VARCHAR(128),
    last_name VARCHAR(128),
    email VARCHAR(128),
    lms_user_id VARCHAR(128)
)";

const SCORE_TABLES: [&str; 3] =
    ["grade", "submitted_notebook", "submitted_assignment"];
const MAX_SCORE_TABLES: [&str; 2] = ["grade_cell", "task_cell"];

const SCORE_SUM: &str = "(SELECT SUM(
        COALESCE(g.manual_score, g.auto_score, 0)
        + COALESCE(g.extra_credit, 0))
    FROM grade g
    JOIN submitted_notebook sn ON g.notebook_id = sn.id
    JOIN submitted_assignment sa ON sn.assignment_id = sa.id
    WHERE sa.student_id = s.id)";

/// Connection to one course gradebook (`gradebook.db`).
#[derive(Debug, Clone)]
pub struct Gradebook {
    pool: SqlitePool,
    path: PathBuf,
}

impl Gradebook {
    /// Opens the gradebook, creating the file and schema when missing.
    pub async fn open_or_create(path: &Path) -> Result<Self, GradebookError> {
        Self::connect(path, true).await
    }

    /// Opens an existing gradebook without creating anything.
    pub async fn open_existing(path: &Path) -> Result<Self, GradebookError> {
        if !path.is_file() {
            return Err(GradebookError::Missing(path.to_path_buf()));
        }
        Self::connect(path, false).await
    }

    async fn connect(path: &Path, create: bool) -> Result<Self, GradebookError> {
        let db_err = |source| GradebookError::Database {
            path: path.to_path_buf(),
            source,
        };
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(create);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(db_err)?;
        sqlx::query(SCHEMA).execute(&pool).await.map_err(db_err)?;
        debug!(path = %path.display(), "gradebook opened");
        Ok(Self {
            pool,
            path: path.to_path_buf(),
        })
    }

    /// File this gradebook was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn err(&self, source: sqlx::Error) -> GradebookError {
        GradebookError::Database {
            path: self.path.clone(),
            source,
        }
    }

    /// Inserts the student or refreshes their profile fields.
    ///
    /// Absent fields are stored as [`MISSING_FIELD`]; scores are untouched.
    pub async fn upsert_student(
        &self,
        profile: &StudentProfile,
    ) -> Result<(), GradebookError> {
        let field = |value: &Option<String>| {
            value.clone().unwrap_or_else(|| MISSING_FIELD.to_string())
        };
        sqlx::query(
            "INSERT INTO student (id, first_name, last_name, email, lms_user_id)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                first_name = excluded.first_name,
                last_name = excluded.last_name,
                email = excluded.email,
                lms_user_id = excluded.lms_user_id",
        )
        .bind(&profile.id)
        .bind(field(&profile.first_name))
        .bind(field(&profile.last_name))
        .bind(field(&profile.email))
        .bind(field(&profile.lms_user_id))
        .execute(&self.pool)
        .await
        .map_err(|e| self.err(e))?;
        Ok(())
    }

    /// Roster with totals. A gradebook nbgrader has not graded in yet
    /// reports zero for both.
    pub async fn students(&self) -> Result<Vec<Student>, GradebookError> {
        let tables = self.tables().await?;
        let has = |name: &str| tables.iter().any(|t| t == name);

        let score = if SCORE_TABLES.into_iter().all(has) {
            format!("CAST(COALESCE({SCORE_SUM}, 0) AS REAL)")
        } else {
            "CAST(0 AS REAL)".to_string()
        };
        let maximums: Vec<String> = MAX_SCORE_TABLES
            .into_iter()
            .filter(|t| has(*t))
            .map(|t| format!("(SELECT COALESCE(SUM(max_score), 0) FROM {t})"))
            .collect();
        let max_score = if maximums.is_empty() {
            "CAST(0 AS REAL)".to_string()
        } else {
            format!("CAST({} AS REAL)", maximums.join(" + "))
        };

        let query = format!(
            "SELECT s.id AS id,
                    COALESCE(s.first_name, '') AS first_name,
                    COALESCE(s.last_name, '') AS last_name,
                    COALESCE(s.email, '') AS email,
                    COALESCE(s.lms_user_id, '') AS lms_user_id,
                    {score} AS score,
                    {max_score} AS max_score
             FROM student s ORDER BY s.id"
        );
        sqlx::query_as::<_, Student>(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| self.err(e))
    }

    async fn tables(&self) -> Result<Vec<String>, GradebookError> {
        sqlx::query_scalar::<_, String>(
            "SELECT name FROM sqlite_master WHERE type = 'table'",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| self.err(e))
    }

    /// Roster ids, sorted.
    pub async fn student_ids(&self) -> Result<Vec<String>, GradebookError> {
        let rows = sqlx::query("SELECT id FROM student ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| self.err(e))?;
        rows.iter()
            .map(|row| row.try_get::<String, _>("id"))
            .collect::<Result<_, _>>()
            .map_err(|e| self.err(e))
    }

    /// Drops one student; `false` when they were not on the roster.
    pub async fn remove_student(&self, id: &str) -> Result<bool, GradebookError> {
        let result = sqlx::query("DELETE FROM student WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| self.err(e))?;
        Ok(result.rows_affected() > 0)
    }

    /// Closes the pool so the file can be removed.
    pub async fn close(self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(id: &str) -> StudentProfile {
        StudentProfile {
            id: id.to_string(),
            first_name: Some("Ada".into()),
            last_name: None,
            email: Some("ada@example.org".into()),
            lms_user_id: Some("sub-1".into()),
        }
    }

    #[tokio::test]
    async fn upsert_fills_placeholders_and_updates_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let book = Gradebook::open_or_create(&dir.path().join("gradebook.db"))
            .await
            .unwrap();

        book.upsert_student(&profile("ada")).await.unwrap();
        let mut changed = profile("ada");
        changed.last_name = Some("Lovelace".into());
        book.upsert_student(&changed).await.unwrap();

        let students = book.students().await.unwrap();
        assert_eq!(students.len(), 1);
        assert_eq!(students[0].last_name, "Lovelace");
        assert_eq!(students[0].lms_user_id, "sub-1");
    }

    #[tokio::test]
    async fn missing_fields_become_none() {
        let dir = tempfile::tempdir().unwrap();
        let book = Gradebook::open_or_create(&dir.path().join("gradebook.db"))
            .await
            .unwrap();
        book.upsert_student(&StudentProfile {
            id: "bob".into(),
            first_name: None,
            last_name: None,
            email: None,
            lms_user_id: None,
        })
        .await
        .unwrap();

        let bob = &book.students().await.unwrap()[0];
        assert_eq!(bob.first_name, MISSING_FIELD);
        assert_eq!(bob.email, MISSING_FIELD);
    }

    /// Minimal slice of the tables nbgrader's formgrader creates.
    const NBGRADER_TABLES: &str = "
        CREATE TABLE grade_cell (id VARCHAR(32) PRIMARY KEY, max_score FLOAT);
        CREATE TABLE task_cell (id VARCHAR(32) PRIMARY KEY, max_score FLOAT);
        CREATE TABLE submitted_assignment (
            id VARCHAR(32) PRIMARY KEY, student_id VARCHAR(128));
        CREATE TABLE submitted_notebook (
            id VARCHAR(32) PRIMARY KEY, assignment_id VARCHAR(32));
        CREATE TABLE grade (
            id VARCHAR(32) PRIMARY KEY, notebook_id VARCHAR(32),
            auto_score FLOAT, manual_score FLOAT, extra_credit FLOAT);
        INSERT INTO grade_cell VALUES ('c1', 4), ('c2', 5);
        INSERT INTO task_cell VALUES ('t1', 1);
        INSERT INTO submitted_assignment VALUES ('sa1', 'ada'), ('sa2', 'ada');
        INSERT INTO submitted_notebook VALUES ('sn1', 'sa1'), ('sn2', 'sa2');
        INSERT INTO grade VALUES
            ('g1', 'sn1', 3, NULL, NULL),
            ('g2', 'sn1', 1, 2, 0.5),
            ('g3', 'sn2', NULL, NULL, NULL);
    ";

    #[tokio::test]
    async fn totals_come_from_nbgrader_grades() {
        let dir = tempfile::tempdir().unwrap();
        let book = Gradebook::open_or_create(&dir.path().join("gradebook.db"))
            .await
            .unwrap();
        book.upsert_student(&profile("ada")).await.unwrap();
        book.upsert_student(&profile("bob")).await.unwrap();
        sqlx::raw_sql(NBGRADER_TABLES).execute(&book.pool).await.unwrap();

        let students = book.students().await.unwrap();

        let ada = &students[0];
        assert_eq!(ada.id, "ada");
        assert_eq!(ada.score, 5.5);
        assert_eq!(ada.max_score, 10.0);
        let bob = &students[1];
        assert_eq!(bob.score, 0.0);
        assert_eq!(bob.max_score, 10.0);
    }

    #[tokio::test]
    async fn ungraded_gradebook_reports_zero_totals() {
        let dir = tempfile::tempdir().unwrap();
        let book = Gradebook::open_or_create(&dir.path().join("gradebook.db"))
            .await
            .unwrap();
        book.upsert_student(&profile("ada")).await.unwrap();

        let ada = &book.students().await.unwrap()[0];
        assert_eq!(ada.score, 0.0);
        assert_eq!(ada.max_score, 0.0);
    }

    #[tokio::test]
    async fn open_existing_refuses_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gradebook.db");
        assert!(matches!(
            Gradebook::open_existing(&path).await,
            Err(GradebookError::Missing(_))
        ));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn remove_student_reports_whether_a_row_went() {
        let dir = tempfile::tempdir().unwrap();
        let book = Gradebook::open_or_create(&dir.path().join("gradebook.db"))
            .await
            .unwrap();
        book.upsert_student(&profile("ada")).await.unwrap();

        assert!(book.remove_student("ada").await.unwrap());
        assert!(!book.remove_student("ada").await.unwrap());
        assert!(book.student_ids().await.unwrap().is_empty());
    }
}
