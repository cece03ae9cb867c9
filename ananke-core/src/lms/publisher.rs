use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{Algorithm, Header, encode};
use reqwest::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use crate::course::CourseInfo;
use crate::gradebook::Student;
use crate::lms::{LmsError, ToolKeys};

const CLIENT_ASSERTION_TYPE: &str =
    "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";
const SCORE_SCOPES: &str = "https://purl.imsglobal.org/spec/lti-ags/scope/score https://purl.imsglobal.org/spec/lti-ags/scope/lineitem";
const SCORE_CONTENT_TYPE: &str = "application/vnd.ims.lis.v1.score+json";

/// The LMS side of the LTI registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LtiPlatform {
    /// Fallback when a course was launched without an audience claim.
    pub client_id: Option<String>,
    /// Platform issuer; the audience of client assertions.
    pub issuer: String,
    /// OAuth 2 token endpoint of the platform.
    pub access_token_url: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct AssertionClaims {
    iss: String,
    sub: String,
    aud: String,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Score<'a> {
    user_id: &'a str,
    score_given: f64,
    score_maximum: f64,
    comment: &'a str,
    timestamp: &'a str,
    activity_progress: &'static str,
    grading_progress: &'static str,
}

/// A score the LMS did not accept.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreFailure {
    /// Hub user the score belonged to.
    pub user_id: String,
    /// Why it was rejected.
    pub error: String,
}

/// Outcome of one grade push.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PushReport {
    /// Hub users whose score was accepted.
    pub sent: Vec<String>,
    /// Scores the LMS refused.
    pub failed: Vec<ScoreFailure>,
}

impl PushReport {
    /// Every score was accepted.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Score endpoint of a line item: `/scores` appended to its path.
pub fn score_url(lineitem: &str) -> Result<String, LmsError> {
    let mut url = Url::parse(lineitem)
        .map_err(|err| LmsError::LineItem(format!("{lineitem}: {err}")))?;
    let path = format!("{}/scores", url.path().trim_end_matches('/'));
    url.set_path(&path);
    Ok(url.to_string())
}

/// Client for the platform token endpoint and line item scores.
#[derive(Debug, Clone)]
pub struct GradePublisher {
    http: Client,
    platform: LtiPlatform,
}

impl GradePublisher {
    /// Publisher for `platform` with a 30 second request timeout.
    pub fn new(platform: LtiPlatform) -> Result<Self, LmsError> {
        let http = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self { http, platform })
    }

    /// RS256 assertion identifying the tool (`client_id`) to the platform.
    pub fn client_assertion(
        &self,
        keys: &ToolKeys,
        client_id: &str,
    ) -> Result<String, LmsError> {
        let now = Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: client_id.to_string(),
            sub: client_id.to_string(),
            aud: self.platform.issuer.clone(),
            iat: now - 5,
            exp: now + 60,
        };
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(keys.kid().to_string());
        Ok(encode(&header, &claims, keys.encoding_key())?)
    }

    /// Trades a signed assertion for a bearer token with the score scopes.
    pub async fn access_token(
        &self,
        assertion: &str,
    ) -> Result<String, LmsError> {
        let params = [
            ("grant_type", "client_credentials"),
            ("client_assertion_type", CLIENT_ASSERTION_TYPE),
            ("client_assertion", assertion),
            ("scope", SCORE_SCOPES),
        ];
        let response = self
            .http
            .post(&self.platform.access_token_url)
            .form(&params)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LmsError::AccessToken(format!("{status}: {body}")));
        }
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|err| LmsError::AccessToken(err.to_string()))?;
        Ok(token.access_token)
    }

    /// Posts every student's score to the course line item.
    ///
    /// Token and URL problems abort the push; a rejected score is recorded
    /// and the remaining students are still sent.
    pub async fn push_scores(
        &self,
        keys: &ToolKeys,
        course: &CourseInfo,
        students: &[Student],
    ) -> Result<PushReport, LmsError> {
        let client_id = course
            .aud
            .as_deref()
            .or(self.platform.client_id.as_deref())
            .ok_or(LmsError::MissingAudience)?;
        let lineitem = course
            .lineitem
            .as_deref()
            .ok_or_else(|| LmsError::LineItem("launch carried none".into()))?;
        let url = score_url(lineitem)?;

        let assertion = self.client_assertion(keys, client_id)?;
        let token = self.access_token(&assertion).await?;
        let timestamp = Utc::now().to_rfc3339();

        let mut report = PushReport::default();
        for student in students {
            let score = Score {
                user_id: &student.lms_user_id,
                score_given: student.score,
                score_maximum: student.max_score,
                comment: "",
                timestamp: &timestamp,
                activity_progress: "Completed",
                grading_progress: "FullyGraded",
            };
            match self.post_score(&url, &token, &score).await {
                Ok(()) => {
                    debug!(student = %student.id, "score sent");
                    report.sent.push(student.id.clone());
                }
                Err(err) => {
                    warn!(student = %student.id, %err, "score rejected");
                    report.failed.push(ScoreFailure {
                        user_id: student.id.clone(),
                        error: err.to_string(),
                    });
                }
            }
        }
        info!(
            course_id = %course.id,
            sent = report.sent.len(),
            failed = report.failed.len(),
            "scores pushed to LMS"
        );
        Ok(report)
    }

    async fn post_score(
        &self,
        url: &str,
        token: &str,
        score: &Score<'_>,
    ) -> Result<(), LmsError> {
        let body = serde_json::to_vec(score)
            .map_err(|err| LmsError::LineItem(err.to_string()))?;
        self.http
            .post(url)
            .bearer_auth(token)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, SCORE_CONTENT_TYPE)
            .body(body)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
