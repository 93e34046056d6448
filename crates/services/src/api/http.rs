use async_trait::async_trait;
use lms_core::model::{
    Announcement, Assessment, AssessmentProgress, Course, CourseId, Enrollment, EnrollmentId,
    ModuleProgress, Notification, NotificationId, Resource, UserId,
};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use super::LmsApi;
use super::envelope::decode_list;
use crate::config::ClientConfig;
use crate::error::ApiError;

/// `LmsApi` over the `/api/v1` REST routes.
#[derive(Clone)]
pub struct HttpLmsApi {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

/// Write bodies carry audit fields naming the acting learner.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Audited<'a, T> {
    #[serde(flatten)]
    body: &'a T,
    created_by: UserId,
    updated_by: UserId,
}

impl<'a, T> Audited<'a, T> {
    fn new(body: &'a T, actor: UserId) -> Self {
        Self {
            body,
            created_by: actor,
            updated_by: actor,
        }
    }
}

impl HttpLmsApi {
    /// Build a client from `config`, applying its request timeout.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Http` if the HTTP client cannot be constructed.
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(config.http_timeout).build()?;
        Ok(Self::with_client(
            client,
            config.api_base_url.clone(),
            config.api_token.clone(),
        ))
    }

    /// Reuse an existing client, e.g. to share a connection pool.
    #[must_use]
    pub fn with_client(client: Client, base_url: Url, token: Option<String>) -> Self {
        Self {
            client,
            base_url,
            token,
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ApiError> {
        let url = self.base_url.join(path)?;
        debug!(%method, %url, "lms api request");
        let builder = self.client.request(method, url);
        Ok(match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        })
    }

    async fn send(builder: RequestBuilder) -> Result<Response, ApiError> {
        let response = builder.send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound(response.url().path().to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn get_list<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        key: &str,
    ) -> Result<Vec<T>, ApiError> {
        let text = Self::send(builder).await?.text().await?;
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        let body = serde_json::from_str(&text).map_err(|e| ApiError::Decode(e.to_string()))?;
        decode_list(body, key)
    }

    async fn get_one<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ApiError> {
        let text = Self::send(builder).await?.text().await?;
        serde_json::from_str(&text).map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn execute(&self, builder: RequestBuilder) -> Result<(), ApiError> {
        Self::send(builder).await.map(drop)
    }
}

#[async_trait]
impl LmsApi for HttpLmsApi {
    async fn list_courses(&self) -> Result<Vec<Course>, ApiError> {
        self.get_list(self.request(Method::GET, "courses")?, "courses")
            .await
    }

    async fn get_course(&self, course_id: CourseId) -> Result<Course, ApiError> {
        self.get_one(self.request(Method::GET, &format!("courses/{course_id}"))?)
            .await
    }

    async fn list_resources(&self, course_id: CourseId) -> Result<Vec<Resource>, ApiError> {
        let builder = self.request(Method::GET, &format!("courses/{course_id}/resources"))?;
        self.get_list(builder, "resources").await
    }

    async fn list_assessments(&self, course_id: CourseId) -> Result<Vec<Assessment>, ApiError> {
        let builder = self.request(Method::GET, &format!("assessments/course/{course_id}"))?;
        self.get_list(builder, "assessments").await
    }

    async fn list_module_progress(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Vec<ModuleProgress>, ApiError> {
        let builder = self
            .request(Method::GET, "module-progress")?
            .query(&[("user_id", user_id.value()), ("course_id", course_id.value())]);
        self.get_list(builder, "module_progress").await
    }

    async fn record_module_progress(&self, record: &ModuleProgress) -> Result<(), ApiError> {
        let builder = self
            .request(Method::POST, "module-progress")?
            .json(&Audited::new(record, record.user_id));
        self.execute(builder).await
    }

    async fn list_assessment_progress(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Vec<AssessmentProgress>, ApiError> {
        let builder = self
            .request(Method::GET, "assessment-progress")?
            .query(&[("user_id", user_id.value()), ("course_id", course_id.value())]);
        self.get_list(builder, "assessment_progress").await
    }

    async fn submit_assessment_progress(
        &self,
        attempt: &AssessmentProgress,
    ) -> Result<(), ApiError> {
        let builder = self
            .request(Method::POST, "assessment-progress")?
            .json(&Audited::new(attempt, attempt.user_id));
        self.execute(builder).await
    }

    async fn list_enrollments(&self, user_id: UserId) -> Result<Vec<Enrollment>, ApiError> {
        let builder = self
            .request(Method::GET, "enrollments")?
            .query(&[("userId", user_id.value())]);
        self.get_list(builder, "enrollments").await
    }

    async fn enroll(&self, user_id: UserId, course_id: CourseId) -> Result<Enrollment, ApiError> {
        let request = Enrollment::new(user_id, course_id);
        let builder = self
            .request(Method::POST, "enrollments")?
            .json(&Audited::new(&request, user_id));
        self.get_one(builder).await
    }

    async fn unenroll(&self, enrollment_id: EnrollmentId) -> Result<(), ApiError> {
        self.execute(self.request(Method::DELETE, &format!("enrollments/{enrollment_id}"))?)
            .await
    }

    async fn delete_course_progress(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<(), ApiError> {
        let builder = self
            .request(Method::DELETE, "module-progress")?
            .query(&[("user_id", user_id.value()), ("course_id", course_id.value())]);
        self.execute(builder).await
    }

    async fn list_announcements(
        &self,
        course_ids: &[CourseId],
    ) -> Result<Vec<Announcement>, ApiError> {
        // Without `courseIds` the server returns announcements for every course.
        if course_ids.is_empty() {
            return Ok(Vec::new());
        }
        let joined = course_ids
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let builder = self
            .request(Method::GET, "announcements")?
            .query(&[("courseIds", joined)]);
        self.get_list(builder, "announcements").await
    }

    async fn list_notifications(&self, user_id: UserId) -> Result<Vec<Notification>, ApiError> {
        let builder = self
            .request(Method::GET, "notifications")?
            .query(&[("userId", user_id.value())]);
        self.get_list(builder, "notifications").await
    }

    async fn mark_notification_read(&self, id: NotificationId) -> Result<(), ApiError> {
        self.execute(self.request(Method::PUT, &format!("notifications/{id}/read"))?)
            .await
    }
}
