//! Client for the remote course platform.
//!
//! Every call is authorized with a bearer token fetched from the platform's
//! configuration endpoint. Tokens are short-lived and fetched per command,
//! never cached.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::Config;
use crate::http::{HttpError, get_text};

/// Resolutions in order of preference.
const STREAM_RESOLUTIONS: [&str; 3] = ["720p", "480p", "360p"];

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("unexpected response payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration endpoint returned no BEARER_TOKEN")]
    MissingToken,

    #[error("lesson {0} not found in course")]
    LessonNotFound(String),

    #[error("video {0} not found in lesson")]
    VideoNotFound(String),

    #[error("video {0} has no playable resolution")]
    NoStream(String),
}

#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(<redacted>)")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExamGroup {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(rename = "titulo", default, deserialize_with = "deserialize_text")]
    pub title: String,
    #[serde(rename = "cursos", default)]
    pub courses: Vec<Course>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Course {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(rename = "nome", default, deserialize_with = "deserialize_text")]
    pub name: String,
    #[serde(rename = "data_inicio", default)]
    pub start_date: Option<String>,
    #[serde(rename = "data_retirada", default)]
    pub withdrawal_date: Option<String>,
    #[serde(rename = "total_aulas", default)]
    pub total_lessons: Option<u32>,
    #[serde(rename = "total_aulas_visualizadas", default)]
    pub watched_lessons: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CourseDetail {
    #[serde(flatten)]
    pub course: Course,
    #[serde(rename = "aulas", default)]
    pub lessons: Vec<Lesson>,
}

impl CourseDetail {
    pub fn lesson(&self, lesson_id: &str) -> Result<&Lesson, ApiError> {
        self.lessons
            .iter()
            .find(|lesson| lesson.id == lesson_id)
            .ok_or_else(|| ApiError::LessonNotFound(lesson_id.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Lesson {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(rename = "nome", default, deserialize_with = "deserialize_text")]
    pub name: String,
    #[serde(rename = "conteudo", default)]
    pub content: Option<String>,
    #[serde(default)]
    pub pdf: Option<String>,
    #[serde(rename = "pdf_grifado", default)]
    pub pdf_highlighted: Option<String>,
    #[serde(rename = "pdf_simplificado", default)]
    pub pdf_simplified: Option<String>,
    #[serde(default)]
    pub videos: Vec<Video>,
}

impl Lesson {
    pub fn video(&self, video_id: &str) -> Result<&Video, ApiError> {
        self.videos
            .iter()
            .find(|video| video.id == video_id)
            .ok_or_else(|| ApiError::VideoNotFound(video_id.to_string()))
    }

    /// PDF links as (label, url), full version first.
    pub fn documents(&self) -> Vec<(&'static str, &str)> {
        [
            ("PDF", &self.pdf),
            ("PDF (highlighted)", &self.pdf_highlighted),
            ("PDF (simplified)", &self.pdf_simplified),
        ]
        .into_iter()
        .filter_map(|(label, url)| {
            url.as_deref()
                .filter(|url| !url.trim().is_empty())
                .map(|url| (label, url))
        })
        .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Video {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(rename = "titulo", default, deserialize_with = "deserialize_text")]
    pub title: String,
    #[serde(rename = "resolucoes", default)]
    pub resolutions: Option<BTreeMap<String, Option<String>>>,
}

impl Video {
    pub fn stream_url(&self) -> Option<&str> {
        let resolutions = self.resolutions.as_ref()?;
        STREAM_RESOLUTIONS.iter().find_map(|key| {
            resolutions
                .get(*key)
                .and_then(|url| url.as_deref())
                .filter(|url| !url.trim().is_empty())
        })
    }

    pub fn require_stream_url(&self) -> Result<&str, ApiError> {
        self.stream_url()
            .ok_or_else(|| ApiError::NoStream(self.id.clone()))
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Default, Deserialize)]
struct CourseListing {
    #[serde(rename = "concursos", default)]
    groups: Vec<ExamGroup>,
}

pub struct CourseApi {
    api_url: String,
    token_url: String,
    timeout: Duration,
}

impl CourseApi {
    pub fn from_config(config: &Config) -> Self {
        Self {
            api_url: config.api_url.clone(),
            token_url: config.token_url.clone(),
            timeout: config.http_timeout,
        }
    }

    pub fn fetch_token(&self) -> Result<BearerToken, ApiError> {
        let raw = get_text(&self.token_url, &[], self.timeout, self.timeout)?;
        let token = parse_token(&raw)?;
        debug!("Fetched bearer token");
        Ok(token)
    }

    pub fn list_courses(&self, token: &BearerToken) -> Result<Vec<ExamGroup>, ApiError> {
        let raw = self.get_authorized(&self.api_url, token)?;
        let groups = parse_course_listing(&raw)?;
        info!(groups = groups.len(), "Fetched course listing");
        Ok(groups)
    }

    pub fn course_detail(
        &self,
        token: &BearerToken,
        course_id: &str,
    ) -> Result<CourseDetail, ApiError> {
        let url = format!("{}/{}", self.api_url, course_id);
        let raw = self.get_authorized(&url, token)?;
        let detail = parse_course_detail(&raw)?;
        info!(
            course_id,
            lessons = detail.lessons.len(),
            "Fetched course detail"
        );
        Ok(detail)
    }

    fn get_authorized(&self, url: &str, token: &BearerToken) -> Result<String, ApiError> {
        Ok(get_text(
            url,
            &[("Authorization", token.as_str())],
            self.timeout,
            self.timeout,
        )?)
    }
}

pub(crate) fn parse_token(raw: &str) -> Result<BearerToken, ApiError> {
    let value: Value = serde_json::from_str(raw)?;
    let token = match value.get("BEARER_TOKEN") {
        Some(Value::String(token)) => token.trim().to_string(),
        Some(Value::Number(number)) => number.to_string(),
        _ => String::new(),
    };
    if token.is_empty() {
        return Err(ApiError::MissingToken);
    }
    Ok(BearerToken(token))
}

pub(crate) fn parse_course_listing(raw: &str) -> Result<Vec<ExamGroup>, ApiError> {
    let envelope: Envelope<Option<CourseListing>> = serde_json::from_str(raw)?;
    Ok(envelope.data.unwrap_or_default().groups)
}

pub(crate) fn parse_course_detail(raw: &str) -> Result<CourseDetail, ApiError> {
    let envelope: Envelope<CourseDetail> = serde_json::from_str(raw)?;
    Ok(envelope.data)
}

// Labels are sometimes served as `null`; show them as empty instead.
fn deserialize_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

// The platform serves ids as numbers in some payloads and strings in others.
fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(id) => Ok(id),
        Value::Number(id) => Ok(id.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {other}"
        ))),
    }
}
