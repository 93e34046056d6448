use serde::{Deserialize, Serialize};

use crate::model::ids::{CourseId, ResourceId, UserId};

/// A course as listed in the catalogue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: CourseId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub instructor_id: Option<UserId>,
    #[serde(default, alias = "instructor")]
    pub instructor_name: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
}

/// A lecture video belonging to a course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub id: ResourceId,
    #[serde(default, alias = "course_id")]
    pub course_id: Option<CourseId>,
    pub title: String,
    /// Free-form duration as entered by the instructor, e.g. `"12"` or `"12 min"`.
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default, alias = "youtubeLink")]
    pub video_url: Option<String>,
}

impl Resource {
    /// Duration in whole minutes, read from the leading digits of `duration`.
    #[must_use]
    pub fn duration_minutes(&self) -> Option<u32> {
        let raw = self.duration.as_deref()?.trim_start();
        let digits: String = raw.chars().take_while(char::is_ascii_digit).collect();
        digits.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource(duration: Option<&str>) -> Resource {
        Resource {
            id: ResourceId::new(1),
            course_id: Some(CourseId::new(1)),
            title: "Intro".into(),
            duration: duration.map(str::to_owned),
            video_url: None,
        }
    }

    #[test]
    fn duration_minutes_reads_leading_digits() {
        assert_eq!(resource(Some("12 min")).duration_minutes(), Some(12));
        assert_eq!(resource(Some(" 45")).duration_minutes(), Some(45));
        assert_eq!(resource(Some("soon")).duration_minutes(), None);
        assert_eq!(resource(None).duration_minutes(), None);
    }

    #[test]
    fn resource_accepts_youtube_link_key() {
        let json = r#"{"id":3,"title":"Ownership","duration":"9","youtubeLink":"https://youtu.be/x"}"#;
        let parsed: Resource = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.video_url.as_deref(), Some("https://youtu.be/x"));
        assert_eq!(parsed.course_id, None);
    }

    #[test]
    fn course_accepts_instructor_key() {
        let json = r#"{"id":1,"title":"Rust","instructor":"Ferris","price":10.0}"#;
        let parsed: Course = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.instructor_name.as_deref(), Some("Ferris"));
        assert_eq!(parsed.description, "");
    }
}
