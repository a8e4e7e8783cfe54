use serde::{Deserialize, Serialize};

/// Course as served by the educational-program service. Only the fields the
/// quiz engine relies on are modeled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseRecord {
    pub id: i64,
    #[serde(default, alias = "course_name")]
    pub name: Option<String>,
}

/// Topic as served by the question-bank service. Topics form a tree through
/// `parent_id`; quiz composition only ever looks at the topic itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicRecord {
    pub id: i64,
    pub course_id: i64,
    #[serde(default, alias = "parent_topic_id")]
    pub parent_id: Option<i64>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}
