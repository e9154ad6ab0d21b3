//! Portal content records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::auth::Permission;

/// Default status given to a new amendment
pub const DEFAULT_AMENDMENT_STATUS: &str = "adopted";

/// The content collections managed by the back office
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Ministry,
    News,
    Amendment,
    Leader,
}

impl ContentKind {
    pub const ALL: [ContentKind; 4] = [
        ContentKind::Ministry,
        ContentKind::News,
        ContentKind::Amendment,
        ContentKind::Leader,
    ];

    /// Permission needed to create or edit entries of this kind
    pub fn managing_permission(&self) -> Permission {
        match self {
            ContentKind::Ministry => Permission::ManageMinistries,
            ContentKind::News => Permission::ManageNews,
            ContentKind::Amendment => Permission::ManageLegislation,
            ContentKind::Leader => Permission::ManageLeadership,
        }
    }

    /// Permission needed to remove entries (shared by every kind)
    pub fn deleting_permission(&self) -> Permission {
        Permission::Delete
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Ministry => "ministry",
            ContentKind::News => "news",
            ContentKind::Amendment => "amendment",
            ContentKind::Leader => "leader",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Deputy serving under a minister
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deputy {
    #[serde(default = "new_id")]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
    pub position: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_id: Option<String>,
    pub appointed_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
}

/// Head of a ministry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Minister {
    #[serde(default = "new_id")]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_id: Option<String>,
    pub appointed_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
    #[serde(default)]
    pub deputies: Vec<Deputy>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ministry {
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minister: Option<Minister>,
    #[serde(default)]
    pub staff: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_info: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default)]
    pub is_archive: bool,
}

fn default_amendment_status() -> String {
    DEFAULT_AMENDMENT_STATUS.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amendment {
    pub number: String,
    pub title: String,
    pub content: String,
    #[serde(default = "default_amendment_status")]
    pub status: String,
}

/// A member of the leadership page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leader {
    pub name: String,
    pub surname: String,
    pub position: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passport_number: Option<String>,
    pub appointed_date: String,
    /// Position on the leadership page (ascending)
    #[serde(default)]
    pub order: i32,
}

/// The payload of a content entry, tagged by kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentBody {
    Ministry(Ministry),
    News(NewsItem),
    Amendment(Amendment),
    Leader(Leader),
}

impl ContentBody {
    pub fn kind(&self) -> ContentKind {
        match self {
            ContentBody::Ministry(_) => ContentKind::Ministry,
            ContentBody::News(_) => ContentKind::News,
            ContentBody::Amendment(_) => ContentKind::Amendment,
            ContentBody::Leader(_) => ContentKind::Leader,
        }
    }

    /// Check required text fields; returns the name of the first empty one
    pub fn missing_field(&self) -> Option<&'static str> {
        let required: Vec<(&'static str, &str)> = match self {
            ContentBody::Ministry(m) => vec![
                ("name", m.name.as_str()),
                ("description", m.description.as_str()),
            ],
            ContentBody::News(n) => {
                vec![("title", n.title.as_str()), ("content", n.content.as_str())]
            }
            ContentBody::Amendment(a) => vec![
                ("number", a.number.as_str()),
                ("title", a.title.as_str()),
                ("content", a.content.as_str()),
            ],
            ContentBody::Leader(l) => vec![
                ("name", l.name.as_str()),
                ("surname", l.surname.as_str()),
                ("position", l.position.as_str()),
            ],
        };

        required
            .into_iter()
            .find(|(_, value)| value.trim().is_empty())
            .map(|(field, _)| field)
    }
}

/// A stored content record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentEntry {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub body: ContentBody,
}

impl ContentEntry {
    /// Create a new entry with a generated ID and timestamps
    pub fn new(body: ContentBody) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            created_at: now,
            updated_at: now,
            body,
        }
    }

    pub fn kind(&self) -> ContentKind {
        self.body.kind()
    }
}
