// SPDX-License-Identifier: MPL-2.0

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

pub type SiteId = u64;
pub type PostId = u64;
pub type UserId = u64;

/// Storage format for post timestamps
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Access scope an origin site assigns to a post
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Anyone on the internet
    World,
    /// Authenticated campus members only
    Campus,
    /// Private, password protected, or anything else
    #[serde(other)]
    Other,
}

impl Visibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Visibility::World => "world",
            Visibility::Campus => "campus",
            Visibility::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "world" => Visibility::World,
            "campus" => Visibility::Campus,
            _ => Visibility::Other,
        }
    }

    /// Whether posts with this visibility may appear on the community site
    pub fn is_shareable(self) -> bool {
        matches!(self, Visibility::World | Visibility::Campus)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PostStatus {
    Publish,
    Private,
    Draft,
    Pending,
    Future,
    Inherit,
    Trash,
    AutoDraft,
}

impl PostStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PostStatus::Publish => "publish",
            PostStatus::Private => "private",
            PostStatus::Draft => "draft",
            PostStatus::Pending => "pending",
            PostStatus::Future => "future",
            PostStatus::Inherit => "inherit",
            PostStatus::Trash => "trash",
            PostStatus::AutoDraft => "auto-draft",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "publish" => PostStatus::Publish,
            "private" => PostStatus::Private,
            "draft" => PostStatus::Draft,
            "pending" => PostStatus::Pending,
            "future" => PostStatus::Future,
            "inherit" => PostStatus::Inherit,
            "trash" => PostStatus::Trash,
            "auto-draft" => PostStatus::AutoDraft,
            _ => return None,
        })
    }
}

/// A post as owned by its origin site
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OriginPost {
    pub id: PostId,
    #[serde(default = "default_post_type")]
    pub post_type: String,
    pub status: PostStatus,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub excerpt: String,
    pub author: UserId,
    /// Publication time in the origin site's local time
    #[serde(with = "datetime")]
    pub date: NaiveDateTime,
    #[serde(default, with = "datetime_opt")]
    pub date_gmt: Option<NaiveDateTime>,
    #[serde(with = "datetime")]
    pub modified: NaiveDateTime,
    #[serde(default, with = "datetime_opt")]
    pub modified_gmt: Option<NaiveDateTime>,
    #[serde(default)]
    pub is_revision: bool,
    #[serde(default)]
    pub is_autosave: bool,
    pub visibility: Visibility,
    /// Classroom sites this post was published to
    #[serde(default)]
    pub groups: Vec<SiteId>,
    /// Stored share flag, if any was ever saved
    #[serde(default)]
    pub share: Option<u32>,
}

fn default_post_type() -> String {
    "post".to_string()
}

/// Metadata of one member site
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteInfo {
    pub id: SiteId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Home URL; `None` while the site is not yet provisioned
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub personal: bool,
    #[serde(default)]
    pub admin_email: String,
    /// Offset from UTC of the site's local time, in seconds
    #[serde(default)]
    pub gmt_offset: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
    /// Sites on which the user may edit any post
    #[serde(default)]
    pub editor_of: Vec<SiteId>,
    #[serde(default)]
    pub super_admin: bool,
}

/// Request-level context delivered with a post save
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SaveRequest {
    /// Acting user
    pub user_id: UserId,
    /// Raw share checkbox value, when the form carried one
    #[serde(default)]
    pub share: Option<String>,
    /// Request action name; "heartbeat" marks keep-alive saves
    #[serde(default)]
    pub action: Option<String>,
}

impl SaveRequest {
    pub fn is_heartbeat(&self) -> bool {
        self.action.as_deref() == Some("heartbeat")
    }

    /// Submitted share value as an absolute integer
    pub fn share_value(&self) -> Option<u32> {
        let raw = self.share.as_deref()?.trim();
        if raw.is_empty() {
            return None;
        }
        Some(
            raw.trim_start_matches('-')
                .parse::<u32>()
                .unwrap_or(0),
        )
    }
}

pub(crate) mod datetime {
    use super::DATETIME_FORMAT;
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&value.format(DATETIME_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveDateTime::parse_from_str(&raw, DATETIME_FORMAT).map_err(serde::de::Error::custom)
    }
}

pub(crate) mod datetime_opt {
    use super::DATETIME_FORMAT;
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<NaiveDateTime>,
        s: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => s.serialize_some(&v.format(DATETIME_FORMAT).to_string()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<NaiveDateTime>, D::Error> {
        match Option::<String>::deserialize(d)? {
            // The platform writes an all-zero date for "never"
            Some(raw) if raw.starts_with("0000-00-00") || raw.is_empty() => Ok(None),
            Some(raw) => NaiveDateTime::parse_from_str(&raw, DATETIME_FORMAT)
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visibility_shareable() {
        assert!(Visibility::World.is_shareable());
        assert!(Visibility::Campus.is_shareable());
        assert!(!Visibility::Other.is_shareable());
        assert_eq!(Visibility::parse("campus"), Visibility::Campus);
        assert_eq!(Visibility::parse("password"), Visibility::Other);
    }

    #[test]
    fn test_share_value() {
        let mut req = SaveRequest::default();
        assert_eq!(req.share_value(), None);
        req.share = Some("1".to_string());
        assert_eq!(req.share_value(), Some(1));
        req.share = Some("".to_string());
        assert_eq!(req.share_value(), None);
        req.share = Some("yes".to_string());
        assert_eq!(req.share_value(), Some(0));
    }

    #[test]
    fn test_post_deserialize_zero_gmt() {
        let json = r#"{
            "id": 5, "status": "publish", "title": "Hi", "author": 2,
            "date": "2024-03-01 10:00:00", "date_gmt": "0000-00-00 00:00:00",
            "modified": "2024-03-01 10:00:00",
            "visibility": "private"
        }"#;
        let post: OriginPost = serde_json::from_str(json).unwrap();
        assert_eq!(post.post_type, "post");
        assert_eq!(post.date_gmt, None);
        assert_eq!(post.visibility, Visibility::Other);
    }
}
