//! Scanner wire format. Records are tagged by `kind` and resolved once into
//! the explicit snapshot types; nothing downstream sees wire shapes.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::core::links::normalize_username;
use crate::core::{AudienceMember, ChannelSnapshot, Post, ReactionCount};
use crate::error::ScanError;

/// Newest posts kept per snapshot.
pub const MAX_POSTS: usize = 50;

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireChannel {
    pub username: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub members: u64,
    pub online_count: Option<u64>,
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub scam: bool,
    #[serde(default)]
    pub fake: bool,
    #[serde(default = "default_true")]
    pub comments_enabled: bool,
    #[serde(default = "default_true")]
    pub reactions_enabled: bool,
    #[serde(default)]
    pub comments_hidden: bool,
    #[serde(default)]
    pub posts: Vec<WirePost>,
    #[serde(default)]
    pub audience: Vec<WireAudience>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WirePost {
    Message(WireMessage),
    /// Joins, pins, title changes.
    Service { id: i64 },
    Album { parts: Vec<WireMessage> },
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireMessage {
    pub id: i64,
    pub date: DateTime<Utc>,
    pub views: Option<u64>,
    pub forwards: Option<u64>,
    pub replies: Option<u64>,
    #[serde(default)]
    pub reactions: Vec<WireReaction>,
    #[serde(default)]
    pub text: String,
    pub forwarded_from: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireReaction {
    pub emoji: String,
    pub count: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WireAudience {
    User { id: i64, premium: Option<bool> },
    Bot { id: i64 },
    Deleted { id: i64 },
}

impl WireMessage {
    fn into_post(self) -> Post {
        Post {
            id: self.id,
            date: self.date,
            views: self.views,
            forwards: self.forwards,
            comments: self.replies,
            reactions: self
                .reactions
                .into_iter()
                .map(|r| ReactionCount { emoji: r.emoji, count: r.count })
                .collect(),
            text: self.text,
            forwarded_from: self.forwarded_from.map(|s| normalize_username(&s)),
        }
    }
}

impl WirePost {
    fn resolve(self) -> Option<Post> {
        match self {
            WirePost::Message(message) => Some(message.into_post()),
            WirePost::Service { .. } => None,
            WirePost::Album { parts } => collapse_album(parts),
        }
    }
}

/// One post per album: the first part carrying counters, captioned with the
/// first non-empty text.
fn collapse_album(parts: Vec<WireMessage>) -> Option<Post> {
    let caption = parts.iter().find(|p| !p.text.is_empty()).map(|p| p.text.clone());
    let index = parts.iter().position(|p| p.views.is_some()).unwrap_or(0);
    let mut post = parts.into_iter().nth(index)?.into_post();
    if post.text.is_empty() {
        post.text = caption.unwrap_or_default();
    }
    Some(post)
}

impl WireChannel {
    pub fn resolve(self) -> Result<ChannelSnapshot, ScanError> {
        let username = normalize_username(&self.username);
        if username.is_empty() {
            return Err(ScanError::Invalid("empty username".into()));
        }

        let mut posts: Vec<Post> = self.posts.into_iter().filter_map(WirePost::resolve).collect();
        posts.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));
        posts.truncate(MAX_POSTS);

        let audience = self
            .audience
            .into_iter()
            .filter_map(|entry| match entry {
                WireAudience::User { id, premium } => Some(AudienceMember { user_id: id, is_premium: premium }),
                WireAudience::Bot { .. } | WireAudience::Deleted { .. } => None,
            })
            .collect();

        Ok(ChannelSnapshot {
            username,
            title: self.title,
            description: self.description,
            members: self.members,
            online_count: self.online_count,
            created_at: self.created_at,
            verified: self.verified,
            platform_scam: self.scam,
            platform_fake: self.fake,
            comments_enabled: self.comments_enabled,
            reactions_enabled: self.reactions_enabled,
            comments_hidden: self.comments_hidden,
            posts,
            audience,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "username": "@Sample_Chan",
        "title": "Sample",
        "members": 1200,
        "created_at": "2023-01-01T00:00:00Z",
        "posts": [
            {"kind": "message", "id": 10, "date": "2024-05-01T10:00:00Z", "views": 500,
             "forwards": 3, "replies": 2, "reactions": [{"emoji": "👍", "count": 7}],
             "text": "see t.me/other_chan", "forwarded_from": "@Source_Chan"},
            {"kind": "service", "id": 11},
            {"kind": "album", "parts": [
                {"id": 12, "date": "2024-05-02T10:00:00Z", "text": "caption"},
                {"id": 13, "date": "2024-05-02T10:00:00Z", "views": 800}
            ]}
        ],
        "audience": [
            {"kind": "user", "id": 100, "premium": true},
            {"kind": "bot", "id": 101},
            {"kind": "deleted", "id": 102},
            {"kind": "user", "id": 103}
        ]
    }"#;

    fn resolve(json: &str) -> Result<ChannelSnapshot, ScanError> {
        serde_json::from_str::<WireChannel>(json).unwrap().resolve()
    }

    #[test]
    fn resolves_tagged_records() {
        let snapshot = resolve(SAMPLE).unwrap();
        assert_eq!(snapshot.username, "sample_chan");
        assert!(snapshot.comments_enabled);
        assert!(snapshot.reactions_enabled);
        assert_eq!(snapshot.posts.len(), 2);

        let album = &snapshot.posts[0];
        assert_eq!(album.id, 13);
        assert_eq!(album.views, Some(800));
        assert_eq!(album.text, "caption");

        let message = &snapshot.posts[1];
        assert_eq!(message.comments, Some(2));
        assert_eq!(message.total_reactions(), 7);
        assert_eq!(message.forwarded_from.as_deref(), Some("source_chan"));
    }

    #[test]
    fn keeps_only_real_users() {
        let snapshot = resolve(SAMPLE).unwrap();
        assert_eq!(
            snapshot.audience,
            vec![
                AudienceMember { user_id: 100, is_premium: Some(true) },
                AudienceMember { user_id: 103, is_premium: None },
            ]
        );
    }

    #[test]
    fn truncates_to_newest_posts() {
        let posts: Vec<String> = (0..60)
            .map(|i| {
                format!(
                    r#"{{"kind": "message", "id": {i}, "date": "2024-01-01T{:02}:{:02}:00Z", "views": 10}}"#,
                    i / 60,
                    i % 60
                )
            })
            .collect();
        let json = format!(r#"{{"username": "many_posts", "members": 10, "posts": [{}]}}"#, posts.join(","));
        let snapshot = resolve(&json).unwrap();
        assert_eq!(snapshot.posts.len(), MAX_POSTS);
        assert_eq!(snapshot.posts[0].id, 59);
    }

    #[test]
    fn empty_username_is_invalid() {
        let err = resolve(r#"{"username": " @ ", "members": 1}"#).unwrap_err();
        assert!(matches!(err, ScanError::Invalid(_)));
    }
}
