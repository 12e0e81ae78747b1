pub mod links;
pub mod metrics;
#[cfg(test)]
pub(crate) mod testing;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a channel record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChannelStatus {
    Waiting,
    Good,
    Bad,
    Private,
    Error,
}

impl ChannelStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelStatus::Waiting => "WAITING",
            ChannelStatus::Good => "GOOD",
            ChannelStatus::Bad => "BAD",
            ChannelStatus::Private => "PRIVATE",
            ChannelStatus::Error => "ERROR",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ChannelStatus::Waiting)
    }
}

impl fmt::Display for ChannelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChannelStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "WAITING" => Ok(ChannelStatus::Waiting),
            "GOOD" => Ok(ChannelStatus::Good),
            "BAD" => Ok(ChannelStatus::Bad),
            "PRIVATE" => Ok(ChannelStatus::Private),
            "ERROR" => Ok(ChannelStatus::Error),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

/// Final quality verdict. Declared worst-first so the derived `Ord` ranks them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Scam,      // <25
    HighRisk,  // ≥25
    Medium,    // ≥40
    Good,      // ≥55
    Excellent, // ≥75
}

impl Verdict {
    pub fn from_score(final_score: u8) -> Self {
        if final_score >= 75 {
            Verdict::Excellent
        } else if final_score >= 55 {
            Verdict::Good
        } else if final_score >= 40 {
            Verdict::Medium
        } else if final_score >= 25 {
            Verdict::HighRisk
        } else {
            Verdict::Scam
        }
    }

    /// Status a scanned channel lands in for this verdict.
    pub fn status(&self) -> ChannelStatus {
        match self {
            Verdict::Excellent | Verdict::Good => ChannelStatus::Good,
            _ => ChannelStatus::Bad,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Excellent => "EXCELLENT",
            Verdict::Good => "GOOD",
            Verdict::Medium => "MEDIUM",
            Verdict::HighRisk => "HIGH_RISK",
            Verdict::Scam => "SCAM",
        }
    }
}

impl FromStr for Verdict {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "EXCELLENT" => Ok(Verdict::Excellent),
            "GOOD" => Ok(Verdict::Good),
            "MEDIUM" => Ok(Verdict::Medium),
            "HIGH_RISK" => Ok(Verdict::HighRisk),
            "SCAM" => Ok(Verdict::Scam),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

/// Content category assigned by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    News,
    Crypto,
    Finance,
    Tech,
    AiMl,
    Education,
    Business,
    Lifestyle,
    Entertainment,
    Gambling,
    Adult,
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::News => "NEWS",
            Category::Crypto => "CRYPTO",
            Category::Finance => "FINANCE",
            Category::Tech => "TECH",
            Category::AiMl => "AI_ML",
            Category::Education => "EDUCATION",
            Category::Business => "BUSINESS",
            Category::Lifestyle => "LIFESTYLE",
            Category::Entertainment => "ENTERTAINMENT",
            Category::Gambling => "GAMBLING",
            Category::Adult => "ADULT",
            Category::Other => "OTHER",
        }
    }
}

impl FromStr for Category {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NEWS" => Ok(Category::News),
            "CRYPTO" => Ok(Category::Crypto),
            "FINANCE" => Ok(Category::Finance),
            "TECH" => Ok(Category::Tech),
            "AI_ML" => Ok(Category::AiMl),
            "EDUCATION" => Ok(Category::Education),
            "BUSINESS" => Ok(Category::Business),
            "LIFESTYLE" => Ok(Category::Lifestyle),
            "ENTERTAINMENT" => Ok(Category::Entertainment),
            "GAMBLING" => Ok(Category::Gambling),
            "ADULT" => Ok(Category::Adult),
            "OTHER" => Ok(Category::Other),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown variant: {0}")]
pub struct UnknownVariant(pub String);

/// Channel size bucket. Small audiences naturally show higher reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeBucket {
    Micro,  // <1k
    Small,  // <10k
    Medium, // <100k
    Large,
}

impl SizeBucket {
    pub fn from_members(members: u64) -> Self {
        if members < 1_000 {
            SizeBucket::Micro
        } else if members < 10_000 {
            SizeBucket::Small
        } else if members < 100_000 {
            SizeBucket::Medium
        } else {
            SizeBucket::Large
        }
    }
}

/// Per-emoji reaction total on a post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReactionCount {
    pub emoji: String,
    pub count: u64,
}

/// A post resolved from the scan collaborator's wire record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub date: DateTime<Utc>,
    pub views: Option<u64>,
    pub forwards: Option<u64>,
    pub comments: Option<u64>,
    pub reactions: Vec<ReactionCount>,
    pub text: String,
    pub forwarded_from: Option<String>,
}

impl Post {
    pub fn total_reactions(&self) -> u64 {
        self.reactions.iter().map(|r| r.count).sum()
    }
}

/// A sampled commenting user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudienceMember {
    pub user_id: i64,
    pub is_premium: Option<bool>,
}

/// Everything one scan returns about a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSnapshot {
    pub username: String,
    pub title: String,
    pub description: String,
    pub members: u64,
    pub online_count: Option<u64>,
    pub created_at: Option<DateTime<Utc>>,
    /// Platform verification badge.
    pub verified: bool,
    /// Platform-applied scam label.
    pub platform_scam: bool,
    /// Platform-applied fake label.
    pub platform_fake: bool,
    pub comments_enabled: bool,
    pub reactions_enabled: bool,
    /// Discussion group exists but its messages are not readable.
    pub comments_hidden: bool,
    /// Newest first, at most 50.
    pub posts: Vec<Post>,
    pub audience: Vec<AudienceMember>,
}

/// External content classification of a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub category: Category,
    pub category_secondary: Option<Category>,
    pub bot_percentage: Option<f64>,
    pub ad_percentage: Option<f64>,
    /// 0–100 trust the classifier places in the comment section.
    pub comment_trust: Option<f64>,
}
