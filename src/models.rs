//! Catalog data model
//!
//! Every record kind the catalog serves, plus the normalized `Article` that
//! both remote articles and locally stored blogs are adapted into.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoStaticStr};

// ============================================================================
// ENUMS
// ============================================================================

/// Report severity. Declaration order is the total order Low < Medium < High < Critical.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[strum(ascii_case_insensitive)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Fixed rank used by the severity sorts
    pub fn rank(self) -> u8 {
        match self {
            Self::Critical => 4,
            Self::High => 3,
            Self::Medium => 2,
            Self::Low => 1,
        }
    }
}

/// Moderation status. Only `Approved` records are publicly visible.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Status {
    Pending,
    Approved,
    Rejected,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
    IntoStaticStr,
)]
#[strum(ascii_case_insensitive)]
pub enum Category {
    #[serde(rename = "Web Security")]
    #[strum(serialize = "Web Security")]
    WebSecurity,
    #[serde(rename = "Network Security")]
    #[strum(serialize = "Network Security")]
    NetworkSecurity,
    #[serde(rename = "Mobile Security")]
    #[strum(serialize = "Mobile Security")]
    MobileSecurity,
    #[serde(rename = "Cloud Security")]
    #[strum(serialize = "Cloud Security")]
    CloudSecurity,
    #[serde(rename = "IoT Security")]
    #[strum(serialize = "IoT Security")]
    IotSecurity,
    Cryptography,
    #[serde(rename = "Malware Analysis")]
    #[strum(serialize = "Malware Analysis")]
    MalwareAnalysis,
    #[serde(rename = "Social Engineering")]
    #[strum(serialize = "Social Engineering")]
    SocialEngineering,
}

/// CTF and writeup difficulty
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[strum(ascii_case_insensitive)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Banned,
}

// ============================================================================
// REPORTS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: String,
    pub reporter_id: String,
    pub reporter_name: Option<String>,
    pub title: String,
    pub severity: Severity,
    pub status: Status,
    pub description: String,
    pub summary: String,
    pub category: Category,
    pub organization: String,
    pub year: i32,
    pub submitted_date: NaiveDate,
    pub cve_id: Option<String>,
    pub program: Option<String>,
    pub bounty: Option<u32>,
    #[serde(default)]
    pub steps_to_reproduce: Vec<String>,
    pub impact_analysis: Option<String>,
    pub proof_of_concept: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Fields supplied when submitting a report. Status starts as pending.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewReport {
    pub reporter_id: String,
    pub title: String,
    pub severity: Severity,
    pub description: String,
    pub summary: String,
    pub category: Category,
    pub organization: String,
    pub year: i32,
    pub cve_id: Option<String>,
    pub program: Option<String>,
    pub bounty: Option<u32>,
    #[serde(default)]
    pub steps_to_reproduce: Vec<String>,
    pub impact_analysis: Option<String>,
    pub proof_of_concept: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Partial update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportUpdate {
    pub title: Option<String>,
    pub severity: Option<Severity>,
    pub status: Option<Status>,
    pub description: Option<String>,
    pub summary: Option<String>,
    pub category: Option<Category>,
    pub organization: Option<String>,
    pub year: Option<i32>,
    pub cve_id: Option<String>,
    pub tags: Option<Vec<String>>,
}

// ============================================================================
// ARTICLES AND BLOGS
// ============================================================================

/// Normalized blog item shown by the discovery views
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: String,
    pub title: String,
    pub excerpt: String,
    pub author: String,
    pub author_avatar: String,
    pub published_at: DateTime<Utc>,
    pub tags: Vec<String>,
    pub likes: u32,
    pub comments: u32,
    pub thumbnail: Option<String>,
    /// Only populated by detail lookups
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_html: Option<String>,
}

impl Article {
    /// Case-insensitive tag membership
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blog {
    pub id: String,
    pub title: String,
    pub author_id: String,
    pub date: NaiveDate,
    pub content: String,
    pub excerpt: String,
    pub tags: Vec<String>,
    pub likes: u32,
    pub comments: u32,
    pub thumbnail: Option<String>,
}

impl Blog {
    /// Detail-view article for a stored blog; the body is escaped text with line breaks kept
    pub fn to_article(&self, author: &str, author_avatar: &str) -> Article {
        let body = self.content.replace('<', "&lt;").replace('\n', "<br/>");
        Article {
            id: self.id.clone(),
            title: self.title.clone(),
            excerpt: self.excerpt.clone(),
            author: author.to_string(),
            author_avatar: author_avatar.to_string(),
            published_at: self
                .date
                .and_hms_opt(0, 0, 0)
                .map(|dt| dt.and_utc())
                .unwrap_or_default(),
            tags: self.tags.clone(),
            likes: self.likes,
            comments: self.comments,
            thumbnail: self.thumbnail.clone(),
            body_html: Some(format!("<div>{}</div>", body)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBlog {
    pub title: String,
    pub author_id: String,
    pub content: String,
    pub excerpt: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub thumbnail: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlogUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub excerpt: Option<String>,
    pub tags: Option<Vec<String>>,
    pub thumbnail: Option<String>,
}

// ============================================================================
// CTFS AND WRITEUPS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ctf {
    pub id: String,
    pub title: String,
    pub description: String,
    pub difficulty: Difficulty,
    pub category: String,
    pub creator_id: String,
    pub rating: f64,
    pub players: u32,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCtf {
    pub title: String,
    pub description: String,
    pub difficulty: Difficulty,
    pub category: String,
    pub creator_id: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CtfUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub category: Option<String>,
    pub rating: Option<f64>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Writeup {
    pub id: String,
    pub title: String,
    pub author_id: String,
    pub date: NaiveDate,
    pub content: String,
    pub category: String,
    pub difficulty: Difficulty,
    pub likes: u32,
    pub ctf_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewWriteup {
    pub title: String,
    pub author_id: String,
    pub content: String,
    pub category: String,
    pub difficulty: Difficulty,
    pub ctf_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WriteupUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub category: Option<String>,
    pub difficulty: Option<Difficulty>,
}

// ============================================================================
// USERS AND LEADERBOARD
// ============================================================================

/// Identity as seen by gated views
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub avatar: Option<String>,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Stored user profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub avatar: Option<String>,
    pub bio: Option<String>,
    pub xp: i64,
    pub status: AccountStatus,
}

/// Partial profile edit; `None` leaves the column untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    pub avatar: Option<String>,
    pub bio: Option<String>,
}

impl From<&UserProfile> for AuthUser {
    fn from(profile: &UserProfile) -> Self {
        Self {
            id: profile.id.clone(),
            username: profile.username.clone(),
            email: profile.email.clone(),
            role: profile.role,
            avatar: profile.avatar.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub user_id: String,
    pub xp: i64,
    pub completed_rooms: i64,
    pub rank: i64,
}

// ============================================================================
// HALL OF FAME
// ============================================================================

/// A credited finding, joined with the credited user's public profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HallOfFameEntry {
    pub id: String,
    pub user_id: String,
    pub bug_title: String,
    pub reward: String,
    pub date: NaiveDate,
    pub report_id: Option<String>,
    pub username: Option<String>,
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewHallOfFameEntry {
    pub user_id: String,
    pub bug_title: String,
    pub reward: String,
    /// Defaults to today
    pub date: Option<NaiveDate>,
    pub report_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HallOfFameUpdate {
    pub bug_title: Option<String>,
    pub reward: Option<String>,
    pub date: Option<NaiveDate>,
    pub report_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn test_severity_order_matches_rank() {
        let severities: Vec<Severity> = Severity::iter().collect();
        for pair in severities.windows(2) {
            assert!(pair[0] < pair[1]);
            assert!(pair[0].rank() < pair[1].rank());
        }
        assert_eq!(Severity::Critical.rank(), 4);
        assert_eq!(Severity::Low.rank(), 1);
    }

    #[test]
    fn test_category_labels_round_trip() {
        assert_eq!(Category::WebSecurity.to_string(), "Web Security");
        assert_eq!(Category::from_str("iot security").unwrap(), Category::IotSecurity);
        let json = serde_json::to_string(&Category::MalwareAnalysis).unwrap();
        assert_eq!(json, "\"Malware Analysis\"");
    }

    #[test]
    fn test_blog_body_is_escaped() {
        let blog = Blog {
            id: "9".to_string(),
            title: "t".to_string(),
            author_id: "a".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            content: "<script>\nline two".to_string(),
            excerpt: String::new(),
            tags: Vec::new(),
            likes: 0,
            comments: 0,
            thumbnail: None,
        };
        let article = blog.to_article("admin", "");
        assert_eq!(
            article.body_html.as_deref(),
            Some("<div>&lt;script><br/>line two</div>")
        );
        assert_eq!(article.published_at.date_naive(), blog.date);
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!(Status::from_str("Approved").unwrap(), Status::Approved);
        assert_eq!(Status::Pending.to_string(), "pending");
        assert!(Status::from_str("archived").is_err());
    }
}
