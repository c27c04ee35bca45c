//! Built-in content
//!
//! The static article served when the article source is unreachable, and a
//! starter catalog used by `vidya seed` and the tests.

use chrono::{NaiveDate, TimeZone, Utc};

use crate::discovery::LocalArticles;
use crate::models::{Article, Blog, Category, Ctf, Difficulty, Report, Severity, Status};

pub const STATIC_ARTICLE_ID: &str = "1";
pub const ADMIN_AVATAR: &str = "https://api.dicebear.com/7.x/avataaars/svg?seed=admin";

/// Fixed local article with the same shape as a remote one
pub fn static_article() -> Article {
    Article {
        id: STATIC_ARTICLE_ID.to_string(),
        title: "Getting Started with Bug Bounty Hunting".to_string(),
        excerpt: "The fundamentals of bug bounty hunting and how to start a career in offensive security."
            .to_string(),
        author: "admin".to_string(),
        author_avatar: ADMIN_AVATAR.to_string(),
        published_at: Utc
            .with_ymd_and_hms(2024, 10, 28, 0, 0, 0)
            .single()
            .unwrap_or_default(),
        tags: vec![
            "Bug Bounty".to_string(),
            "Career".to_string(),
            "Tutorial".to_string(),
        ],
        likes: 245,
        comments: 32,
        thumbnail: Some(
            "https://images.unsplash.com/photo-1550751827-4bd374c3f58b?w=400".to_string(),
        ),
        body_html: None,
    }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default()
}

#[allow(clippy::too_many_arguments)]
fn report(
    id: &str,
    title: &str,
    severity: Severity,
    category: Category,
    organization: &str,
    submitted: NaiveDate,
    cve_id: Option<&str>,
    tags: &[&str],
    description: &str,
) -> Report {
    Report {
        id: id.to_string(),
        reporter_id: "seed-reporter".to_string(),
        reporter_name: Some("h4ck3r_0x01".to_string()),
        title: title.to_string(),
        severity,
        status: Status::Approved,
        description: description.to_string(),
        summary: format!("{} affecting {}", title, organization),
        category,
        organization: organization.to_string(),
        year: chrono::Datelike::year(&submitted),
        submitted_date: submitted,
        cve_id: cve_id.map(str::to_string),
        program: None,
        bounty: None,
        steps_to_reproduce: Vec::new(),
        impact_analysis: None,
        proof_of_concept: None,
        tags: tags.iter().map(|t| t.to_string()).collect(),
    }
}

/// Twelve approved reports (two of them critical) plus one pending and one rejected
pub fn sample_reports() -> Vec<Report> {
    use Category::*;
    use Severity::*;

    let mut reports = vec![
        report(
            "r1",
            "Remote Code Execution in Node.js Dependency",
            Critical,
            WebSecurity,
            "TechCorp",
            date(2025, 1, 20),
            Some("CVE-2025-1234"),
            &["RCE", "Node.js", "Supply Chain"],
            "Prototype pollution in a transitive dependency leads to arbitrary command execution.",
        ),
        report(
            "r2",
            "Password Reset Form Lacks CSRF Token",
            Medium,
            WebSecurity,
            "SecureApp LLC",
            date(2024, 10, 20),
            None,
            &["CSRF", "Authentication"],
            "The reset endpoint accepts cross-origin form posts without a token.",
        ),
        report(
            "r3",
            "Insecure Direct Object Reference on Invoices",
            High,
            WebSecurity,
            "CloudVault Services",
            date(2024, 10, 25),
            None,
            &["IDOR", "Authorization"],
            "Sequential invoice ids can be enumerated by any logged in customer.",
        ),
        report(
            "r4",
            "Login Endpoint Without Rate Limiting",
            Medium,
            WebSecurity,
            "LoginSecure Inc.",
            date(2024, 10, 27),
            None,
            &["Brute Force", "Authentication"],
            "Unlimited password attempts allow credential stuffing.",
        ),
        report(
            "r5",
            "Stack Traces Leaked in Error Pages",
            Low,
            WebSecurity,
            "InfoSys Solutions",
            date(2024, 10, 22),
            None,
            &["Information Disclosure"],
            "Verbose error pages reveal framework versions and file paths.",
        ),
        report(
            "r6",
            "Hardcoded Key in Mobile Banking App",
            High,
            MobileSecurity,
            "MobileSecure Corp",
            date(2024, 10, 15),
            Some("CVE-2024-12347"),
            &["Android", "Encryption"],
            "A static AES key shipped in the APK decrypts locally cached statements.",
        ),
        report(
            "r7",
            "Public Storage Bucket with Customer Exports",
            Critical,
            CloudSecurity,
            "CloudData Inc.",
            date(2024, 10, 18),
            None,
            &["S3", "Misconfiguration"],
            "A world-readable bucket exposes nightly customer data exports.",
        ),
        report(
            "r8",
            "Ransomware Loader Analysis",
            High,
            MalwareAnalysis,
            "Security Research Lab",
            date(2024, 10, 12),
            None,
            &["Ransomware", "Reverse Engineering"],
            "Unpacking and behaviour of a loader dropping a LockBit-derived payload.",
        ),
        report(
            "r9",
            "VLAN Segmentation Bypass via Double Tagging",
            High,
            NetworkSecurity,
            "NetSecure Enterprises",
            date(2023, 12, 5),
            None,
            &["VLAN", "Lateral Movement"],
            "Double-tagged frames reach the management network from the guest VLAN.",
        ),
        report(
            "r10",
            "Default Credentials on Smart Cameras",
            Medium,
            IotSecurity,
            "SmartHome Devices",
            date(2023, 11, 20),
            None,
            &["IoT", "Default Credentials"],
            "Cameras ship with an undocumented admin account and a shared password.",
        ),
        report(
            "r11",
            "ECB Mode Used for Session Tokens",
            High,
            Cryptography,
            "CryptoSoft Ltd",
            date(2023, 10, 15),
            None,
            &["Cryptography", "Session"],
            "Block patterns in session tokens allow forging privileged sessions.",
        ),
        report(
            "r12",
            "Pretexting Campaign Against Helpdesk",
            Low,
            SocialEngineering,
            "Acme Retail",
            date(2023, 9, 2),
            None,
            &["Phishing", "Helpdesk"],
            "Callers impersonating staff obtained password resets without verification.",
        ),
    ];

    let mut pending = report(
        "r13",
        "Critical SSRF in Webhook Tester",
        Critical,
        WebSecurity,
        "HookHub",
        date(2025, 2, 1),
        Some("CVE-2025-9999"),
        &["SSRF"],
        "Webhook previews fetch internal metadata endpoints.",
    );
    pending.status = Status::Pending;

    let mut rejected = report(
        "r14",
        "Self XSS in Profile Bio",
        Low,
        WebSecurity,
        "SocialSite",
        date(2024, 6, 11),
        None,
        &["XSS"],
        "Script in the bio only executes for the account owner.",
    );
    rejected.status = Status::Rejected;

    reports.push(pending);
    reports.push(rejected);
    reports
}

pub fn sample_blogs(author_id: &str) -> Vec<Blog> {
    vec![
        Blog {
            id: STATIC_ARTICLE_ID.to_string(),
            title: "Getting Started with Bug Bounty Hunting".to_string(),
            author_id: author_id.to_string(),
            date: date(2024, 10, 28),
            content: "# Getting Started with Bug Bounty Hunting\n\nPick one program, learn its scope <carefully>, and keep notes."
                .to_string(),
            excerpt: "The fundamentals of bug bounty hunting.".to_string(),
            tags: vec!["Bug Bounty".to_string(), "Career".to_string()],
            likes: 245,
            comments: 32,
            thumbnail: None,
        },
        Blog {
            id: "2".to_string(),
            title: "Advanced XSS Exploitation Techniques".to_string(),
            author_id: author_id.to_string(),
            date: date(2024, 10, 25),
            content: "# Advanced XSS\n\nFilter bypasses and DOM sinks.".to_string(),
            excerpt: "Cross-site scripting bypass methods.".to_string(),
            tags: vec!["XSS".to_string(), "Web Security".to_string()],
            likes: 312,
            comments: 45,
            thumbnail: None,
        },
    ]
}

pub fn sample_ctfs(creator_id: &str) -> Vec<Ctf> {
    vec![
        Ctf {
            id: "c1".to_string(),
            title: "Web Exploitation 101".to_string(),
            description: "Find the flag hidden behind a vulnerable login form.".to_string(),
            difficulty: Difficulty::Easy,
            category: "Web".to_string(),
            creator_id: creator_id.to_string(),
            rating: 4.8,
            players: 1234,
            tags: vec!["SQL Injection".to_string(), "Web".to_string()],
        },
        Ctf {
            id: "c2".to_string(),
            title: "Reverse Engineering Challenge".to_string(),
            description: "Crack the binary and recover the flag. x86 assembly required."
                .to_string(),
            difficulty: Difficulty::Hard,
            category: "Reversing".to_string(),
            creator_id: creator_id.to_string(),
            rating: 4.5,
            players: 542,
            tags: vec!["Assembly".to_string(), "Binary".to_string()],
        },
    ]
}

/// The built-in blogs, for detail lookups without a database
pub struct BuiltinArticles;

impl LocalArticles for BuiltinArticles {
    fn local_article(&self, id: &str) -> Option<Article> {
        sample_blogs("admin")
            .iter()
            .find(|b| b.id == id)
            .map(|b| b.to_article("admin", ADMIN_AVATAR))
    }
}
