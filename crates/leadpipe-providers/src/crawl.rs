//! Best-effort crawler for a lead's own website.
//!
//! Fetches the home page and a handful of well-known paths, then scrapes
//! emails, phone numbers, a contact form, named people with recognizable
//! titles, and practice-focus signals. Pages that fail to load are skipped.

use std::collections::HashSet;
use std::sync::LazyLock;

use leadpipe_core::{split_full_name, CrawlResult, CrawledContact, CrawledSignal, TITLE_PRIORITY};
use regex::Regex;
use reqwest::{Client, Url};

use crate::error::ProviderError;

const CANDIDATE_PATHS: &[&str] = &["/contact", "/about", "/team", "/attorneys", "/our-team"];
const DEEP_PATHS: &[&str] = &["/blog", "/news"];
const ASSET_SUFFIXES: &[&str] = &[".png", ".jpg", ".jpeg", ".gif", ".svg", ".webp", ".css", ".js"];

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,})").expect("valid regex")
});
static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\+?1?[\s.-]?\(?\d{3}\)?[\s.-]?\d{3}[\s.-]?\d{4})").expect("valid regex")
});
static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-Z][a-z]+\s+[A-Z][a-z]+)\b").expect("valid regex"));
static FORM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<form[^>]*action\s*=\s*["']([^"']+)["']"#).expect("valid regex")
});
static SCRIPT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b.*?</script>|<style\b.*?</style>").expect("valid regex")
});
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));
static PRACTICE_FOCUS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)estate planning|probate|trust").expect("valid regex"));

/// Fetches and scrapes company websites.
pub struct SiteCrawler {
    client: Client,
}

impl SiteCrawler {
    /// # Errors
    ///
    /// Returns [`ProviderError::Http`] if the `reqwest::Client` cannot be built.
    pub fn new(timeout_secs: u64, user_agent: &str) -> Result<Self, ProviderError> {
        Ok(Self {
            client: crate::build_http_client(timeout_secs, user_agent)?,
        })
    }

    /// Crawls `website`; with `deep` the blog and news pages are included.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::InvalidUrl`] if `website` cannot be parsed.
    /// Individual page failures are not errors.
    pub async fn crawl(&self, website: &str, deep: bool) -> Result<CrawlResult, ProviderError> {
        let urls = crawl_urls(website, deep)?;
        let mut pages = Vec::with_capacity(urls.len());

        for url in urls {
            let Ok(response) = self.client.get(url.clone()).send().await else {
                tracing::debug!(%url, "crawl page unreachable");
                continue;
            };
            if !response.status().is_success() {
                tracing::debug!(%url, status = %response.status(), "crawl page skipped");
                continue;
            }
            let Ok(html) = response.text().await else {
                continue;
            };
            pages.push((url, html));
        }

        Ok(extract_site(&pages))
    }
}

/// Home page plus the candidate paths, resolved against the site root.
pub(crate) fn crawl_urls(website: &str, deep: bool) -> Result<Vec<Url>, ProviderError> {
    let trimmed = website.trim();
    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };
    let base = Url::parse(&with_scheme).map_err(|e| ProviderError::InvalidUrl {
        url: website.to_string(),
        reason: e.to_string(),
    })?;

    let extra: &[&str] = if deep { DEEP_PATHS } else { &[] };
    let mut urls = vec![base.clone()];
    for path in CANDIDATE_PATHS.iter().chain(extra) {
        if let Ok(url) = base.join(path) {
            urls.push(url);
        }
    }
    Ok(urls)
}

/// Scrapes every fetched page into one [`CrawlResult`].
pub(crate) fn extract_site(pages: &[(Url, String)]) -> CrawlResult {
    let mut result = CrawlResult {
        pages_fetched: pages.len(),
        ..CrawlResult::default()
    };
    let mut seen_phones = HashSet::new();
    let mut seen_names = HashSet::new();

    for (url, html) in pages {
        for email in extract_emails(html) {
            if !result.emails.contains(&email) {
                result.emails.push(email);
            }
        }

        for cap in PHONE_RE.captures_iter(html) {
            let phone = cap[1].trim().to_string();
            if seen_phones.insert(phone.clone()) {
                result.phones.push(phone);
            }
        }

        if result.contact_form_url.is_none() {
            result.contact_form_url = extract_contact_form(html, url);
        }

        for (full_name, title) in extract_contacts(html) {
            if seen_names.insert(full_name.clone()) {
                result.contacts.push(CrawledContact {
                    full_name,
                    title: Some(title),
                    email: None,
                    evidence_url: Some(url.to_string()),
                });
            }
        }

        if PRACTICE_FOCUS_RE.is_match(html) {
            result.signals.push(CrawledSignal {
                signal_type: "practice_focus".to_string(),
                signal_value: serde_json::json!("Mentions estate planning, probate, or trusts"),
                evidence_url: Some(url.to_string()),
            });
        }
    }

    attach_emails(&mut result.contacts, &result.emails);
    result
}

/// Lower-cased, de-duplicated addresses, ignoring asset names like `logo@2x.png`.
pub(crate) fn extract_emails(html: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for cap in EMAIL_RE.captures_iter(html) {
        let email = cap[1].to_lowercase();
        if ASSET_SUFFIXES.iter().any(|ext| email.ends_with(ext)) {
            continue;
        }
        if !out.contains(&email) {
            out.push(email);
        }
    }
    out
}

/// The first `<form action>` on the page, resolved against the page URL.
pub(crate) fn extract_contact_form(html: &str, page_url: &Url) -> Option<String> {
    let cap = FORM_RE.captures(html)?;
    page_url.join(&cap[1]).ok().map(|u| u.to_string())
}

/// `(full name, title)` pairs from text lines that mention a known title.
pub(crate) fn extract_contacts(html: &str) -> Vec<(String, String)> {
    let without_scripts = SCRIPT_RE.replace_all(html, "\n");
    let text = TAG_RE.replace_all(&without_scripts, "\n");

    let mut out = Vec::new();
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let Some(name) = NAME_RE.captures(line).map(|c| c[1].to_string()) else {
            continue;
        };
        let lower = line.to_lowercase();
        let Some(title) = TITLE_PRIORITY
            .iter()
            .find(|t| lower.contains(&t.to_lowercase()))
        else {
            continue;
        };
        // "Managing Partner" on its own line matches the name pattern too.
        if name.eq_ignore_ascii_case(title) {
            continue;
        }
        out.push((name, (*title).to_string()));
    }
    out
}

/// Gives each contact the first site email whose local part contains the
/// contact's first or last name.
fn attach_emails(contacts: &mut [CrawledContact], emails: &[String]) {
    for contact in contacts.iter_mut() {
        let (first, last) = split_full_name(&contact.full_name);
        let names: Vec<String> = [first, last]
            .into_iter()
            .flatten()
            .map(|n| n.to_lowercase())
            .filter(|n| n.len() >= 2)
            .collect();
        contact.email = emails
            .iter()
            .find(|email| {
                let local = email.split('@').next().unwrap_or_default();
                names.iter().any(|n| local.contains(n.as_str()))
            })
            .cloned();
    }
}

#[cfg(test)]
#[path = "crawl_test.rs"]
mod tests;
