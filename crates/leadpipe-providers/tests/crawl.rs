//! Integration tests for `SiteCrawler` using wiremock HTTP mocks.

use leadpipe_providers::SiteCrawler;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn crawl_skips_failing_pages_and_merges_the_rest() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<html><body><p>Trusted probate counsel</p>\
             <form action=\"/contact/send\"></form></body></html>",
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/team"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<ul><li>Jane Doe, Managing Partner</li><li>Sam Roe, Attorney</li></ul>\
             <a href=\"mailto:jane@acmelaw.com\">Email</a>",
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/about"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let crawler = SiteCrawler::new(5, "LocalLeadFinderBot/1.0").expect("crawler");
    let result = crawler
        .crawl(&server.uri(), false)
        .await
        .expect("crawl should succeed");

    // Unmatched paths answer 404 and are skipped along with the 500.
    assert_eq!(result.pages_fetched, 2);
    assert_eq!(result.emails, vec!["jane@acmelaw.com".to_string()]);
    assert_eq!(
        result.contact_form_url,
        Some(format!("{}/contact/send", server.uri()))
    );
    assert_eq!(result.contacts.len(), 2);
    assert_eq!(result.contacts[0].full_name, "Jane Doe");
    assert_eq!(result.contacts[0].email.as_deref(), Some("jane@acmelaw.com"));
    assert!(result.contacts[1].email.is_none());
    assert_eq!(result.signals.len(), 1);
}

#[tokio::test]
async fn crawl_rejects_unparseable_site() {
    let crawler = SiteCrawler::new(5, "LocalLeadFinderBot/1.0").expect("crawler");
    assert!(crawler.crawl("http://[::1", false).await.is_err());
}
