use std::time::Duration;

use helpmate_knowledge::{HttpPageFetcher, KnowledgeError, PageFetcher};
use httpmock::prelude::*;

fn fetcher(max_bytes: usize) -> HttpPageFetcher {
    HttpPageFetcher::new(Duration::from_secs(2), max_bytes).expect("client should build")
}

#[tokio::test]
async fn html_pages_are_reduced_to_readable_text() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/faq");
            then.status(200)
                .header("Content-Type", "text/html; charset=utf-8")
                .body(
                    "<html><body><nav>Menu</nav>\
                     <main><h1>Returns</h1><p>Refunds   within 30 days.</p></main>\
                     </body></html>",
                );
        })
        .await;

    let text = fetcher(2_000_000)
        .fetch_text(&server.url("/faq"))
        .await
        .expect("page should be fetched");

    mock.assert_async().await;
    assert_eq!(text, "Returns Refunds within 30 days.");
}

#[tokio::test]
async fn plain_text_is_whitespace_collapsed() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/notes.txt");
            then.status(200)
                .header("Content-Type", "text/plain")
                .body("Open\n\n  daily   from nine");
        })
        .await;

    let text = fetcher(2_000_000)
        .fetch_text(&server.url("/notes.txt"))
        .await
        .expect("text should be fetched");

    assert_eq!(text, "Open daily from nine");
}

#[tokio::test]
async fn error_statuses_are_reported() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/missing");
            then.status(404);
        })
        .await;

    let result = fetcher(2_000_000).fetch_text(&server.url("/missing")).await;

    assert!(matches!(result, Err(KnowledgeError::Status { status: 404, .. })));
}

#[tokio::test]
async fn binary_content_is_rejected() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/brochure.pdf");
            then.status(200)
                .header("Content-Type", "application/pdf")
                .body("%PDF-1.7");
        })
        .await;

    let result = fetcher(2_000_000).fetch_text(&server.url("/brochure.pdf")).await;

    match result {
        Err(KnowledgeError::UnsupportedContent(content_type)) => {
            assert_eq!(content_type, "application/pdf");
        }
        other => panic!("expected unsupported content, got {other:?}"),
    }
}

#[tokio::test]
async fn body_is_capped_at_max_bytes() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/long");
            then.status(200)
                .header("Content-Type", "text/plain")
                .body("shipping ".repeat(1_000));
        })
        .await;

    let text = fetcher(100)
        .fetch_text(&server.url("/long"))
        .await
        .expect("page should be fetched");

    assert!(!text.is_empty());
    assert!(text.len() <= 100, "got {} bytes", text.len());
}

#[tokio::test]
async fn non_http_urls_are_rejected_without_a_request() {
    let fetcher = fetcher(2_000_000);

    for url in ["ftp://shop.example.com/faq", "not a url"] {
        let result = fetcher.fetch_text(url).await;
        assert!(
            matches!(result, Err(KnowledgeError::InvalidUrl(ref rejected)) if rejected == url),
            "{url} should be rejected"
        );
    }
}
