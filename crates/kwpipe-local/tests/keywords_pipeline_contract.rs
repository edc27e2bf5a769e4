use axum::{http::header, routing::get, Router};
use kwpipe_local::{keywords_for_url, AnalyzerConfig, ResponseAssembler, SafeFetcher};
use std::net::SocketAddr;

async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn local_assembler() -> ResponseAssembler<SafeFetcher> {
    let fetcher = SafeFetcher::new(AnalyzerConfig {
        allow_private_hosts: true,
        ..AnalyzerConfig::default()
    })
    .unwrap();
    ResponseAssembler::new(fetcher)
}

const SEO_PAGE: &str = r#"<!doctype html>
<html><head>
  <title>Best SEO Tools</title>
  <meta name="description" content="A short guide to keyword research">
  <script>window.track("seo tools seo tools");</script>
</head><body>
  <nav>Home Blog Pricing</nav>
  <main>
    <h2>Keyword Research</h2>
    <p>seo tools seo tools keyword research</p>
  </main>
</body></html>"#;

#[tokio::test]
async fn live_page_is_ranked_with_probe_diagnostics() {
    let app = Router::new()
        .route(
            "/blog/seo-tools",
            get(|| async { ([(header::CONTENT_TYPE, "text/html; charset=utf-8")], SEO_PAGE) }),
        )
        .route("/robots.txt", get(|| async { "User-agent: *\nAllow: /" }));
    let addr = serve(app).await;
    let url = format!("http://{addr}/blog/seo-tools");

    let r = local_assembler().analyze(&url).await;
    assert_eq!(r.source_url, url);
    // Script and nav text never reach the body stream.
    assert_eq!(r.content_tokens, 8);
    assert!(r.all.iter().all(|f| f.keyword != "home" && f.keyword != "window"));

    let d = &r.diagnostics;
    assert_eq!(d.http_status, Some(200));
    assert_eq!(d.bytes, Some(SEO_PAGE.len() as u64));
    assert_eq!(d.robots_txt, Some(200));
    assert_eq!(d.sitemap_xml, Some(404));
    assert_eq!(d.stripped_tags_count, 2);
    assert!(d.warnings.is_empty(), "{:?}", d.warnings);

    let research = r.all.iter().find(|f| f.keyword == "keyword research").unwrap();
    let positions: Vec<&str> = research.positions.iter().map(|p| p.as_str()).collect();
    assert_eq!(positions, vec!["h2", "meta", "content"]);
}

#[tokio::test]
async fn response_serializes_with_camel_case_keys() {
    let app = Router::new().route(
        "/",
        get(|| async { ([(header::CONTENT_TYPE, "text/html")], SEO_PAGE) }),
    );
    let addr = serve(app).await;
    let r = local_assembler().analyze(&format!("http://{addr}/")).await;

    let v = serde_json::to_value(&r).unwrap();
    for key in ["sourceUrl", "contentTokens", "all", "shortTail", "longTail", "diagnostics"] {
        assert!(v.get(key).is_some(), "missing {key}: {v}");
    }
    let d = &v["diagnostics"];
    assert_eq!(d["httpStatus"], 200);
    assert_eq!(d["robotsTxt"], 404);
    assert!(d["strippedTagsCount"].is_u64());
    assert!(d["warnings"].is_array());
    let first = &v["all"][0];
    assert_eq!(first["rank"], 1);
    assert!(first["positions"].is_array());
    assert!(first["density"].is_f64());
}

#[tokio::test]
async fn redirect_chain_lands_on_the_final_document() {
    let app = Router::new()
        .route(
            "/old",
            get(|| async { axum::response::Redirect::permanent("/new") }),
        )
        .route(
            "/new",
            get(|| async { ([(header::CONTENT_TYPE, "text/html")], SEO_PAGE) }),
        );
    let addr = serve(app).await;
    let r = local_assembler().analyze(&format!("http://{addr}/old")).await;
    assert_eq!(r.diagnostics.http_status, Some(200));
    assert_eq!(r.content_tokens, 8);
}

#[tokio::test]
async fn http_error_degrades_but_keeps_the_status() {
    let addr = serve(Router::new()).await;
    let r = local_assembler()
        .analyze(&format!("http://{addr}/missing"))
        .await;
    assert!(r.all.is_empty());
    assert_eq!(r.content_tokens, 0);
    assert_eq!(r.diagnostics.http_status, Some(404));
    assert_eq!(r.diagnostics.warnings.len(), 1);
}

#[tokio::test]
async fn default_entrypoint_refuses_loopback() {
    // The guard cannot be lifted from the environment.
    std::env::set_var("KWPIPE_ALLOW_PRIVATE_HOSTS", "1");
    let r = keywords_for_url("http://127.0.0.1/anything").await;
    assert!(r.all.is_empty() && r.short_tail.is_empty() && r.long_tail.is_empty());
    assert_eq!(r.content_tokens, 0);
    assert_eq!(r.diagnostics.http_status, None);
    assert_eq!(r.diagnostics.robots_txt, Some(404));
    assert_eq!(r.diagnostics.sitemap_xml, Some(404));
    assert!(
        r.diagnostics.warnings.iter().any(|w| w.contains("127.0.0.1")),
        "{:?}",
        r.diagnostics.warnings
    );
}

#[tokio::test]
async fn text_plain_is_analyzed_with_a_warning() {
    let app = Router::new().route("/notes", get(|| async { "plain seo notes about seo" }));
    let addr = serve(app).await;
    let r = local_assembler().analyze(&format!("http://{addr}/notes")).await;
    assert_eq!(r.diagnostics.http_status, Some(200));
    assert!(r.content_tokens > 0);
    assert!(r.diagnostics.warnings[0].contains("text/plain"));
}
