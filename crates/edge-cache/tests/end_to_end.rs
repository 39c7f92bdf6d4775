//! Write, read, serve through a CDN and revalidate, against a simulated
//! platform API.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use edge_cache::{
    from_cdn_tag, CacheHandler, CacheHeadersBuilder, CacheValue, EntryState, PageValue,
    Revalidate, RevalidationPropagator, SetOptions, StorageKey,
};
use edge_core::{BridgeConfig, RequestScope};
use edge_data::{HttpRequest, HttpResponse, RecordingTransport, StoreSelector};
use http::{Method, StatusCode};

/// Blob API plus a CDN that indexes cached responses by their `Cache-Tag`.
#[derive(Default)]
struct Platform {
    blobs: HashMap<String, Vec<u8>>,
    cdn: HashMap<String, Vec<String>>,
    purges: Vec<Vec<String>>,
    reject_purges: bool,
}

impl Platform {
    fn handle(&mut self, request: &HttpRequest) -> HttpResponse {
        let path = request
            .url
            .strip_prefix("https://api.example.com")
            .unwrap_or(&request.url);

        if let Some(blob) = path.strip_prefix("/api/v1/blobs/site1/deploy:dep1/") {
            return match request.method {
                Method::GET => match self.blobs.get(blob) {
                    Some(body) => HttpResponse::new(StatusCode::OK, body.clone()),
                    None => HttpResponse::new(StatusCode::NOT_FOUND, ""),
                },
                Method::PUT => {
                    self.blobs.insert(blob.to_string(), request.body.to_vec());
                    HttpResponse::new(StatusCode::OK, "")
                }
                _ => HttpResponse::new(StatusCode::METHOD_NOT_ALLOWED, ""),
            };
        }

        if path == "/api/v1/purge" {
            if self.reject_purges {
                return HttpResponse::new(StatusCode::INTERNAL_SERVER_ERROR, "purge backend down");
            }
            let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
            assert_eq!(body["site_id"], "site1");
            let tags: Vec<String> = body["cache_tags"]
                .as_array()
                .unwrap()
                .iter()
                .map(|t| t.as_str().unwrap().to_string())
                .collect();
            self.cdn
                .retain(|_, cached| !cached.iter().any(|t| tags.contains(t)));
            self.purges.push(tags);
            return HttpResponse::new(StatusCode::ACCEPTED, "");
        }

        HttpResponse::new(StatusCode::NOT_FOUND, "")
    }

    fn cache_response(&mut self, path: &str, headers: &[(String, String)]) {
        let tags = headers
            .iter()
            .find(|(name, _)| name == "Cache-Tag")
            .map(|(_, value)| value.split(',').map(str::to_string).collect())
            .unwrap_or_default();
        self.cdn.insert(path.to_string(), tags);
    }

    fn serves(&self, path: &str) -> bool {
        self.cdn.contains_key(path)
    }
}

struct Harness {
    platform: Arc<Mutex<Platform>>,
    transport: Arc<RecordingTransport>,
    handler: CacheHandler,
}

fn harness() -> Harness {
    let platform = Arc::new(Mutex::new(Platform::default()));
    let transport = {
        let platform = platform.clone();
        Arc::new(RecordingTransport::with_responder(move |request| {
            Ok(platform.lock().unwrap().handle(request))
        }))
    };
    let config = Arc::new(BridgeConfig {
        deploy_id: Some("dep1".into()),
        site_id: Some("site1".into()),
        api_host: "https://api.example.com".into(),
        api_token: Some("secret".into()),
        ..Default::default()
    });
    let handler = CacheHandler::new(
        Arc::new(StoreSelector::new(config.clone(), transport.clone())),
        Arc::new(RevalidationPropagator::new(config, transport.clone())),
    );

    Harness {
        platform,
        transport,
        handler,
    }
}

fn page(html: &str) -> CacheValue {
    CacheValue::Page(PageValue {
        html: html.as_bytes().to_vec(),
        page_data: Some(serde_json::json!({ "pageProps": { "slug": "post-1" } })),
        status: Some(200),
        ..Default::default()
    })
}

#[tokio::test]
async fn test_tag_revalidation_purges_cdn_and_keeps_origin_readable() {
    let h = harness();

    h.handler
        .set(
            "/blog/post-1",
            page("<h1>Post 1</h1>"),
            SetOptions::revalidate_after(60).with_tags(["posts"]),
        )
        .await
        .unwrap();

    let hit = h.handler.get("/blog/post-1").await.unwrap();
    assert_eq!(hit.entry.revalidate, Revalidate::After(60));
    assert_eq!(hit.state, EntryState::Fresh);

    let headers = CacheHeadersBuilder::from_hit(&hit, "/blog/post-1").build();
    h.platform
        .lock()
        .unwrap()
        .cache_response("/blog/post-1", &headers);
    assert!(h.platform.lock().unwrap().serves("/blog/post-1"));

    h.handler.revalidate_tag("posts").await.unwrap();

    {
        let platform = h.platform.lock().unwrap();
        assert!(!platform.serves("/blog/post-1"));
        assert_eq!(platform.purges, vec![vec!["_N_T_posts".to_string()]]);
        assert_eq!(from_cdn_tag(&platform.purges[0][0]), Some("posts"));
    }

    let hit = h.handler.get("/blog/post-1").await.unwrap();
    assert_eq!(hit.entry.value, page("<h1>Post 1</h1>"));
    assert_eq!(hit.state, EntryState::Stale);
}

#[tokio::test]
async fn test_purges_only_matching_responses() {
    let h = harness();

    for (path, tag) in [("/blog/post-1", "posts"), ("/shop", "products")] {
        h.handler
            .set(path, page(path), SetOptions::revalidate_after(300).with_tags([tag]))
            .await
            .unwrap();
        let hit = h.handler.get(path).await.unwrap();
        let headers = CacheHeadersBuilder::from_hit(&hit, path).build();
        h.platform.lock().unwrap().cache_response(path, &headers);
    }

    h.handler.propagator().purge_path("/shop").await.unwrap();

    let platform = h.platform.lock().unwrap();
    assert!(!platform.serves("/shop"));
    assert!(platform.serves("/blog/post-1"));
}

#[tokio::test]
async fn test_failed_purge_surfaces_error_and_leaves_store_untouched() {
    let h = harness();
    h.handler
        .set("/blog/post-1", page("v1"), SetOptions::default().with_tags(["posts"]))
        .await
        .unwrap();
    let blobs_before = h.platform.lock().unwrap().blobs.len();
    h.platform.lock().unwrap().reject_purges = true;

    let result = h.handler.propagator().purge_tag("posts").await;

    assert!(matches!(
        result,
        Err(edge_cache::PurgeError::Rejected { status: 500, .. })
    ));
    assert_eq!(h.platform.lock().unwrap().blobs.len(), blobs_before);
    assert_eq!(
        h.handler.get("/blog/post-1").await.unwrap().entry.value,
        page("v1")
    );
}

#[tokio::test]
async fn test_on_demand_revalidation_of_a_page() {
    let h = harness();
    let scope = RequestScope::new();

    h.handler
        .set("/about", page("old"), SetOptions::revalidate_after(3600))
        .await
        .unwrap();
    let hit = h.handler.get("/about").await.unwrap();
    let headers = CacheHeadersBuilder::from_hit(&hit, "/about").build();
    h.platform.lock().unwrap().cache_response("/about", &headers);

    h.handler.revalidate_path("/about", &scope).await.unwrap();
    h.handler
        .set_with_scope("/about", page("new"), SetOptions::revalidate_after(3600), &scope)
        .await
        .unwrap();
    scope.wait_for_background_work().await;

    assert!(!h.platform.lock().unwrap().serves("/about"));
    assert_eq!(h.handler.get("/about").await.unwrap().entry.value, page("new"));
}

#[tokio::test]
async fn test_store_traffic_uses_encoded_keys_and_token() {
    let h = harness();
    let long_key = format!("https://api.example.com/search?q={}", "x".repeat(400));
    h.handler
        .set(&long_key, page("results"), SetOptions::default())
        .await
        .unwrap();

    let requests = h.transport.requests();
    let put = requests.iter().find(|r| r.method == Method::PUT).unwrap();
    let storage_key = StorageKey::encode(&long_key);
    assert!(storage_key.is_truncated());
    assert!(put.url.ends_with(storage_key.as_str()));
    assert_eq!(put.headers[http::header::AUTHORIZATION], "Bearer secret");

    assert!(h.handler.get(&long_key).await.is_some());
}
