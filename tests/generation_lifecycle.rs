//! End-to-end lifecycle tests: submit, poll, webhook callback and the
//! poll/callback race, driven through the public `GenerationService` API
//! against a scripted provider and the in-memory store.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;

use mediagen_core::config::MediaGenConfig;
use mediagen_core::models::{GenerationRequest, GenerationStatus, MediaType};
use mediagen_core::orchestration::GenerationService;
use mediagen_core::persistence::{MemoryTaskStore, TaskStore};
use mediagen_core::providers::ProviderKind;
use mediagen_core::registry::ProviderRegistry;
use mediagen_core::signing::CallbackSigner;
use mediagen_core::test_helpers::ScriptedProvider;
use mediagen_core::{OrchestrationError, SignatureError};

const CALLBACK_BASE: &str = "https://app.example.com/api/generation/callback";
const SECRET: &str = "lifecycle-secret";

struct World {
    service: GenerationService,
    provider: Arc<ScriptedProvider>,
    store: Arc<MemoryTaskStore>,
    signer: CallbackSigner,
}

fn world() -> World {
    let config = Arc::new(MediaGenConfig {
        callback_base_url: CALLBACK_BASE.to_string(),
        callback_secret: SECRET.to_string(),
        default_provider: Some("piapi".to_string()),
        kie_api_key: None,
        piapi_api_key: Some("piapi-key".to_string()),
        replicate_api_token: None,
        request_timeout_ms: 1000,
    });

    let registry = Arc::new(ProviderRegistry::new(config));
    let provider = Arc::new(ScriptedProvider::new(ProviderKind::PiApi));
    registry.insert(provider.clone());

    let store = Arc::new(MemoryTaskStore::new());
    let signer = CallbackSigner::new(CALLBACK_BASE, SECRET);
    let service = GenerationService::new(
        registry,
        signer.clone(),
        store.clone() as Arc<dyn TaskStore>,
    );

    World {
        service,
        provider,
        store,
        signer,
    }
}

/// Pull the three signed query parameters back out of a callback URL, the
/// way the webhook route handler would.
fn callback_params(url: &str) -> HashMap<String, String> {
    let (_, query) = url.split_once('?').expect("callback url has a query");
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[tokio::test]
async fn submitted_task_is_stored_pending_with_provider_task_id() {
    let w = world();
    w.provider
        .on_create(Ok(ScriptedProvider::created_snapshot("p-123", "queued")));

    let task = w
        .service
        .submit(GenerationRequest::new("a lighthouse at dusk", MediaType::Image))
        .await
        .unwrap();

    assert_eq!(task.provider_task_id, "p-123");
    assert_eq!(task.status, GenerationStatus::Pending);

    let stored = w.store.get_task(&task.id).await.unwrap().unwrap();
    assert_eq!(stored.status, GenerationStatus::Pending);
    assert_eq!(stored.provider, ProviderKind::PiApi);
}

#[tokio::test]
async fn refresh_promotes_success_report_to_completed() {
    let w = world();
    w.provider
        .on_create(Ok(ScriptedProvider::created_snapshot("p-200", "queued")));
    let task = w
        .service
        .submit(GenerationRequest::new("ocean waves", MediaType::Video))
        .await
        .unwrap();

    w.provider.push_status(Ok(ScriptedProvider::completed_snapshot(
        "p-200",
        &["https://x/video.mp4"],
    )));

    let refreshed = w.service.refresh_status(&task.id).await.unwrap();
    assert_eq!(refreshed.status, GenerationStatus::Completed);
    assert_eq!(refreshed.result_urls, vec!["https://x/video.mp4".to_string()]);
}

#[tokio::test]
async fn callback_round_trip_through_signed_url_params() {
    let w = world();
    w.provider
        .on_create(Ok(ScriptedProvider::created_snapshot("p-300", "waiting")));
    let task = w
        .service
        .submit(GenerationRequest::new("a red fox", MediaType::Image))
        .await
        .unwrap();

    // The provider received a signed callback URL at creation time; a real
    // webhook POST arrives at that URL with these query parameters.
    let url = w.provider.last_callback_url().unwrap();
    let params = callback_params(&url);
    assert_eq!(params["task_id"], task.id);

    w.service
        .handle_callback(
            &params["task_id"],
            &params["ts"],
            &params["sig"],
            &json!({
                "task_id": "p-300",
                "status": "success",
                "results": ["https://x/fox.png"],
            }),
        )
        .await
        .unwrap();

    let stored = w.store.get_task(&task.id).await.unwrap().unwrap();
    assert_eq!(stored.status, GenerationStatus::Completed);
    assert_eq!(stored.result_urls, vec!["https://x/fox.png".to_string()]);
}

#[tokio::test]
async fn stale_signature_is_rejected_and_task_untouched() {
    let w = world();
    w.provider
        .on_create(Ok(ScriptedProvider::created_snapshot("p-400", "queued")));
    let task = w
        .service
        .submit(GenerationRequest::new("northern lights", MediaType::Video))
        .await
        .unwrap();

    // 7300 seconds old against the 3600s window.
    let stale_ts = (chrono::Utc::now().timestamp() - 7300) as u64;
    let stale = w.signer.sign_at(&task.id, stale_ts);

    let err = w
        .service
        .handle_callback(
            &task.id,
            &stale_ts.to_string(),
            &stale.signature,
            &json!({"task_id": "p-400", "status": "success"}),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        OrchestrationError::Signature(SignatureError::Expired { .. })
    ));

    let stored = w.store.get_task(&task.id).await.unwrap().unwrap();
    assert_eq!(stored.status, GenerationStatus::Pending);
}

#[tokio::test]
async fn poll_and_stale_callback_race_resolves_to_completed() {
    let w = world();
    w.provider
        .on_create(Ok(ScriptedProvider::created_snapshot("p-500", "queued")));
    let task = w
        .service
        .submit(GenerationRequest::new("city at night", MediaType::Video))
        .await
        .unwrap();

    w.provider.push_status(Ok(ScriptedProvider::completed_snapshot(
        "p-500",
        &["https://x/city.mp4"],
    )));

    let signed = w.signer.sign(&task.id);
    let signed_timestamp = signed.timestamp.to_string();
    let stale = json!({"task_id": "p-500", "status": "processing", "progress": 95});

    let (poll, callback) = futures::join!(
        w.service.refresh_status(&task.id),
        w.service
            .handle_callback(&task.id, &signed_timestamp, &signed.signature, &stale),
    );
    poll.unwrap();
    callback.unwrap();

    let stored = w.store.get_task(&task.id).await.unwrap().unwrap();
    assert_eq!(stored.status, GenerationStatus::Completed);
    assert_eq!(stored.result_urls, vec!["https://x/city.mp4".to_string()]);
}

#[tokio::test]
async fn full_video_lifecycle_with_progress_and_thumbnail() {
    let w = world();
    w.provider
        .on_create(Ok(ScriptedProvider::created_snapshot("p-600", "waiting")));
    let task = w
        .service
        .submit(GenerationRequest::new("drone shot of a glacier", MediaType::Video))
        .await
        .unwrap();
    assert!(task.id.starts_with("vid_"));

    // Poll: the provider reports progress.
    w.provider.push_status(Ok(mediagen_core::TaskSnapshot {
        provider_task_id: Some("p-600".to_string()),
        status: GenerationStatus::Processing,
        raw_status: Some("running".to_string()),
        progress: Some(55),
        ..Default::default()
    }));
    let midway = w.service.refresh_status(&task.id).await.unwrap();
    assert_eq!(midway.status, GenerationStatus::Processing);
    assert_eq!(midway.progress, Some(55));

    // Webhook: completion with thumbnail.
    let signed = w.signer.sign(&task.id);
    w.service
        .handle_callback(
            &task.id,
            &signed.timestamp.to_string(),
            &signed.signature,
            &json!({
                "task_id": "p-600",
                "status": "success",
                "results": ["https://x/glacier.mp4"],
                "thumbnail_url": "https://x/glacier.jpg",
                "progress": 100,
            }),
        )
        .await
        .unwrap();

    let done = w.store.get_task(&task.id).await.unwrap().unwrap();
    assert_eq!(done.status, GenerationStatus::Completed);
    assert_eq!(done.result_urls, vec!["https://x/glacier.mp4".to_string()]);
    assert_eq!(done.thumbnail_url.as_deref(), Some("https://x/glacier.jpg"));
    assert_eq!(done.progress, Some(100));

    // A follow-up poll is served from storage.
    let before = w.provider.status_call_count();
    w.service.refresh_status(&task.id).await.unwrap();
    assert_eq!(w.provider.status_call_count(), before);
}
