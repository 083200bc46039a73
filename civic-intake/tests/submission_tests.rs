//! Submission pipeline behaviour with in-memory collaborators

mod helpers;

use civic_common::generation::{CohereClient, GenerationSettings};
use civic_common::models::{Category, Priority, SENTIMENT_PLACEHOLDER};
use civic_intake::services::{
    EnrichmentError, ImageUpload, PipelineSettings, SubmissionError, SubmissionPipeline,
};
use helpers::*;
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn image(name: &str) -> ImageUpload {
    ImageUpload {
        file_name: name.to_string(),
        content_type: Some("image/jpeg".to_string()),
        bytes: vec![0xFF, 0xD8, 0xFF],
    }
}

#[tokio::test]
async fn test_unique_submission_is_stored_with_enrichment() {
    let h = Harness::new();
    let session = citizen();

    let record = h
        .pipeline
        .submit(Some(&session), &valid_form(), vec![])
        .await
        .expect("submission succeeds");

    assert_eq!(h.store.inserts(), 1);
    assert!(!record.summary.is_empty());
    assert_eq!(record.embedding.as_ref().map(Vec::len), Some(EMBEDDING_DIMENSIONS));
    assert_eq!(record.tags, vec!["#streetlight", "#safety", "#LakeRoad"]);
    assert_eq!(record.sentiment, SENTIMENT_PLACEHOLDER);
    assert_eq!(record.citizen_id, "citizen-1");
    assert_eq!(record.category, Category::Light);
    assert_eq!(record.priority, Priority::Medium);
    assert_eq!(
        record.location_url.as_deref(),
        Some("https://www.google.com/maps?q=12.9716,77.5946")
    );
}

#[tokio::test]
async fn test_short_description_makes_no_external_calls() {
    let h = Harness::new();
    let mut form = valid_form();
    form.description = "x".repeat(249);

    let err = h
        .pipeline
        .submit(Some(&citizen()), &form, vec![image("a.jpg")])
        .await
        .unwrap_err();

    match err {
        SubmissionError::Validation(e) => assert_eq!(e.field, "description"),
        other => panic!("expected validation error, got {other:?}"),
    }
    assert_eq!(h.generator.calls(), 0);
    assert!(h.blobs.uploaded().is_empty());
    assert_eq!(h.store.list_calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.store.inserts(), 0);
}

#[tokio::test]
async fn test_invalid_location_rejected_before_upload() {
    let h = Harness::new();
    let mut form = valid_form();
    form.location_url = Some("https://maps.example.com/?q=1,2".to_string());

    let err = h
        .pipeline
        .submit(Some(&citizen()), &form, vec![image("a.jpg")])
        .await
        .unwrap_err();

    assert!(matches!(err, SubmissionError::Validation(ref e) if e.field == "location_url"));
    assert!(h.blobs.uploaded().is_empty());
}

#[tokio::test]
async fn test_missing_session_is_not_authenticated() {
    let h = Harness::new();
    let err = h.pipeline.submit(None, &valid_form(), vec![]).await.unwrap_err();
    assert!(matches!(err, SubmissionError::NotAuthenticated));
    assert_eq!(h.generator.calls(), 0);
}

#[tokio::test]
async fn test_authority_cannot_submit() {
    let h = Harness::new();
    let err = h
        .pipeline
        .submit(Some(&authority()), &valid_form(), vec![])
        .await
        .unwrap_err();
    assert!(matches!(err, SubmissionError::Forbidden(_)));
    assert_eq!(h.store.inserts(), 0);
}

#[tokio::test]
async fn test_identical_embedding_is_blocked_as_duplicate() {
    let h = Harness::new();
    let original = h.store.seed(Some(unit_embedding(0)));

    let err = h
        .pipeline
        .submit(Some(&citizen()), &valid_form(), vec![])
        .await
        .unwrap_err();

    match err {
        SubmissionError::Duplicate { issue_id, similarity } => {
            assert_eq!(issue_id, original);
            assert!(similarity > 0.9);
        }
        other => panic!("expected duplicate, got {other:?}"),
    }
    assert_eq!(h.store.inserts(), 0);
    assert!(h.notifier.sent().is_empty());
}

#[tokio::test]
async fn test_second_identical_submission_is_blocked() {
    let h = Harness::new();
    let session = citizen();

    h.pipeline
        .submit(Some(&session), &valid_form(), vec![])
        .await
        .expect("first submission stored");
    let err = h
        .pipeline
        .submit(Some(&session), &valid_form(), vec![])
        .await
        .unwrap_err();

    assert!(matches!(err, SubmissionError::Duplicate { .. }));
    assert_eq!(h.store.records().len(), 1);
}

#[tokio::test]
async fn test_dissimilar_population_is_not_duplicate() {
    let h = Harness::new();
    h.store.seed(Some(unit_embedding(1)));
    h.store.seed(None);
    h.store.seed(Some(vec![0.0; EMBEDDING_DIMENSIONS]));
    h.store.seed(Some(vec![1.0, 0.0]));

    h.pipeline
        .submit(Some(&citizen()), &valid_form(), vec![])
        .await
        .expect("no candidate is similar");
    assert_eq!(h.store.inserts(), 1);
}

#[tokio::test]
async fn test_population_fetch_failure_still_persists() {
    let h = Harness::new();
    h.store.seed(Some(unit_embedding(0)));
    h.store.fail_list.store(true, Ordering::SeqCst);

    h.pipeline
        .submit(Some(&citizen()), &valid_form(), vec![])
        .await
        .expect("screening failure is not fatal");
    assert_eq!(h.store.inserts(), 1);
}

#[tokio::test]
async fn test_each_enrichment_failure_aborts_before_insert() {
    for stage in ["summarize", "embed", "generate"] {
        let h = Harness::new();
        let flag = match stage {
            "summarize" => &h.generator.fail_summarize,
            "embed" => &h.generator.fail_embed,
            _ => &h.generator.fail_generate,
        };
        flag.store(true, Ordering::SeqCst);

        let err = h
            .pipeline
            .submit(Some(&citizen()), &valid_form(), vec![])
            .await
            .unwrap_err();

        assert!(
            matches!(err, SubmissionError::Enrichment(EnrichmentError::Remote { .. })),
            "{stage}: {err:?}"
        );
        assert_eq!(h.store.list_calls.load(Ordering::SeqCst), 0, "{stage}");
        assert_eq!(h.store.inserts(), 0, "{stage}");
    }
}

#[tokio::test]
async fn test_missing_summary_aborts() {
    let h = Harness::new();
    *h.generator.summary.lock().unwrap() = None;

    let err = h
        .pipeline
        .submit(Some(&citizen()), &valid_form(), vec![])
        .await
        .unwrap_err();
    assert!(matches!(err, SubmissionError::Enrichment(EnrichmentError::MissingSummary)));
    assert_eq!(h.store.inserts(), 0);
}

#[tokio::test]
async fn test_generation_without_hashtags_gives_empty_tags() {
    let h = Harness::new();
    *h.generator.generation.lock().unwrap() = Some("streetlight, safety".into());

    let record = h
        .pipeline
        .submit(Some(&citizen()), &valid_form(), vec![])
        .await
        .unwrap();
    assert!(record.tags.is_empty());
}

#[tokio::test]
async fn test_images_uploaded_under_citizen_prefix() {
    let h = Harness::new();

    let record = h
        .pipeline
        .submit(Some(&citizen()), &valid_form(), vec![image("front.jpg"), image("side.jpg")])
        .await
        .unwrap();

    let paths = h.blobs.uploaded();
    assert_eq!(paths.len(), 2);
    assert!(paths.iter().all(|p| p.starts_with("citizen-1/")));
    assert!(paths.iter().any(|p| p.ends_with("_0_front.jpg")));
    assert!(paths.iter().any(|p| p.ends_with("_1_side.jpg")));
    assert_eq!(record.images.len(), 2);
    assert!(record.images[0].starts_with("https://blobs.test/issue-images/citizen-1/"));
    assert!(record.images[0].ends_with("_0_front.jpg"));
}

#[tokio::test]
async fn test_too_many_images_rejected() {
    let h = Harness::new();
    let images = (0..4).map(|i| image(&format!("{i}.jpg"))).collect();

    let err = h
        .pipeline
        .submit(Some(&citizen()), &valid_form(), images)
        .await
        .unwrap_err();
    assert!(matches!(err, SubmissionError::Validation(ref e) if e.field == "images"));
    assert!(h.blobs.uploaded().is_empty());
}

#[tokio::test]
async fn test_one_failed_upload_fails_the_set() {
    let h = Harness::with_blobs(FakeBlobStore::failing_on("_1_"));

    let err = h
        .pipeline
        .submit(Some(&citizen()), &valid_form(), vec![image("a.jpg"), image("b.jpg")])
        .await
        .unwrap_err();

    match err {
        SubmissionError::Upload { orphaned, .. } => {
            assert_eq!(orphaned.len(), 1);
            assert!(orphaned[0].ends_with("_0_a.jpg"));
        }
        other => panic!("expected upload error, got {other:?}"),
    }
    assert_eq!(h.generator.calls(), 0);
    assert_eq!(h.store.inserts(), 0);
}

#[tokio::test]
async fn test_storage_failure_reported() {
    let h = Harness::new();
    h.store.fail_insert.store(true, Ordering::SeqCst);

    let err = h
        .pipeline
        .submit(Some(&citizen()), &valid_form(), vec![])
        .await
        .unwrap_err();
    assert!(matches!(err, SubmissionError::Storage(_)));
    assert!(h.store.records().is_empty());
    assert!(h.notifier.sent().is_empty());
}

#[tokio::test]
async fn test_confirmation_sent_to_submitter() {
    let h = Harness::new();

    let record = h
        .pipeline
        .submit(Some(&citizen()), &valid_form(), vec![])
        .await
        .unwrap();

    h.notifier.wait_for_attempts(1).await;
    let sent = h.notifier.sent();
    assert_eq!(sent.len(), 1);
    let (template, variables, recipient) = &sent[0];
    assert_eq!(template, "issue_submitted");
    assert_eq!(recipient, "asha@example.org");
    assert_eq!(variables["issue_id"], record.id.to_string());
    assert_eq!(variables["title"], "Streetlight out");
}

#[tokio::test]
async fn test_notification_failure_does_not_fail_submission() {
    let h = Harness::new();
    h.notifier.fail.store(true, Ordering::SeqCst);

    h.pipeline
        .submit(Some(&citizen()), &valid_form(), vec![])
        .await
        .expect("notification is best-effort");
    assert_eq!(h.store.inserts(), 1);

    h.notifier.wait_for_attempts(1).await;
    assert!(h.notifier.sent().is_empty());
}

#[tokio::test]
async fn test_no_email_skips_confirmation() {
    let h = Harness::new();
    let mut session = citizen();
    session.email = None;

    h.pipeline
        .submit(Some(&session), &valid_form(), vec![])
        .await
        .unwrap();
    h.notifier.settle().await;
    assert_eq!(h.notifier.attempts(), 0);
}

#[tokio::test]
async fn test_other_category_stores_custom_value() {
    let h = Harness::new();
    let mut form = valid_form();
    form.category = "other".to_string();
    form.custom_category = Some("Fallen tree".to_string());

    let record = h.pipeline.submit(Some(&citizen()), &form, vec![]).await.unwrap();
    assert_eq!(record.category, Category::Custom("Fallen tree".to_string()));
}

#[tokio::test]
async fn test_tag_response_without_generations_aborts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/summarize"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"summary": "Streetlight out."})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"embeddings": [[1.0, 0.0]]})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "internal"})))
        .mount(&server)
        .await;

    let mut generation = GenerationSettings::new("test-key");
    generation.base_url = server.uri();
    let store = InMemoryStore::new();
    let pipeline = SubmissionPipeline::new(
        store.clone(),
        Arc::new(CohereClient::new(generation).unwrap()),
        FakeBlobStore::new(),
        RecordingNotifier::new(),
        PipelineSettings::default(),
    );

    let err = pipeline
        .submit(Some(&citizen()), &valid_form(), vec![])
        .await
        .unwrap_err();

    assert!(
        matches!(
            err,
            SubmissionError::Enrichment(EnrichmentError::Remote { operation: "extract_tags", .. })
        ),
        "{err:?}"
    );
    assert_eq!(store.inserts(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_slow_confirmation_does_not_delay_submission() {
    let h = Harness::new();
    *h.notifier.delay.lock().unwrap() = Some(Duration::from_secs(3));
    h.notifier.fail.store(true, Ordering::SeqCst);

    let started = tokio::time::Instant::now();
    h.pipeline
        .submit(Some(&citizen()), &valid_form(), vec![])
        .await
        .expect("stored before the confirmation completes");

    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(h.store.inserts(), 1);
    assert_eq!(h.notifier.attempts(), 0);

    h.notifier.wait_for_attempts(1).await;
}

#[tokio::test(start_paused = true)]
async fn test_hanging_upload_times_out() {
    let h = Harness::new();
    h.blobs.hang.store(true, Ordering::SeqCst);

    let err = h
        .pipeline
        .submit(Some(&citizen()), &valid_form(), vec![image("a.jpg")])
        .await
        .unwrap_err();

    match err {
        SubmissionError::Upload { message, orphaned } => {
            assert!(message.contains("timed out"), "{message}");
            assert!(orphaned.is_empty());
        }
        other => panic!("expected upload error, got {other:?}"),
    }
    assert_eq!(h.generator.calls(), 0);
    assert_eq!(h.store.inserts(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_hanging_duplicate_fetch_still_persists() {
    let h = Harness::new();
    h.store.seed(Some(unit_embedding(0)));
    h.store.hang_list.store(true, Ordering::SeqCst);

    h.pipeline
        .submit(Some(&citizen()), &valid_form(), vec![])
        .await
        .expect("screening timeout is not fatal");

    assert_eq!(h.store.list_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.store.inserts(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_hanging_insert_reports_storage_error() {
    let h = Harness::new();
    h.store.hang_insert.store(true, Ordering::SeqCst);

    let err = h
        .pipeline
        .submit(Some(&citizen()), &valid_form(), vec![])
        .await
        .unwrap_err();

    match err {
        SubmissionError::Storage(message) => assert!(message.contains("timed out"), "{message}"),
        other => panic!("expected storage error, got {other:?}"),
    }
    h.notifier.settle().await;
    assert_eq!(h.notifier.attempts(), 0);
}
