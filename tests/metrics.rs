// tests/metrics.rs
//
// Own test binary: the Prometheus recorder is process-global and installed once here.

use std::sync::Arc;

use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use cirrhosis_risk::auth::LocalAuthProvider;
use cirrhosis_risk::config::AppConfig;
use cirrhosis_risk::metrics::Metrics;
use cirrhosis_risk::scoring::FixedRandom;
use cirrhosis_risk::store::MemoryStore;
use cirrhosis_risk::{RiskEngine, Service};

#[tokio::test]
async fn metrics_endpoint_exposes_prediction_and_persistence_series() {
    let metrics = Metrics::init(0).expect("install recorder");
    let cfg = AppConfig {
        latency_ms: 0,
        ..AppConfig::default()
    };
    let service = Service::with_parts(
        &cfg,
        Arc::new(LocalAuthProvider::with_identity("metrics-user")),
        Arc::new(MemoryStore::new()),
        RiskEngine::new(Box::new(FixedRandom(0.5))),
    );
    service.session().wait_ready().await;
    let app = service.router(Some(&metrics));

    let payload = r#"{"age":60,"gender":"female","albumin":3.0,"alkalinePhosphatase":200,"alt":50,"ast":30,"bilirubin":1.5}"#;
    let r = app
        .clone()
        .oneshot(
            Request::post("/predict")
                .header("content-type", "application/json")
                .body(Body::from(payload))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(r.status(), StatusCode::OK);

    let m = app
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(m.status(), StatusCode::OK);
    // axum::body::to_bytes requires an explicit limit
    let body = body::to_bytes(m.into_body(), 1_048_576).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();

    for needle in [
        "predictions_total",
        "diagnosis=\"high\"",
        "persistence_outcomes_total",
        "outcome=\"saved\"",
        "prediction_latency_ms",
    ] {
        assert!(
            text.contains(needle),
            "metrics exposition missing '{needle}'\n{text}"
        );
    }

    service.shutdown().await;
}
