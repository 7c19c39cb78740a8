use std::time::Duration;

use chrono::Utc;
use testkit::FakeUpstream;
use testkit::fixtures::{
    CHECKOUT_TRACE_ID, checkout_detail_rows, checkout_flame_rows, service_suggest_rows,
    trace_root_rows,
};
use tracelens_core::TracelensError;
use tracelens_core::config::Config;
use tracelens_core::filter::{FlameMode, GroupBy};
use tracelens_core::ids::TraceId;
use tracelens_core::query::{SuggestKind, SuggestRequest, TraceListQuery};
use tracelens_store::Store;

fn store_for(fake: &FakeUpstream) -> Store {
    let config = Config {
        ch_url: fake.url(),
        ch_database: "otel".into(),
        ch_password: Some("secret".into()),
        upstream_timeout: Duration::from_secs(5),
        ..Config::default()
    };
    Store::new(&config).unwrap()
}

#[tokio::test]
async fn flame_request_binds_parameters_and_builds_tree() -> anyhow::Result<()> {
    let fake = FakeUpstream::start().await?;
    fake.respond("otel_traces", 200, checkout_flame_rows());
    let store = store_for(&fake);

    let id = TraceId::parse(&CHECKOUT_TRACE_ID.to_uppercase())?;
    let node = store
        .flame(&id, GroupBy::ServiceOperation, FlameMode::Total)
        .await?;
    assert_eq!(node.label, "web:GET /checkout");
    assert_eq!(node.value, 1000);
    assert_eq!(node.children.len(), 2);
    assert_eq!(node.children[0].label, "cart:load cart");

    let requests = fake.requests();
    assert_eq!(requests.len(), 1);
    let sent = &requests[0];
    assert_eq!(sent.method, "POST");
    assert_eq!(sent.query_param("database"), Some("otel"));
    assert_eq!(sent.query_param("param_db"), Some("otel"));
    assert_eq!(sent.query_param("param_trace_id"), Some(CHECKOUT_TRACE_ID));
    assert_eq!(sent.query_param("default_format"), Some("JSONEachRow"));
    assert!(!sent.body.contains(CHECKOUT_TRACE_ID));
    assert!(sent.authorization.as_deref().is_some_and(|a| a.starts_with("Basic ")));
    Ok(())
}

#[tokio::test]
async fn self_mode_and_empty_trace() -> anyhow::Result<()> {
    let fake = FakeUpstream::start().await?;
    fake.respond("otel_traces", 200, checkout_flame_rows());
    let store = store_for(&fake);
    let id = TraceId::parse(CHECKOUT_TRACE_ID)?;

    let node = store.flame(&id, GroupBy::Service, FlameMode::SelfTime).await?;
    assert_eq!(node.label, "web");
    assert_eq!(node.value, 500);

    let empty = FakeUpstream::start().await?;
    let node = store_for(&empty)
        .flame(&id, GroupBy::Service, FlameMode::Total)
        .await?;
    assert_eq!(node.label, format!("trace:{CHECKOUT_TRACE_ID}"));
    assert_eq!(node.value, 0);
    assert!(node.children.is_empty());
    Ok(())
}

#[tokio::test]
async fn malformed_rows_are_skipped() -> anyhow::Result<()> {
    let fake = FakeUpstream::start().await?;
    let body = format!("{}{{broken\n{{\"SpanId\":\"x\"}}\n", checkout_flame_rows());
    fake.respond("otel_traces", 200, body);
    let store = store_for(&fake);

    let node = store
        .flame(&TraceId::parse("t")?, GroupBy::Service, FlameMode::Total)
        .await?;
    assert_eq!(node.node_count(), 3);
    Ok(())
}

#[tokio::test]
async fn upstream_failure_carries_status_and_body() -> anyhow::Result<()> {
    let fake = FakeUpstream::start().await?;
    fake.respond("otel_traces", 500, "Code: 60. DB::Exception: Table does not exist");
    let store = store_for(&fake);

    let err = store
        .flame(&TraceId::parse("t")?, GroupBy::Service, FlameMode::Total)
        .await
        .unwrap_err();
    match err {
        TracelensError::UpstreamStatus { status, body, .. } => {
            assert_eq!(status, 500);
            assert!(body.contains("Table does not exist"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn unreachable_store_is_reported() -> anyhow::Result<()> {
    let fake = FakeUpstream::start().await?;
    let store = store_for(&fake);
    drop(fake);
    tokio::time::sleep(Duration::from_millis(50)).await;

    let err = store.ping().await.unwrap_err();
    assert!(err.is_upstream());
    Ok(())
}

#[tokio::test]
async fn trace_detail_is_sorted_and_stringified() -> anyhow::Result<()> {
    let fake = FakeUpstream::start().await?;
    fake.respond("otel_traces", 200, checkout_detail_rows());
    let store = store_for(&fake);

    let detail = store.get_trace(&TraceId::parse(CHECKOUT_TRACE_ID)?).await?;
    assert_eq!(detail.trace_id, CHECKOUT_TRACE_ID);
    let ids = detail.spans.iter().map(|s| s.span_id.as_str()).collect::<Vec<_>>();
    assert_eq!(ids, ["a1", "c3"]);
    assert_eq!(detail.spans[0].parent_span_id, "");
    assert_eq!(detail.spans[1].attributes["http.status_code"], "502");
    assert_eq!(detail.spans[1].attributes["retry"], "true");
    Ok(())
}

#[tokio::test]
async fn list_and_suggest() -> anyhow::Result<()> {
    let fake = FakeUpstream::start().await?;
    fake.respond("trace_roots", 200, trace_root_rows());
    fake.respond("service_suggest", 200, service_suggest_rows());
    let store = store_for(&fake);

    let query: TraceListQuery =
        serde_json::from_str(r#"{"from": 1, "to": 2, "filters": {"service": ["o'brien"]}}"#)?;
    let list = store.list_traces(&query.resolve(Utc::now())?).await?;
    assert_eq!(list.items.len(), 2);
    assert_eq!(list.items[1].svc_breakdown[0].0, "payments");
    let sent = &fake.requests_to("/")[0];
    assert!(sent.body.contains("RootService IN ('o''brien')"));

    let items = store
        .suggest(&SuggestRequest {
            kind: SuggestKind::Services,
            q: "c".into(),
        })
        .await?;
    assert_eq!(items[0].value, "cart");
    assert_eq!(items[0].count, 300);
    assert_eq!(items[1].value, "checkout");
    Ok(())
}
