mod common;

use common::{engine, engine_with, query_value, url, FakeTarget, Reply};
use gauntlet::core::config::ScanConfig;
use gauntlet::element::{Element, ElementKind, Page};
use gauntlet::http::Dispatcher;
use gauntlet::payload::{AuditOptions, Format, PayloadSet};
use indexmap::IndexMap;
use reqwest::Method;

fn search_page() -> Page {
    let link = url("http://example.com/search?q=shoes&page=1");
    Page::new(link.clone(), vec![Element::link(&link)])
}

fn straight() -> AuditOptions {
    AuditOptions::default().with_format([Format::STRAIGHT])
}

#[tokio::test]
async fn test_each_payload_and_input_sent_once_per_scan() {
    let target = FakeTarget::static_page("ok");
    let engine = engine(target.clone());
    let payloads = PayloadSet::new("p", ["'", "\"", "<x>"]);

    let mut callbacks = 0;
    let first = engine
        .audit(&search_page(), &payloads, &straight(), |_, _| callbacks += 1)
        .await
        .unwrap();
    assert_eq!(first.dispatched, 6);
    assert_eq!(callbacks, 6);
    assert_eq!(target.request_count(), 6);

    let second = engine
        .audit(&search_page(), &payloads, &straight(), |_, _| callbacks += 1)
        .await
        .unwrap();
    assert_eq!(second.dispatched, 0);
    assert_eq!(second.duplicate, 6);
    assert_eq!(callbacks, 6);
    assert_eq!(target.request_count(), 6);
}

#[tokio::test]
async fn test_force_bypasses_coverage() {
    let target = FakeTarget::static_page("ok");
    let engine = engine(target.clone());
    let payloads = PayloadSet::new("p", ["'"]);

    engine.audit(&search_page(), &payloads, &straight(), |_, _| {}).await.unwrap();
    let forced = AuditOptions {
        force: true,
        ..straight()
    };
    let summary = engine.audit(&search_page(), &payloads, &forced, |_, _| {}).await.unwrap();

    assert_eq!(summary.dispatched, 2);
    assert_eq!(target.request_count(), 4);
}

#[tokio::test]
async fn test_out_of_scope_elements_produce_no_traffic() {
    let target = FakeTarget::static_page("ok");
    let mut config = ScanConfig::default();
    config.scope.exclude_path_patterns.push("/admin".to_string());
    let engine = engine_with(target.clone(), config);

    let admin = url("http://example.com/admin/users?id=1");
    let page = Page::new(admin.clone(), vec![Element::link(&admin)]);
    let summary = engine
        .audit(&page, &PayloadSet::new("p", ["'", "\""]), &straight(), |_, _| {})
        .await
        .unwrap();

    assert_eq!(summary.out_of_scope, 2);
    assert_eq!(summary.dispatched, 0);
    assert_eq!(target.request_count(), 0);
}

#[tokio::test]
async fn test_timeouts_reach_the_callback() {
    let target = FakeTarget::new(|req| match query_value(req, "q").as_deref() {
        Some("slow") => Reply::timed_out(),
        _ => Reply::ok("ok"),
    });
    let engine = engine(target);

    let mut timed_out = Vec::new();
    let summary = engine
        .audit(&search_page(), &PayloadSet::new("p", ["slow", "fast"]), &straight(), |resp, m| {
            if resp.timed_out() {
                timed_out.push((m.affected_input_name().to_string(), m.seed().to_string()));
            }
        })
        .await
        .unwrap();

    assert_eq!(summary.dispatched, 4);
    assert_eq!(summary.timed_out, 1);
    assert_eq!(timed_out, vec![("q".to_string(), "slow".to_string())]);
}

#[tokio::test]
async fn test_abort_stops_new_work_and_drains() {
    let target = FakeTarget::static_page("ok");
    target.set_max_concurrency(1);
    let engine = engine(target.clone());
    let payloads = PayloadSet::new("p", ["1", "2", "3", "4", "5"]);

    let ctx = engine.context().clone();
    let mut callbacks = 0;
    let summary = engine
        .audit(&search_page(), &payloads, &straight(), |_, _| {
            callbacks += 1;
            ctx.abort();
        })
        .await
        .unwrap();

    assert!(summary.aborted);
    assert!(summary.dispatched < 10);
    assert_eq!(callbacks, summary.dispatched);
    assert_eq!(target.request_count(), summary.dispatched);

    let after = engine
        .audit(&search_page(), &PayloadSet::new("p", ["6"]), &straight(), |_, _| {})
        .await
        .unwrap();
    assert!(after.aborted);
    assert_eq!(after.dispatched, 0);
}

#[tokio::test]
async fn test_configuration_error_before_dispatch() {
    let target = FakeTarget::static_page("ok");
    let engine = engine(target.clone());

    let bad_format = AuditOptions::default().with_format([Format::STRAIGHT | Format::APPEND]);
    let err = engine
        .audit(&search_page(), &PayloadSet::new("p", ["x"]), &bad_format, |_, _| {})
        .await
        .unwrap_err();
    assert!(err.is_configuration());

    let empty = PayloadSet::new("empty", Vec::<String>::new());
    let err = engine
        .audit(&search_page(), &empty, &straight(), |_, _| {})
        .await
        .unwrap_err();
    assert!(err.is_configuration());

    assert_eq!(target.request_count(), 0);
}

#[tokio::test]
async fn test_extensively_carries_cookie_mutations() {
    let target = FakeTarget::static_page("ok");
    let engine = engine(target.clone());

    let home = url("http://example.com/");
    let link = url("http://example.com/item?id=7");
    let mut inputs = IndexMap::new();
    inputs.insert("name".to_string(), "bob".to_string());
    let page = Page::new(
        home.clone(),
        vec![
            Element::cookie(&home, "session", "abc"),
            Element::link(&link),
            Element::form(&url("http://example.com/profile"), Method::POST, inputs),
        ],
    );

    let options = AuditOptions {
        extensively: true,
        ..straight()
    }
    .with_elements([ElementKind::Cookie]);
    engine
        .audit(&page, &PayloadSet::new("p", ["<probe>"]), &options, |_, _| {})
        .await
        .unwrap();

    let carried: Vec<String> = target
        .requests()
        .iter()
        .filter(|r| r.header("cookie").map_or(false, |c| c.contains("session=")))
        .map(|r| r.url.path().to_string())
        .collect();
    assert_eq!(target.request_count(), 3);
    assert!(carried.contains(&"/".to_string()));
    assert!(carried.contains(&"/item".to_string()));
    assert!(carried.contains(&"/profile".to_string()));
}

#[tokio::test]
async fn test_identical_elements_audited_once() {
    let target = FakeTarget::static_page("ok");
    let engine = engine(target.clone());

    let link = url("http://example.com/search?q=shoes");
    let page = Page::new(link.clone(), vec![Element::link(&link), Element::link(&link)]);
    let summary = engine
        .audit(&page, &PayloadSet::new("p", ["'"]), &straight(), |_, _| {})
        .await
        .unwrap();

    assert_eq!(summary.dispatched, 1);
}
