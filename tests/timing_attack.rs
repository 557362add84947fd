mod common;

use common::{engine, query_value, url, FakeTarget, Reply};
use gauntlet::element::{Element, Page};
use gauntlet::payload::{AuditOptions, Format};
use gauntlet::validation::timing::TimingOptions;
use regex::Regex;
use std::time::Duration;

fn timing() -> TimingOptions {
    TimingOptions {
        delay_ms: 3_000,
        ..TimingOptions::default()
    }
}

fn page() -> Page {
    let link = url("http://example.com/item?id=1&sort=asc");
    Page::new(link.clone(), vec![Element::link(&link)])
}

fn templates() -> Vec<String> {
    vec!["sleep(__TIME__)".to_string()]
}

fn straight() -> AuditOptions {
    AuditOptions::default().with_format([Format::STRAIGHT])
}

#[tokio::test]
async fn test_uniformly_slow_target_is_not_reported() {
    let target = FakeTarget::new(|_| Reply::ok("ok").after(3_000));
    let engine = engine(target.clone());

    let found = engine
        .timing_attack_audit(&page(), &templates(), &straight(), &timing())
        .await
        .unwrap();

    assert!(found.is_empty());
    // two phase one requests plus one control per candidate, no verification
    assert_eq!(target.request_count(), 4);
}

#[tokio::test]
async fn test_payload_driven_delay_on_one_input_is_confirmed() {
    let sleep = Regex::new(r"^sleep\((\d+(?:\.\d+)?)\)$").unwrap();
    let target = FakeTarget::new(move |req| {
        let delay = query_value(req, "id")
            .and_then(|v| sleep.captures(&v).and_then(|c| c[1].parse::<f64>().ok()))
            .unwrap_or(0.0);
        Reply::ok("ok").after(20 + (delay * 1000.0) as u128)
    });
    let engine = engine(target.clone());

    let found = engine
        .timing_attack_audit(&page(), &templates(), &straight(), &timing())
        .await
        .unwrap();

    assert_eq!(found.len(), 1);
    let m = &found[0];
    assert_eq!(m.mutation.affected_input_name(), "id");
    assert_eq!(m.template, "sleep(__TIME__)");
    assert_eq!(m.control_ms, 20);
    assert_eq!(m.verification_delay_ms, 6_000);
    assert_eq!(m.verification.samples, vec![6_020]);

    let seeds: Vec<String> = target
        .requests()
        .iter()
        .filter_map(|r| query_value(r, "id"))
        .collect();
    assert!(seeds.contains(&"sleep(0)".to_string()));
}

#[tokio::test]
async fn test_failed_verification_is_discarded() {
    // only the first slow request is slow: jitter, not injection
    let slow_once = std::sync::atomic::AtomicBool::new(true);
    let target = FakeTarget::new(move |req| {
        let injected = query_value(req, "id").map_or(false, |v| v == "sleep(3)");
        if injected && slow_once.swap(false, std::sync::atomic::Ordering::SeqCst) {
            Reply::ok("ok").after(3_500)
        } else {
            Reply::ok("ok").after(20)
        }
    });
    let engine = engine(target.clone());

    let found = engine
        .timing_attack_audit(&page(), &templates(), &straight(), &timing())
        .await
        .unwrap();

    assert!(found.is_empty());
    // phase one, control, one verification
    assert_eq!(target.request_count(), 4);
}

#[tokio::test]
async fn test_timeout_counts_as_delay() {
    let target = FakeTarget::sleepy(20);
    let engine = engine(target);
    let options = TimingOptions {
        delay_ms: 3_000,
        timeout_padding_ms: 0,
        ..TimingOptions::default()
    };

    let found = engine
        .timing_attack_audit(&page(), &templates(), &straight(), &options)
        .await
        .unwrap();

    // the fake answers sleep(3) after 3020ms, past the 3000ms timeout
    assert_eq!(found.len(), 2);
    assert!(found.iter().all(|m| m.response.timed_out()));
}

#[tokio::test]
async fn test_template_without_placeholder_is_rejected() {
    let target = FakeTarget::static_page("ok");
    let engine = engine(target.clone());

    let err = engine
        .timing_attack_audit(&page(), &["sleep(5)".to_string()], &straight(), &timing())
        .await
        .unwrap_err();

    assert!(err.is_configuration());
    assert_eq!(target.request_count(), 0);
}

fn one_input_page() -> Page {
    let link = url("http://example.com/item?id=1");
    Page::new(link.clone(), vec![Element::link(&link)])
}

#[tokio::test]
async fn test_verification_escalates_and_every_retry_must_be_slow() {
    let target = FakeTarget::sleepy(20);
    let engine = engine(target.clone());
    let options = TimingOptions {
        delay_ms: 3_000,
        escalation: 2,
        verification_retries: 2,
        ..TimingOptions::default()
    };

    let found = engine
        .timing_attack_audit(&one_input_page(), &templates(), &straight(), &options)
        .await
        .unwrap();

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].verification_delay_ms, 6_000);
    assert_eq!(found[0].verification.samples, vec![6_020, 6_020]);

    let seeds: Vec<String> = target
        .requests()
        .iter()
        .filter_map(|r| query_value(r, "id"))
        .collect();
    assert_eq!(seeds, vec!["sleep(3)", "sleep(0)", "sleep(6)", "sleep(6)"]);
}

#[tokio::test]
async fn test_one_fast_retry_discards_the_candidate() {
    let retries = std::sync::atomic::AtomicUsize::new(0);
    let target = FakeTarget::new(move |req| match query_value(req, "id").as_deref() {
        Some("sleep(3)") => Reply::ok("ok").after(3_020),
        Some("sleep(6)") => {
            if retries.fetch_add(1, std::sync::atomic::Ordering::SeqCst) == 0 {
                Reply::ok("ok").after(6_020)
            } else {
                Reply::ok("ok").after(20)
            }
        }
        _ => Reply::ok("ok").after(20),
    });
    let engine = engine(target.clone());
    let options = TimingOptions {
        delay_ms: 3_000,
        escalation: 2,
        verification_retries: 2,
        ..TimingOptions::default()
    };

    let found = engine
        .timing_attack_audit(&one_input_page(), &templates(), &straight(), &options)
        .await
        .unwrap();

    assert!(found.is_empty());
    assert_eq!(target.request_count(), 4);
}

#[tokio::test]
async fn test_unanswered_control_is_abandoned_at_the_barrier() {
    let target = FakeTarget::new(|req| match query_value(req, "id").as_deref() {
        Some("sleep(0)") => Reply::hang(),
        Some("sleep(3)") => Reply::ok("ok").after(3_020),
        _ => Reply::ok("ok").after(20),
    });
    let engine = engine(target.clone());
    let options = TimingOptions {
        delay_ms: 3_000,
        barrier_timeout_ms: 200,
        ..TimingOptions::default()
    };

    let found = tokio::time::timeout(
        Duration::from_secs(5),
        engine.timing_attack_audit(&one_input_page(), &templates(), &straight(), &options),
    )
    .await
    .unwrap()
    .unwrap();

    assert!(found.is_empty());
    // phase one, then the control that never came back
    assert_eq!(target.request_count(), 2);
}
