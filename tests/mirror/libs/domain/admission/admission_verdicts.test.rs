/**
 * =================================================================
 * APARATO: ADMISSION VERDICT INTEGRITY TEST (V2.0)
 * CLASIFICACIÓN: TRINITY EVIDENCE (ESTRATO L2-ADMISSION)
 * OBJETIVO: Certificar los seis pasos del algoritmo y el dry-run puro.
 * =================================================================
 */

use panoptes_domain_admission::{
    evaluate_admission, probe_admission, AdmissionDecision, CompiledAllowlist, RejectReason,
    TokenBucketCell,
};
use panoptes_domain_models::{ObservedOrigin, Source, SourceKind, SourceStatus};

fn source_fixture(allowed_ips: Vec<&str>, max_eps: u32, block_on_exceed: bool) -> Source {
    Source {
        id: "s1".to_string(),
        tenant_id: "tenant-a".to_string(),
        display_name: "edge collector".to_string(),
        declared_type: SourceKind::Http,
        observed_origin: ObservedOrigin::Unknown,
        collector_label: None,
        status: SourceStatus::Enabled,
        allowed_ips: allowed_ips.into_iter().map(String::from).collect(),
        max_eps,
        block_on_exceed,
        last_seen: None,
    }
}

#[test]
fn certify_deny_by_allowlist() {
    // Escenario del contrato: allowlist 10.0.0.0/24, cliente 192.0.2.5.
    let source = source_fixture(vec!["10.0.0.0/24"], 0, false);
    let (allowlist, rejected) = CompiledAllowlist::compile(&source.allowed_ips);
    assert!(rejected.is_empty());

    let bucket = TokenBucketCell::new_full(source.max_eps, 0);
    let decision = evaluate_admission(
        &source,
        &allowlist,
        &bucket,
        "192.0.2.5".parse().unwrap(),
        10,
        0,
    );

    assert_eq!(
        decision,
        AdmissionDecision::Rejected(RejectReason::NotInAllowlist)
    );
    assert_eq!(
        RejectReason::NotInAllowlist.reason_label(),
        "blocked:not_in_allowlist"
    );
    println!("✅ ADMISSION: allowlist denial certified.");
}

#[test]
fn certify_disabled_and_empty_allowlist_verdicts() {
    let mut disabled_source = source_fixture(vec!["10.0.0.0/24"], 0, false);
    disabled_source.status = SourceStatus::Disabled;
    let (allowlist, _) = CompiledAllowlist::compile(&disabled_source.allowed_ips);
    let bucket = TokenBucketCell::new_full(0, 0);

    let verdict = evaluate_admission(
        &disabled_source,
        &allowlist,
        &bucket,
        "10.0.0.7".parse().unwrap(),
        1,
        0,
    );
    assert_eq!(verdict, AdmissionDecision::Rejected(RejectReason::Disabled));

    // Conjunto vacío => denegar todo, incluso con la fuente habilitada.
    let open_source = source_fixture(vec![], 0, false);
    let (empty_allowlist, _) = CompiledAllowlist::compile(&open_source.allowed_ips);
    let verdict = evaluate_admission(
        &open_source,
        &empty_allowlist,
        &bucket,
        "10.0.0.7".parse().unwrap(),
        1,
        0,
    );
    assert_eq!(verdict, AdmissionDecision::Rejected(RejectReason::NoAllowlist));
}

#[test]
fn certify_ipv6_allowlist_matches_ipv6_client() {
    let source = source_fixture(vec!["2001:db8:aa00::/40", "10.0.0.0/8"], 0, false);
    let (allowlist, _) = CompiledAllowlist::compile(&source.allowed_ips);
    let bucket = TokenBucketCell::new_full(0, 0);

    let verdict = evaluate_admission(
        &source,
        &allowlist,
        &bucket,
        "2001:db8:aa42::15".parse().unwrap(),
        1,
        0,
    );
    assert_eq!(verdict, AdmissionDecision::Admitted { over_cap: false });
    println!("✅ ADMISSION: IPv6 strata certified.");
}

#[test]
fn certify_longest_prefix_tiebreak() {
    let source = source_fixture(vec!["10.0.0.0/8", "10.1.0.0/16", "10.1.2.0/24"], 0, false);
    let (allowlist, _) = CompiledAllowlist::compile(&source.allowed_ips);

    let probe = probe_admission(&source, &allowlist, "10.1.2.200".parse().unwrap());
    assert!(probe.allowed);
    assert_eq!(probe.matched_cidr.as_deref(), Some("10.1.2.0/24"));
}

#[test]
fn certify_rate_limited_versus_over_cap() {
    // block_on_exceed=true: el exceso se rechaza como rate_limited.
    let blocking_source = source_fixture(vec!["0.0.0.0/0"], 10, true);
    let (allowlist, _) = CompiledAllowlist::compile(&blocking_source.allowed_ips);
    let bucket = TokenBucketCell::new_full(10, 0);

    let first_burst = evaluate_admission(
        &blocking_source,
        &allowlist,
        &bucket,
        "203.0.113.9".parse().unwrap(),
        10,
        0,
    );
    assert_eq!(first_burst, AdmissionDecision::Admitted { over_cap: false });

    let exceeding_burst = evaluate_admission(
        &blocking_source,
        &allowlist,
        &bucket,
        "203.0.113.9".parse().unwrap(),
        5,
        0,
    );
    assert_eq!(
        exceeding_burst,
        AdmissionDecision::Rejected(RejectReason::RateLimited)
    );

    // block_on_exceed=false: se admite con marca over_cap para observabilidad.
    let permissive_source = source_fixture(vec!["0.0.0.0/0"], 10, false);
    let permissive_bucket = TokenBucketCell::new_full(10, 0);
    permissive_bucket.try_acquire(10, 10, 0);

    let over_cap_verdict = evaluate_admission(
        &permissive_source,
        &allowlist,
        &permissive_bucket,
        "203.0.113.9".parse().unwrap(),
        5,
        0,
    );
    assert_eq!(over_cap_verdict, AdmissionDecision::Admitted { over_cap: true });
    println!("✅ ADMISSION: EPS verdict duality certified.");
}

#[test]
fn certify_probe_is_stateless() {
    // Dos sondeos consecutivos sobre estado de fuente inalterado
    // devuelven el mismo veredicto (ley de idempotencia del contrato).
    let source = source_fixture(vec!["10.0.0.0/24"], 5, true);
    let (allowlist, _) = CompiledAllowlist::compile(&source.allowed_ips);
    let client = "10.0.0.200".parse().unwrap();

    let first_probe = probe_admission(&source, &allowlist, client);
    let second_probe = probe_admission(&source, &allowlist, client);

    assert_eq!(first_probe.allowed, second_probe.allowed);
    assert_eq!(first_probe.reason, second_probe.reason);
    assert_eq!(first_probe.matched_cidr, second_probe.matched_cidr);
}
