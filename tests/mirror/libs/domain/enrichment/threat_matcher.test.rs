/**
 * =================================================================
 * APARATO: THREAT MATCHER INTEGRITY TEST (V2.1)
 * CLASIFICACIÓN: TRINITY EVIDENCE (ESTRATO L2-ENRICHMENT)
 * OBJETIVO: Certificar la carga laxa del fichero de amenazas, el orden
 *           prefijo-más-largo-primero y la recarga por swap.
 * =================================================================
 */

use panoptes_domain_enrichment::{ThreatMatcher, ThreatSnapshot};

const THREAT_FILE_FIXTURE: &str = "\
# Panoptes threat feed fixture
# CIDRs malignos conocidos

45.149.3.0/24
45.149.0.0/16

not-a-cidr-at-all
2001:db8:bad::/48

domain:malware.example.net
domain: PHISHING.example.ORG

# línea final de comentario
";

#[test]
fn certify_lenient_file_load() {
    let snapshot = ThreatSnapshot::from_lines(THREAT_FILE_FIXTURE.lines());

    // Solo las entradas válidas sobreviven: 3 CIDRs y 2 dominios.
    assert_eq!(snapshot.cidr_count(), 3);
    assert_eq!(snapshot.domain_count(), 2);
    assert_eq!(snapshot.rejected_lines, 1, "el CIDR malformado se contabiliza");
    println!("✅ THREAT: lenient load certified (3 cidrs / 2 domains / 1 rejected).");
}

#[test]
fn certify_longest_prefix_first_ordering() {
    let matcher = ThreatMatcher::new(ThreatSnapshot::from_lines(THREAT_FILE_FIXTURE.lines()));

    let matches = matcher.match_ip("45.149.3.10".parse().unwrap());
    assert_eq!(
        matches,
        vec!["45.149.3.0/24".to_string(), "45.149.0.0/16".to_string()],
        "el /24 debe preceder al /16"
    );

    // Dirección cubierta solo por el /16.
    let partial_matches = matcher.match_ip("45.149.200.1".parse().unwrap());
    assert_eq!(partial_matches, vec!["45.149.0.0/16".to_string()]);

    // Dirección limpia: vector vacío, jamás error.
    assert!(matcher.match_ip("8.8.8.8".parse().unwrap()).is_empty());

    // Familia IPv6 con trie propio.
    let v6_matches = matcher.match_ip("2001:db8:bad::77".parse().unwrap());
    assert_eq!(v6_matches, vec!["2001:db8:bad::/48".to_string()]);
}

#[test]
fn certify_domain_exact_match_with_normalization() {
    let matcher = ThreatMatcher::new(ThreatSnapshot::from_lines(THREAT_FILE_FIXTURE.lines()));

    assert_eq!(
        matcher.match_domain("MALWARE.example.NET."),
        vec!["malware.example.net".to_string()]
    );
    assert_eq!(
        matcher.match_domain("phishing.example.org"),
        vec!["phishing.example.org".to_string()]
    );
    // Subdominios no coinciden: el contrato v1 es de dominio exacto.
    assert!(matcher.match_domain("deep.malware.example.net").is_empty());
}

#[test]
fn certify_snapshot_swap_reload() {
    let matcher = ThreatMatcher::new(ThreatSnapshot::from_lines(THREAT_FILE_FIXTURE.lines()));
    assert!(!matcher.match_ip("45.149.3.10".parse().unwrap()).is_empty());

    // Recarga con un feed nuevo: los indicadores anteriores desaparecen.
    let replacement_snapshot = ThreatSnapshot::from_lines("198.51.100.0/24\n".lines());
    matcher.install(replacement_snapshot);

    assert!(matcher.match_ip("45.149.3.10".parse().unwrap()).is_empty());
    assert_eq!(
        matcher.match_ip("198.51.100.9".parse().unwrap()),
        vec!["198.51.100.0/24".to_string()]
    );

    let status = matcher.status();
    assert_eq!(status.cidr_indicators, 1);
    assert_eq!(status.domain_indicators, 0);
    println!("✅ THREAT: atomic snapshot swap certified.");
}
