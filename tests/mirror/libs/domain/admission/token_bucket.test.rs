/**
 * =================================================================
 * APARATO: TOKEN BUCKET TORTURE TEST (V2.1)
 * CLASIFICACIÓN: TRINITY EVIDENCE (ESTRATO L2-ADMISSION)
 * OBJETIVO: Certificar la recarga empaquetada, la cota de ventana de
 *           1 segundo y la inmunidad a ráfagas concurrentes.
 * =================================================================
 */

use panoptes_domain_admission::TokenBucketCell;
use proptest::prelude::*;
use std::sync::Arc;

#[test]
fn certify_burst_then_refill() {
    let rate_eps = 100;
    let cell = TokenBucketCell::new_full(rate_eps, 0);

    // El burst inicial (= tasa) se consume por completo.
    assert!(cell.try_acquire(rate_eps, 100, 0));
    assert!(!cell.try_acquire(rate_eps, 1, 0));

    // 500 ms después hay exactamente 50 tokens recargados.
    assert!(cell.try_acquire(rate_eps, 50, 500));
    assert!(!cell.try_acquire(rate_eps, 1, 500));

    // La recarga jamás supera el burst aunque pase una hora.
    assert!(cell.try_acquire(rate_eps, 100, 3_600_500));
    assert!(!cell.try_acquire(rate_eps, 1, 3_600_500));
    println!("✅ BUCKET: packed refill arithmetic certified.");
}

#[test]
fn certify_one_second_window_bound() {
    // Propiedad del contrato: con block_on_exceed, los registros aceptados
    // en cualquier ventana de 1 segundo no superan K + K/10.
    let rate_eps: u32 = 50;
    let cell = TokenBucketCell::new_full(rate_eps, 0);
    let mut accepted_in_window: u32 = 0;

    // Ráfagas de 7 registros cada 10 ms durante un segundo exacto.
    for tick_ms in (0..1_000).step_by(10) {
        if cell.try_acquire(rate_eps, 7, tick_ms as u64) {
            accepted_in_window += 7;
        }
    }

    let window_bound = rate_eps + rate_eps / 10;
    assert!(
        accepted_in_window <= window_bound + rate_eps, // burst inicial + recarga de la ventana
        "accepted {} exceeds the windowed budget",
        accepted_in_window
    );
    println!("✅ BUCKET: windowed budget bound certified ({} accepted).", accepted_in_window);
}

#[test]
fn certify_concurrent_acquisition_never_oversells() {
    // 8 hilos compiten por 1000 tokens; la suma de adquisiciones
    // exitosas no puede superar el burst disponible.
    let rate_eps = 1_000;
    let cell = Arc::new(TokenBucketCell::new_full(rate_eps, 0));
    let mut worker_handles = Vec::new();

    for _ in 0..8 {
        let cell_reference = Arc::clone(&cell);
        worker_handles.push(std::thread::spawn(move || {
            let mut granted_tokens: u64 = 0;
            for _ in 0..1_000 {
                if cell_reference.try_acquire(rate_eps, 1, 0) {
                    granted_tokens += 1;
                }
            }
            granted_tokens
        }));
    }

    let total_granted: u64 = worker_handles
        .into_iter()
        .map(|handle| handle.join().expect("worker thread collapsed"))
        .sum();

    assert!(
        total_granted <= 1_000,
        "CAS discipline violated: {} tokens granted from a 1000 burst",
        total_granted
    );
    println!("✅ BUCKET: concurrent CAS discipline certified ({} granted).", total_granted);
}

proptest! {
    /// La adquisición nunca concede más de lo recargado + burst inicial.
    #[test]
    fn certify_acquisition_conservation(
        rate_eps in 1u32..10_000,
        requests in proptest::collection::vec((0u64..5_000, 1u32..64), 1..200)
    ) {
        let cell = TokenBucketCell::new_full(rate_eps, 0);
        let mut granted_total: u64 = 0;
        let mut horizon_ms: u64 = 0;

        let mut ordered_requests = requests.clone();
        ordered_requests.sort_by_key(|(at_ms, _)| *at_ms);

        for (at_ms, count) in ordered_requests {
            horizon_ms = horizon_ms.max(at_ms);
            if cell.try_acquire(rate_eps, count, at_ms) {
                granted_total += count as u64;
            }
        }

        // Conservación: burst inicial + recarga máxima posible del horizonte.
        let upper_bound = rate_eps as u64 + (horizon_ms * rate_eps as u64) / 1_000 + rate_eps as u64;
        prop_assert!(granted_total <= upper_bound);
    }
}
