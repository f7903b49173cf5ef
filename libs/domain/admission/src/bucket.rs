// [libs/domain/admission/src/bucket.rs]
/*!
 * =================================================================
 * APARATO: LOCK-FREE TOKEN BUCKET (V3.0 - PACKED WORD)
 * CLASIFICACIÓN: DOMAIN LOGIC (ESTRATO L2)
 * RESPONSABILIDAD: PRESUPUESTO EPS POR FUENTE SIN CERROJOS
 *
 * # Mathematical Proof (Packed Refill):
 * La palabra atómica empaqueta (militokens: u32, marca_ms: u32).
 * Con tasa R eps, el rellenado por milisegundo es exactamente R
 * militokens, de modo que la aritmética de recarga es entera y sin
 * deriva. El burst se fija en R tokens (R*1000 militokens).
 * =================================================================
 */

use std::sync::atomic::{AtomicU64, Ordering};

/// Militokens por token entero.
const MILLITOKENS_PER_TOKEN: u64 = 1_000;

/**
 * Celda de presupuesto por fuente.
 *
 * La marca temporal viaja truncada a u32 milisegundos; la resta con
 * wrapping tolera el desborde (~49.7 días) entre recargas consecutivas.
 */
#[derive(Debug)]
pub struct TokenBucketCell {
    packed_state: AtomicU64,
}

impl TokenBucketCell {
    /// Crea la celda con el burst completo disponible.
    pub fn new_full(rate_eps: u32, now_ms: u64) -> Self {
        let burst_millitokens = burst_for(rate_eps);
        Self {
            packed_state: AtomicU64::new(pack(burst_millitokens, now_ms as u32)),
        }
    }

    /**
     * Intenta adquirir 'requested_tokens' tokens a tasa 'rate_eps'.
     *
     * Devuelve verdadero si el presupuesto alcanzó. En caso de presupuesto
     * insuficiente la recarga observada se publica igualmente, evitando
     * marcas temporales obsoletas de crecimiento no acotado.
     */
    pub fn try_acquire(&self, rate_eps: u32, requested_tokens: u32, now_ms: u64) -> bool {
        if rate_eps == 0 {
            // Tasa cero significa sin límite en el contrato de admisión.
            return true;
        }

        let burst_millitokens = burst_for(rate_eps);
        let requested_millitokens = requested_tokens as u64 * MILLITOKENS_PER_TOKEN;
        let now_stamp = now_ms as u32;

        loop {
            let observed_word = self.packed_state.load(Ordering::Acquire);
            let (stored_millitokens, stored_stamp) = unpack(observed_word);

            let elapsed_ms = now_stamp.wrapping_sub(stored_stamp) as u64;
            let refilled_millitokens =
                (stored_millitokens as u64 + elapsed_ms * rate_eps as u64).min(burst_millitokens);

            let (next_millitokens, acquisition_granted) = if refilled_millitokens >= requested_millitokens {
                (refilled_millitokens - requested_millitokens, true)
            } else {
                (refilled_millitokens, false)
            };

            let next_word = pack(next_millitokens, now_stamp);

            if self
                .packed_state
                .compare_exchange_weak(observed_word, next_word, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return acquisition_granted;
            }
            // CAS perdido contra otra ráfaga concurrente: reintentar.
        }
    }

    /// Tokens enteros visibles sin recarga (instrumentación de pruebas).
    pub fn tokens_snapshot(&self) -> u64 {
        let (millitokens, _) = unpack(self.packed_state.load(Ordering::Acquire));
        millitokens as u64 / MILLITOKENS_PER_TOKEN
    }
}

fn burst_for(rate_eps: u32) -> u64 {
    rate_eps as u64 * MILLITOKENS_PER_TOKEN
}

fn pack(millitokens: u64, stamp_ms: u32) -> u64 {
    let clamped_millitokens = millitokens.min(u32::MAX as u64) as u64;
    (clamped_millitokens << 32) | stamp_ms as u64
}

fn unpack(word: u64) -> (u32, u32) {
    ((word >> 32) as u32, word as u32)
}
