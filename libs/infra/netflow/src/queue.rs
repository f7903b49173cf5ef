// [libs/infra/netflow/src/queue.rs]
/*!
 * =================================================================
 * APARATO: BOUNDED FLOW QUEUE (V3.0 - POLICY GOVERNED)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: BÚFER INTRA-PROCESO ENTRE LECTOR UDP Y MAPPER
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. SINGLE QUEUE: Una sola cola acotada en proceso sustituye al par
 *    de procesos unidos por named pipe del diseño heredado.
 * 2. POLICY TRIAD: Desborde gobernado por {drop-newest, drop-oldest,
 *    block}; cada descarte retorna su veredicto para los contadores.
 * 3. FIFO GLOBAL: drop-oldest desaloja la cabeza global; no se preserva
 *    sub-orden por emisor.
 * =================================================================
 */

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::sync::Notify;

/// Política de desborde de la cola del cabezal UDP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Descarta el registro entrante (política por defecto).
    DropNewest,
    /// Desaloja la cabeza de la cola y almacena el entrante.
    DropOldest,
    /// El productor espera capacidad (solo vía 'push_waiting').
    Block,
}

impl OverflowPolicy {
    /// Interpreta la variable de entorno UDP_QUEUE_POLICY.
    pub fn parse(raw_policy: &str) -> Self {
        match raw_policy.trim().to_ascii_lowercase().as_str() {
            "drop-oldest" | "drop_oldest" => OverflowPolicy::DropOldest,
            "block" => OverflowPolicy::Block,
            _ => OverflowPolicy::DropNewest,
        }
    }
}

/// Veredicto de una inserción en la cola.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Stored,
    /// El registro entrante fue descartado (drop-newest).
    DroppedNewest,
    /// La cabeza fue desalojada para almacenar el entrante (drop-oldest).
    DroppedOldest,
}

impl PushOutcome {
    pub fn dropped_one(&self) -> bool {
        !matches!(self, PushOutcome::Stored)
    }
}

/**
 * Cola acotada multi-consumidor con notificación cooperativa.
 *
 * El cerrojo interno protege únicamente la VecDeque; los productores y
 * consumidores se coordinan con 'Notify' sin retener el cerrojo en await.
 */
#[derive(Debug)]
pub struct BoundedQueue<T> {
    capacity: usize,
    policy: OverflowPolicy,
    buffer: Mutex<VecDeque<T>>,
    items_available: Notify,
    space_available: Notify,
    closed: AtomicBool,
}

impl<T> BoundedQueue<T> {
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        Self {
            capacity: capacity.max(1),
            policy,
            buffer: Mutex::new(VecDeque::with_capacity(capacity.max(1).min(16_384))),
            items_available: Notify::new(),
            space_available: Notify::new(),
            closed: AtomicBool::new(false),
        }
    }

    /**
     * Inserción no bloqueante; aplica la política de desborde.
     * Con política 'block' degrada a drop-newest: el camino bloqueante
     * es 'push_waiting'.
     */
    pub fn push(&self, item: T) -> PushOutcome {
        let mut buffer_guard = self.buffer.lock().expect("FATAL: flow queue lock poisoned.");

        if buffer_guard.len() < self.capacity {
            buffer_guard.push_back(item);
            drop(buffer_guard);
            self.items_available.notify_one();
            return PushOutcome::Stored;
        }

        match self.policy {
            OverflowPolicy::DropOldest => {
                buffer_guard.pop_front();
                buffer_guard.push_back(item);
                drop(buffer_guard);
                self.items_available.notify_one();
                PushOutcome::DroppedOldest
            }
            _ => PushOutcome::DroppedNewest,
        }
    }

    /**
     * Inserción que respeta la política 'block' esperando capacidad.
     * Para las políticas de descarte es equivalente a 'push'.
     */
    pub async fn push_waiting(&self, item: T) -> PushOutcome {
        let mut pending_item = item;

        loop {
            {
                let mut buffer_guard =
                    self.buffer.lock().expect("FATAL: flow queue lock poisoned.");

                if buffer_guard.len() < self.capacity {
                    buffer_guard.push_back(pending_item);
                    drop(buffer_guard);
                    self.items_available.notify_one();
                    return PushOutcome::Stored;
                }
            }

            if self.policy != OverflowPolicy::Block {
                return self.push(pending_item);
            }

            if self.closed.load(Ordering::Acquire) {
                return PushOutcome::DroppedNewest;
            }

            // Espera acotada: un cierre concurrente nunca deja al productor
            // colgado entre la comprobación y el registro del waiter.
            let space_signal = self.space_available.notified();
            let _ = tokio::time::timeout(std::time::Duration::from_millis(250), space_signal).await;
        }
    }

    /**
     * Extrae el siguiente registro, esperando si la cola está vacía.
     * Devuelve None cuando la cola fue cerrada y drenada.
     */
    pub async fn pop(&self) -> Option<T> {
        loop {
            let item_signal = self.items_available.notified();

            {
                let mut buffer_guard =
                    self.buffer.lock().expect("FATAL: flow queue lock poisoned.");
                if let Some(item) = buffer_guard.pop_front() {
                    drop(buffer_guard);
                    self.space_available.notify_one();
                    return Some(item);
                }
            }

            if self.closed.load(Ordering::Acquire) {
                return None;
            }

            // Espera acotada por la misma razón que en 'push_waiting'.
            let _ = tokio::time::timeout(std::time::Duration::from_millis(250), item_signal).await;
        }
    }

    /// Extracción inmediata sin espera (drenaje de apagado).
    pub fn try_pop(&self) -> Option<T> {
        let mut buffer_guard = self.buffer.lock().expect("FATAL: flow queue lock poisoned.");
        let item = buffer_guard.pop_front();
        if item.is_some() {
            drop(buffer_guard);
            self.space_available.notify_one();
        }
        item
    }

    /// Cierra la cola y despierta a productores y consumidores.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.items_available.notify_waiters();
        self.space_available.notify_waiters();
    }

    pub fn len(&self) -> usize {
        self.buffer.lock().expect("FATAL: flow queue lock poisoned.").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Ocupación en [0,1] para la señal de contrapresión.
    pub fn occupancy(&self) -> f64 {
        self.len() as f64 / self.capacity as f64
    }
}
