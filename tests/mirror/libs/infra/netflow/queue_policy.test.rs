/**
 * =================================================================
 * APARATO: BOUNDED QUEUE POLICY TEST (V2.0)
 * CLASIFICACIÓN: TRINITY EVIDENCE (ESTRATO L3-NETFLOW)
 * OBJETIVO: Certificar las tres políticas de desborde y el escenario
 *           de saturación 200/100 del contrato.
 * =================================================================
 */

use panoptes_infra_netflow::{BoundedQueue, OverflowPolicy, PushOutcome};
use std::sync::Arc;
use std::time::Duration;

#[test]
fn certify_drop_newest_saturation_scenario() {
    // Escenario del contrato: capacidad 100, 200 llegadas en un tick.
    // Exactamente 100 progresan; 100 se descartan; sin pánico.
    let queue: BoundedQueue<u32> = BoundedQueue::new(100, OverflowPolicy::DropNewest);
    let mut dropped_count = 0u32;

    for sequence_number in 0..200u32 {
        if queue.push(sequence_number).dropped_one() {
            dropped_count += 1;
        }
    }

    assert_eq!(queue.len(), 100);
    assert_eq!(dropped_count, 100);

    // Los supervivientes son exactamente los 100 primeros, en orden FIFO.
    let mut drained = Vec::new();
    while let Some(item) = queue.try_pop() {
        drained.push(item);
    }
    assert_eq!(drained, (0..100).collect::<Vec<u32>>());
    println!("✅ QUEUE: drop-newest saturation certified (100 kept / 100 dropped).");
}

#[test]
fn certify_drop_oldest_evicts_global_head() {
    let queue: BoundedQueue<u32> = BoundedQueue::new(3, OverflowPolicy::DropOldest);

    assert_eq!(queue.push(1), PushOutcome::Stored);
    assert_eq!(queue.push(2), PushOutcome::Stored);
    assert_eq!(queue.push(3), PushOutcome::Stored);
    // La cabeza global (1) se desaloja para preservar la recencia.
    assert_eq!(queue.push(4), PushOutcome::DroppedOldest);

    let mut drained = Vec::new();
    while let Some(item) = queue.try_pop() {
        drained.push(item);
    }
    assert_eq!(drained, vec![2, 3, 4]);
    println!("✅ QUEUE: drop-oldest recency certified.");
}

#[tokio::test]
async fn certify_block_policy_waits_for_capacity() {
    let queue: Arc<BoundedQueue<u32>> = Arc::new(BoundedQueue::new(1, OverflowPolicy::Block));
    queue.push(1);

    // Consumidor diferido: libera capacidad tras 50 ms.
    let consumer_queue = Arc::clone(&queue);
    let consumer_handle = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        consumer_queue.pop().await
    });

    // El productor debe quedar en espera cooperativa hasta el drenaje.
    let outcome = queue.push_waiting(2).await;
    assert_eq!(outcome, PushOutcome::Stored);

    let consumed = consumer_handle.await.expect("consumer task collapsed");
    assert_eq!(consumed, Some(1));
    assert_eq!(queue.pop().await, Some(2));
    println!("✅ QUEUE: block policy cooperative wait certified.");
}

#[tokio::test]
async fn certify_close_wakes_consumers() {
    let queue: Arc<BoundedQueue<u32>> = Arc::new(BoundedQueue::new(4, OverflowPolicy::DropNewest));

    let waiting_queue = Arc::clone(&queue);
    let waiting_consumer = tokio::spawn(async move { waiting_queue.pop().await });

    tokio::time::sleep(Duration::from_millis(20)).await;
    queue.close();

    assert_eq!(waiting_consumer.await.expect("consumer collapsed"), None);
    println!("✅ QUEUE: shutdown wake certified.");
}

#[test]
fn certify_policy_parsing() {
    assert_eq!(OverflowPolicy::parse("drop-oldest"), OverflowPolicy::DropOldest);
    assert_eq!(OverflowPolicy::parse("BLOCK"), OverflowPolicy::Block);
    assert_eq!(OverflowPolicy::parse("anything-else"), OverflowPolicy::DropNewest);
}
