use std::{
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use replaybus::{
    delivery_channel, Broker, DeliveryReceiver, Message, PoolConfig, Subscriber, SubscriberConfig,
    SubscriberState,
};
use tokio::{sync::mpsc::error::TryRecvError, time::timeout};

async fn recv_offsets(
    rx: &mut DeliveryReceiver,
    n: usize,
) -> Vec<u64> {
    let mut offsets = Vec::with_capacity(n);
    for _ in 0..n {
        let msg = timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out")
            .expect("channel closed");
        offsets.push(msg.offset());
    }
    offsets
}

async fn eventually(
    what: &str,
    mut check: impl FnMut() -> bool,
) {
    timeout(Duration::from_secs(5), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {what}"));
}

/// Тест проверяет сценарии публикации, повторного воспроизведения и
/// отписки на одном подписчике: смещения 0,1,2, затем ещё раз 0,1,2, затем
/// ничего, хотя журнал продолжает расти.
#[tokio::test]
async fn test_publish_replay_unsubscribe_scenario() {
    let broker = Broker::new();
    broker.create_topic("t1").unwrap();
    let (tx, mut rx) = delivery_channel(10);
    broker.subscribe("t1", "sub1", tx).unwrap();

    for i in 0..3 {
        broker.publish("t1", format!("m{i}")).unwrap();
    }
    assert_eq!(recv_offsets(&mut rx, 3).await, vec![0, 1, 2]);

    let receipt = broker.reset_offset("t1", "sub1", 0).unwrap();
    assert_eq!(receipt.delivered, 3);
    assert_eq!(recv_offsets(&mut rx, 3).await, vec![0, 1, 2]);

    broker.unsubscribe("t1", "sub1").unwrap();
    let receipt = broker.publish("t1", "after").unwrap();
    assert_eq!(receipt.offset, 3);
    assert_eq!(receipt.delivered, 0);
    assert!(timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("closed channel must resolve")
        .is_none());

    // Новый подписчик видит сообщение, опубликованное после отписки.
    let (tx, mut late) = delivery_channel(10);
    broker.subscribe("t1", "late", tx).unwrap();
    broker.reset_offset("t1", "late", 0).unwrap();
    let replayed = recv_offsets(&mut late, 4).await;
    assert_eq!(replayed, vec![0, 1, 2, 3]);
}

/// Тест проверяет, что канал ёмкостью 1 удерживает одно сообщение из пяти,
/// а публикация при этом ни разу не завершается ошибкой.
#[tokio::test]
async fn test_small_channel_drops_excess() {
    let broker = Broker::new();
    broker.create_topic("t1").unwrap();
    let (tx, mut rx) = delivery_channel(1);
    broker.subscribe("t1", "sub2", tx).unwrap();

    let mut delivered = 0;
    let mut dropped = 0;
    for _ in 0..5 {
        let receipt = broker.publish("t1", "burst").unwrap();
        delivered += receipt.delivered;
        dropped += receipt.dropped;
    }
    assert_eq!((delivered, dropped), (1, 4));
    assert_eq!(rx.try_recv().unwrap().offset(), 0);
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    assert_eq!(broker.topic_stats("t1").unwrap().retained, 5);
}

/// Тест проверяет, что одна публикация даёт каждой подписке копию с
/// одинаковыми смещением и данными.
#[tokio::test]
async fn test_fan_out_identical_copies() {
    let broker = Broker::new();
    broker.create_topic("fan").unwrap();
    broker.publish("fan", "warmup").unwrap();

    let mut receivers = Vec::new();
    for i in 0..4 {
        let (tx, rx) = delivery_channel(2);
        broker.subscribe("fan", format!("s{i}"), tx).unwrap();
        receivers.push(rx);
    }

    let receipt = broker.publish("fan", "payload").unwrap();
    assert_eq!(receipt.delivered, 4);

    let mut copies: Vec<Message> = Vec::new();
    for rx in &mut receivers {
        copies.push(rx.recv().await.unwrap());
    }
    assert!(copies
        .iter()
        .all(|m| m.offset() == 1 && m.data_as_str() == Some("payload")));
}

/// Тест проверяет, что публикация не ждёт подписчика, который ничего не
/// читает.
#[tokio::test]
async fn test_publish_never_blocks_on_slow_consumer() {
    let broker = Broker::new();
    broker.create_topic("fast").unwrap();
    let (tx, _never_read) = delivery_channel(1);
    broker.subscribe("fast", "stuck", tx).unwrap();

    timeout(Duration::from_secs(1), async {
        for _ in 0..10_000 {
            broker.publish("fast", "x").unwrap();
        }
    })
    .await
    .expect("publish blocked");

    let stats = broker.stats();
    assert_eq!(stats.published, 10_000);
    assert_eq!(stats.delivered, 1);
    assert_eq!(stats.dropped, 9_999);
}

/// Тест проверяет изоляцию: медленный обработчик подписчика A не
/// задерживает обработку у подписчика B.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_slow_subscriber_does_not_delay_others() {
    let broker = Broker::new();
    broker.create_topic("shared").unwrap();

    let slow = Subscriber::new("slow", |_m: Message| async {
        tokio::time::sleep(Duration::from_secs(2)).await;
    })
    .unwrap();
    let fast = Subscriber::new("fast", |_m: Message| async {}).unwrap();
    slow.subscribe_to(&broker, "shared").unwrap();
    fast.subscribe_to(&broker, "shared").unwrap();

    let started = Instant::now();
    for _ in 0..5 {
        broker.publish("shared", "tick").unwrap();
    }
    eventually("fast subscriber to process", || fast.stats().processed == 5).await;

    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(slow.stats().processed, 0);
}

/// Тест проверяет, что при нескольких воркерах обработчики завершаются не
/// в порядке доставки.
#[tokio::test(start_paused = true)]
async fn test_completion_order_differs_from_delivery_order() {
    let broker = Broker::new();
    broker.create_topic("jobs").unwrap();

    let completed = Arc::new(Mutex::new(Vec::new()));
    let log = completed.clone();
    let config = SubscriberConfig::new(16, PoolConfig::new(4, 16));
    let sub = Subscriber::with_config(
        "workers",
        move |m: Message| {
            let log = log.clone();
            async move {
                // Ранние смещения работают дольше.
                let delay = 100 - m.offset() * 10;
                tokio::time::sleep(Duration::from_millis(delay)).await;
                log.lock().unwrap().push(m.offset());
            }
        },
        config,
    )
    .unwrap();
    sub.subscribe_to(&broker, "jobs").unwrap();

    for _ in 0..8 {
        broker.publish("jobs", "work").unwrap();
    }
    eventually("all handlers to finish", || sub.stats().processed == 8).await;

    let order = completed.lock().unwrap().clone();
    let mut sorted = order.clone();
    sorted.sort_unstable();
    assert_eq!(sorted, (0..8).collect::<Vec<_>>());
    assert_ne!(order, sorted);
}

/// Тест проверяет явный сигнал завершения: наблюдатель видит переходы
/// Listening → Closed, а `closed()` срабатывает после обработки всех
/// принятых сообщений.
#[tokio::test]
async fn test_subscriber_closed_signal() {
    let broker = Broker::new();
    broker.create_topic("t").unwrap();
    let sub = Subscriber::new("watcher", |_m: Message| async {
        tokio::time::sleep(Duration::from_millis(20)).await;
    })
    .unwrap();
    let mut states = sub.watch_state();
    assert_eq!(*states.borrow(), SubscriberState::Created);

    sub.subscribe_to(&broker, "t").unwrap();
    states.changed().await.unwrap();
    assert_eq!(*states.borrow_and_update(), SubscriberState::Listening);

    for _ in 0..3 {
        broker.publish("t", "x").unwrap();
    }
    broker.unsubscribe("t", "watcher").unwrap();

    timeout(Duration::from_secs(2), sub.closed())
        .await
        .expect("subscriber never closed");
    assert_eq!(sub.state(), SubscriberState::Closed);
    let stats = sub.stats();
    assert_eq!(stats.received, 3);
    assert_eq!(stats.processed, 3);
    assert_eq!(sub.pool_stats().outstanding, 0);
}

/// Тест проверяет сквозной сценарий: подписчик с пулом получает повторное
/// воспроизведение и обрабатывает каждую доставленную копию.
#[tokio::test]
async fn test_subscriber_processes_replayed_copies() {
    let broker = Broker::new();
    broker.create_topic("t1").unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = seen.clone();
    let sub = Subscriber::new("sub1", move |m: Message| {
        let log = log.clone();
        async move {
            log.lock().unwrap().push(m.offset());
        }
    })
    .unwrap();
    sub.subscribe_to(&broker, "t1").unwrap();

    for _ in 0..3 {
        broker.publish("t1", "m").unwrap();
    }
    eventually("first round", || sub.stats().processed == 3).await;
    broker.reset_offset("t1", "sub1", 0).unwrap();
    eventually("replayed round", || sub.stats().processed == 6).await;

    let mut offsets = seen.lock().unwrap().clone();
    offsets.sort_unstable();
    assert_eq!(offsets, vec![0, 0, 1, 1, 2, 2]);
}
