//! Внутрипроцессный pub/sub брокер с воспроизводимым журналом тем и
//! пулом воркеров на каждого подписчика.
//!
//! ```no_run
//! use replaybus::{Broker, Message, Subscriber};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let broker = Broker::new();
//! broker.create_topic("orders")?;
//!
//! let sub = Subscriber::new("audit", |msg: Message| async move {
//!     println!("{} @ {}", msg.topic(), msg.offset());
//! })?;
//! sub.subscribe_to(&broker, "orders")?;
//!
//! broker.publish("orders", "created")?;
//! broker.reset_offset("orders", "audit", 0)?;
//!
//! broker.unsubscribe("orders", "audit")?;
//! sub.closed().await;
//! # Ok(())
//! # }
//! ```

/// Process settings: defaults, optional file, `REPLAYBUS__*` environment.
pub mod config;
/// Logging setup (filters, formatters, file sink).
pub mod logging;
/// Bounded worker pool: tasks, jobs, results.
pub mod pool;
/// Pub/Sub: Broker, topics, message log, Subscriber.
pub mod pubsub;

// -----------------------------------------------------------------------------
//  Frequently used public types
// -----------------------------------------------------------------------------

/// Settings.
pub use crate::config::{Settings, SubscriberSettings};
/// Logging.
pub use logging::{init_logging, LogFormat, LoggingConfig, LoggingHandle};
/// Worker pool API.
pub use pool::{Job, JobId, JobResult, PoolConfig, PoolStats, Rejected, Task, TaskFn, WorkerPool};
/// Pub/Sub API.
pub use pubsub::{
    delivery_channel, Broker, BrokerStats, DeliveryReceiver, DeliverySender, InMemoryLog,
    LogFactory, Message, MessageHandler, MessageLog, Offset, PublishReceipt, ReplayReceipt,
    Subscriber, SubscriberConfig, SubscriberId, SubscriberState, SubscriberStats, TopicStats,
};
/// Error types.
pub use replaybus_error::{BrokerError, ErrorExt, PoolError, StatusCode, SubmitError, TaskError};
