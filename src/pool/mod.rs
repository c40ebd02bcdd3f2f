//! Пул воркеров фиксированного размера.
//!
//! - `task`: абстракция единицы работы ([`Task`], [`TaskFn`]).
//! - `job`: задача в очереди и результат её выполнения.
//! - `worker_pool`: сам пул с ограниченными очередями, неблокирующей
//!   постановкой задач, ожиданием завершения и корректной остановкой.

pub mod job;
pub mod task;
pub mod worker_pool;

pub use job::*;
pub use task::*;
pub use worker_pool::*;
