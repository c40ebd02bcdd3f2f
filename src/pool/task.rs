//! Абстракция единицы работы для [`WorkerPool`](super::WorkerPool).
//!
//! Пул ничего не знает о предметной логике: ему достаточно типа, который
//! умеет выполниться и вернуть результат либо ошибку.

use std::{future::Future, sync::Arc};

use async_trait::async_trait;

/// Единица работы: "выполнись и верни (результат, ошибку)".
///
/// Ошибка задачи никогда не останавливает пул: она упаковывается в
/// [`JobResult`](super::JobResult) и уходит в очередь результатов.
#[async_trait]
pub trait Task: Send + Sync + 'static {
    /// Тип результата успешного выполнения.
    type Output: Send + 'static;

    /// Выполняет задачу.
    async fn execute(&self) -> anyhow::Result<Self::Output>;
}

#[async_trait]
impl<T> Task for Box<T>
where
    T: Task + ?Sized,
{
    type Output = T::Output;

    async fn execute(&self) -> anyhow::Result<Self::Output> {
        (**self).execute().await
    }
}

#[async_trait]
impl<T> Task for Arc<T>
where
    T: Task + ?Sized,
{
    type Output = T::Output;

    async fn execute(&self) -> anyhow::Result<Self::Output> {
        (**self).execute().await
    }
}

/// Задача на основе замыкания.
///
/// Замыкание *создаёт* новый future при каждом выполнении, поэтому
/// общего изменяемого состояния между запусками нет; если оно нужно —
/// используйте `Arc<...>` внутри замыкания явно.
#[derive(Debug, Clone)]
pub struct TaskFn<F> {
    f: F,
}

impl<F> TaskFn<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut, O> Task for TaskFn<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<O>> + Send + 'static,
    O: Send + 'static,
{
    type Output = O;

    async fn execute(&self) -> anyhow::Result<O> {
        (self.f)().await
    }
}
