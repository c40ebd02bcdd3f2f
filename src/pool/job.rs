use std::fmt;

use replaybus_error::TaskError;

/// Идентификатор задачи, монотонный в пределах одного пула.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JobId(u64);

/// Задача, принятая пулом в очередь.
#[derive(Debug)]
pub struct Job<T> {
    pub id: JobId,
    pub task: T,
    /// Сколько раз задача запускалась. Воркер увеличивает счётчик перед
    /// выполнением; повторов пул не делает.
    pub attempts: u32,
}

/// Результат выполнения одной задачи.
#[derive(Debug)]
pub struct JobResult<O> {
    pub job_id: JobId,
    /// Номер воркера (с 1), выполнившего задачу.
    pub worker_id: usize,
    pub attempts: u32,
    pub output: Result<O, TaskError>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl JobId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn value(self) -> u64 {
        self.0
    }
}

impl<T> Job<T> {
    pub fn new(
        id: JobId,
        task: T,
    ) -> Self {
        Self {
            id,
            task,
            attempts: 0,
        }
    }
}

impl<O> JobResult<O> {
    pub fn is_ok(&self) -> bool {
        self.output.is_ok()
    }

    pub fn is_err(&self) -> bool {
        self.output.is_err()
    }
}

impl fmt::Display for JobId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
