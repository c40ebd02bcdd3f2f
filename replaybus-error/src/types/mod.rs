pub mod broker;
pub mod pool;

// Публичный экспорт всех типов ошибок из вложенных модулей.
pub use broker::*;
pub use pool::*;
