//! Внутрипроцессный pub/sub с журналом и воспроизведением.
//!
//! - `message`: неизменяемое сообщение со смещением в журнале темы.
//! - `log`: журнал темы и точка расширения [`MessageLog`].
//! - `subscription`: идентификатор подписчика и канал доставки.
//! - `topic`: журнал и реестр подписок одной темы под общей блокировкой.
//! - `broker`: реестр тем, публикация, отписка и сброс смещения.
//! - `subscriber`: подписчик, обрабатывающий сообщения в собственном пуле.

pub mod broker;
pub mod log;
pub mod message;
pub mod subscriber;
pub mod subscription;
pub mod topic;

pub use broker::*;
pub use log::*;
pub use message::*;
pub use subscriber::*;
pub use subscription::*;
pub use topic::*;
