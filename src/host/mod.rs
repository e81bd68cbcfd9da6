//! The host application's side of the conversation: the event feed coming
//! in and the notifications going out.

pub mod events;
pub mod notifier;

pub use events::{CommandInvocation, CommandKind, HostEvent, PartObserved, Role, TurnCompleted};
pub use notifier::{HostMessage, JsonLinesNotifier, Notifier, NullNotifier, Toast, ToastVariant};
