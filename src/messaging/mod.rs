//! Control surface
//!
//! Requests come in as a method name plus JSON args, are validated into a
//! typed [`Request`], and run by the [`CommandExecutor`]. Changes to the set
//! of streams are broadcast as [`Event`]s.
//!
//! ```text
//! ┌─────────┐   Request    ┌──────────┐    Event     ┌───────────┐
//! │  Host   │ ───────────> │ Executor │ ───────────> │ Event Bus │
//! └─────────┘ <─────────── └──────────┘              └───────────┘
//!                 Reply          │                         │
//!                                ▼                         ▼
//!                          StreamRegistry             Subscribers
//! ```

pub mod bus;
pub mod commands;
pub mod events;
pub mod executor;

pub use bus::{EventBus, SubscriberId};
pub use commands::{Reply, ReplyError, Request, Response};
pub use events::Event;
pub use executor::CommandExecutor;
