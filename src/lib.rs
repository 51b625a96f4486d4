//! This crate provides the core of a school agenda app.
//!
//! Tasks are held by a [`TaskRepository`](repository::TaskRepository), which mirrors them into a persisted
//! key-value [`store`]. Each change to the tasks (or to the selected day) rebuilds the calendar [`markers`] and
//! publishes them to subscribers.
//!
//! The [`backup`] module exports the tasks as a JSON file, either locally or to a cloud bucket, and restores them.
//! Restores are announced to repositories, which reload by themselves. \
//! Creating a task also queues a local reminder, see [`notification`].

pub mod error;
pub use error::{AgendaError, AgendaResult};
pub mod config;
pub use config::Settings;
pub mod clock;

mod task;
pub use task::{Task, TaskDraft, TaskId, TaskPatch, TaskStatus, TimeSlot, Urgency};
pub mod store;
pub mod repository;
pub use repository::TaskRepository;
pub mod markers;
pub mod theme;
pub use theme::Theme;
pub mod notification;
pub mod backup;

pub mod mock_behaviour;
