//! Cross-shard to-do list aggregation.
//!
//! - [`domain`]: scope resolution, the aggregation cache, needs-queries and
//!   ignores, plus the ports they depend on
//! - [`presenter`]: dashboard-ready to-do lists
//! - [`outbound`]: adapters for the ports
//! - [`settings`]: layered configuration

pub mod domain;
pub mod outbound;
pub mod presenter;
pub mod settings;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use presenter::{TodoList, TodoListPresenter};
pub use settings::TodoSettings;
