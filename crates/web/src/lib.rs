//! Path dispatch and server wiring on top of `ferry-http`.
//!
//! - [`dispatch`]: the immutable [`DispatchTable`] resolving request paths and logical
//!   names to handlers
//! - [`RequestHandler`]: the handler stored in the table, [`handler_fn`] adapts async functions
//! - [`ResponseBody`]: what handlers answer with
//! - [`Server`]: accepts connections and dispatches each request through the table

mod body;
mod handler;
mod server;

pub mod dispatch;

pub use body::ResponseBody;
pub use dispatch::DispatchTable;
pub use dispatch::DispatchTableBuilder;
pub use handler::FnHandler;
pub use handler::RequestHandler;
pub use handler::handler_fn;
pub use server::Server;
pub use server::ServerBuildError;
pub use server::ServerBuilder;
