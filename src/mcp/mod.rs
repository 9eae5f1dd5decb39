//! Model Context Protocol core: sessions, tool registry and method dispatch
//!
//! Transport-agnostic. The HTTP layer decodes requests, resolves a session
//! through [`session::SessionStore`] and hands both to [`dispatcher::Dispatcher`].

pub mod dispatcher;
pub mod registry;
pub mod rpc;
pub mod session;
