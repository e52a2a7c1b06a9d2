// functions/mod.rs — the serverless-style function layer.
//
// Three independent handlers, mirroring what a managed function runtime
// would host:
//   POST /functions/helloWorld    callable, request/response
//   GET  /functions/getAllTasks   HTTP-triggered list
//   onTaskCreated                 creation trigger, driven by the change
//                                 broadcaster (fire-and-observe)

pub mod hello;
pub mod tasks;
pub mod trigger;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::AppContext;

/// Routes for the HTTP-invocable handlers; nested under `/functions` by the
/// REST server.
pub fn router() -> Router<Arc<AppContext>> {
    Router::new()
        .route("/helloWorld", post(hello::hello_world))
        .route("/getAllTasks", get(tasks::get_all_tasks))
}
