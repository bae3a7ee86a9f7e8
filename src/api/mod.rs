//! Routes exposed to the presentation tier.
//!
//! Entity routes are thin: they flatten the request context into query
//! parameters, hand them to the query bus and unwrap its result, so the
//! envelope is built exactly once by the transport adapter.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::{
    bus::QueryBus,
    core::{context::RequestContext, error::BridgeResult, status},
    handlers::{classrooms, users},
    routing::Verb,
    transport::{IpcRouter, RouteError},
};

/// `(verb, template, query)` for every bus-backed route
const BUS_ROUTES: &[(Verb, &str, &str)] = &[
    (Verb::Get, "users", users::LIST),
    (Verb::Get, "users/:id", users::GET),
    (Verb::Post, "users", users::CREATE),
    (Verb::Delete, "users/:id", users::DELETE),
    (Verb::Get, "classrooms/:classId", classrooms::GET),
    (Verb::Post, "classrooms", classrooms::CREATE),
];

/// Registers the built-in routes on `router`.
pub fn register_routes(router: &mut IpcRouter, bus: Arc<QueryBus>) -> BridgeResult<()> {
    let health_bus = bus.clone();
    router.get("system/health", move |_ctx: RequestContext| {
        let bus = health_bus.clone();
        async move { Ok(health(&bus)) }
    })?;

    for (verb, template, query) in BUS_ROUTES {
        bus_route(router, *verb, template, *query, bus.clone())?;
    }
    Ok(())
}

/// Registers a route that forwards to the named query.
pub fn bus_route(
    router: &mut IpcRouter,
    verb: Verb,
    template: &str,
    query: &'static str,
    bus: Arc<QueryBus>,
) -> BridgeResult<()> {
    router.route(verb, template, move |ctx: RequestContext| {
        let bus = bus.clone();
        async move {
            let result = bus
                .execute_with_deadline(query, ctx.to_query_params(), ctx.deadline())
                .await;
            result.into_result().map_err(RouteError::from)
        }
    })?;
    Ok(())
}

fn health(bus: &QueryBus) -> Value {
    json!({
        "ready": status::is_ready(),
        "queries": bus.handler_names(),
    })
}
