//! Binds the route registry to the inter-process channel.
//!
//! Every call produces exactly one [`Envelope`]: unresolved routes, handler
//! errors and handler panics are all normalized here before anything is
//! written back to the caller.

use std::{
    any::Any,
    future::Future,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
    time::Duration,
};

use futures::{future::BoxFuture, FutureExt};
use log::{debug, error, warn};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::envelope::{Envelope, RouteError};
use crate::{
    core::{
        context::RequestContext,
        error::{BridgeError, BridgeResult, ErrorCode},
    },
    routing::{PathParams, RouteRegistry, Verb},
};

pub type RouteFuture = BoxFuture<'static, Result<Value, RouteError>>;

/// A registered route handler
pub type RouteHandler = Arc<dyn Fn(RequestContext) -> RouteFuture + Send + Sync>;

/// Shared-channel ingress: verb and path travel in the payload
#[derive(Debug, Clone, Deserialize)]
pub struct IpcCall {
    #[serde(default)]
    pub id: Value,
    pub verb: Verb,
    pub path: String,
    #[serde(default)]
    pub params: Map<String, Value>,
    #[serde(default)]
    pub query: Map<String, Value>,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl IpcCall {
    pub fn new(verb: Verb, path: impl Into<String>) -> Self {
        Self {
            id: Value::Null,
            verb,
            path: path.into(),
            params: Map::new(),
            query: Map::new(),
            data: Value::Null,
            timeout_ms: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    pub fn with_query(mut self, key: &str, value: Value) -> Self {
        self.query.insert(key.to_string(), value);
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }
}

/// Per-route ingress: the channel name identifies the route
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelCall {
    #[serde(default)]
    pub id: Value,
    pub channel: String,
    #[serde(default)]
    pub params: Map<String, Value>,
    #[serde(default)]
    pub query: Map<String, Value>,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

/// Channel name for a route in per-route mode, e.g. `GET users/:id`
pub fn channel_name(verb: Verb, template: &str) -> String {
    format!("{verb} {template}")
}

pub struct IpcRouter {
    registry: RouteRegistry<RouteHandler>,
    default_timeout: Option<Duration>,
}

impl Default for IpcRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl IpcRouter {
    pub fn new() -> Self {
        Self {
            registry: RouteRegistry::new(),
            default_timeout: None,
        }
    }

    /// Deadline applied to calls that do not carry `timeout_ms`
    pub fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Registers a route handler.
    ///
    /// # Errors
    /// Fails on an invalid template or a duplicate `(verb, template)`.
    pub fn route<F, Fut>(&mut self, verb: Verb, template: &str, handler: F) -> BridgeResult<&mut Self>
    where
        F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, RouteError>> + Send + 'static,
    {
        let handler: RouteHandler = Arc::new(move |ctx| handler(ctx).boxed());
        self.registry.register(verb, template, handler)?;
        Ok(self)
    }

    pub fn get<F, Fut>(&mut self, template: &str, handler: F) -> BridgeResult<&mut Self>
    where
        F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, RouteError>> + Send + 'static,
    {
        self.route(Verb::Get, template, handler)
    }

    pub fn post<F, Fut>(&mut self, template: &str, handler: F) -> BridgeResult<&mut Self>
    where
        F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, RouteError>> + Send + 'static,
    {
        self.route(Verb::Post, template, handler)
    }

    pub fn put<F, Fut>(&mut self, template: &str, handler: F) -> BridgeResult<&mut Self>
    where
        F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, RouteError>> + Send + 'static,
    {
        self.route(Verb::Put, template, handler)
    }

    pub fn delete<F, Fut>(&mut self, template: &str, handler: F) -> BridgeResult<&mut Self>
    where
        F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, RouteError>> + Send + 'static,
    {
        self.route(Verb::Delete, template, handler)
    }

    /// Channel names of every registered route, in registration order
    pub fn channels(&self) -> Vec<String> {
        self.registry
            .routes()
            .map(|r| channel_name(r.verb, r.template.as_str()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Handles one shared-channel call.
    pub async fn dispatch(&self, call: IpcCall) -> Envelope {
        let IpcCall {
            verb,
            path,
            params,
            query,
            data,
            timeout_ms,
            ..
        } = call;

        let Some(resolved) = self.registry.resolve(verb, &path) else {
            debug!("No route for {} {}", verb, path);
            return RouteError::not_found(format!("No route for {verb} {path}"))
                .with_details(json!({ "verb": verb, "path": path }))
                .into();
        };

        let handler = resolved.handler.clone();
        let label = channel_name(verb, resolved.template.as_str());
        let ctx = self.context(resolved.params, params, query, data, timeout_ms);
        invoke(&label, handler, ctx).await
    }

    /// Handles one per-route call addressed by channel name.
    pub async fn dispatch_channel(&self, call: ChannelCall) -> Envelope {
        let ChannelCall {
            channel,
            params,
            query,
            data,
            timeout_ms,
            ..
        } = call;

        let route = channel.split_once(' ').and_then(|(verb, template)| {
            let verb = verb.parse::<Verb>().ok()?;
            self.registry.find_exact(verb, template.trim())
        });
        let Some(route) = route else {
            debug!("No route for channel {}", channel);
            return RouteError::not_found(format!("No route for channel {channel}"))
                .with_details(json!({ "channel": channel }))
                .into();
        };

        let path_params = match channel_params(route.template.param_names(), &params) {
            Ok(path_params) => path_params,
            Err(err) => return err.into(),
        };

        let handler = route.handler.clone();
        let extra: Map<String, Value> = params
            .into_iter()
            .filter(|(k, _)| !path_params.contains_key(k))
            .collect();
        let ctx = self.context(path_params, extra, query, data, timeout_ms);
        invoke(&channel, handler, ctx).await
    }

    /// Decodes and handles a raw shared-channel frame.
    pub async fn dispatch_raw(&self, bytes: &[u8]) -> Envelope {
        match decode_frame::<IpcCall>(bytes) {
            Ok(call) => self.dispatch(call).await,
            Err(err) => err.into(),
        }
    }

    fn context(
        &self,
        path_params: PathParams,
        params: Map<String, Value>,
        query: Map<String, Value>,
        data: Value,
        timeout_ms: Option<u64>,
    ) -> RequestContext {
        let mut merged = params;
        merged.extend(query);
        let timeout = timeout_ms.map(Duration::from_millis).or(self.default_timeout);

        let ctx = RequestContext::new(path_params, merged, data);
        match timeout {
            Some(timeout) => ctx.with_timeout(timeout),
            None => ctx,
        }
    }
}

/// Decodes an ingress frame, mapping failures to `TRANSPORT_ERROR`.
pub fn decode_frame<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, RouteError> {
    serde_json::from_slice(bytes).map_err(|e| {
        warn!("Rejected malformed ingress frame: {}", e);
        RouteError::from(BridgeError::from(e))
    })
}

/// Path parameters for a per-route call; every template parameter is required.
fn channel_params<'a>(
    names: impl Iterator<Item = &'a str>,
    supplied: &Map<String, Value>,
) -> Result<PathParams, RouteError> {
    let mut params = PathParams::new();
    let mut missing = Vec::new();

    for name in names {
        match supplied.get(name) {
            Some(Value::String(s)) if !s.is_empty() => {
                params.insert(name.to_string(), s.clone());
            }
            Some(v @ (Value::Number(_) | Value::Bool(_))) => {
                params.insert(name.to_string(), v.to_string());
            }
            _ => missing.push(name.to_string()),
        }
    }

    if missing.is_empty() {
        Ok(params)
    } else {
        Err(RouteError::new(
            ErrorCode::ValidationError,
            format!("Missing route parameters: {}", missing.join(", ")),
        )
        .with_details(json!({ "fields": missing })))
    }
}

async fn invoke(label: &str, handler: RouteHandler, ctx: RequestContext) -> Envelope {
    // The handler may panic before returning its future or while polling it.
    let future = match panic::catch_unwind(AssertUnwindSafe(|| handler(ctx))) {
        Ok(future) => future,
        Err(payload) => return panicked(label, payload),
    };

    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(result) => {
            if let Err(err) = &result {
                debug!("{} returned {}", label, err);
            }
            result.into()
        }
        Err(payload) => panicked(label, payload),
    }
}

fn panicked(label: &str, payload: Box<dyn Any + Send>) -> Envelope {
    let reason = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    error!("Route handler {} panicked: {}", label, reason);
    RouteError::internal("Route handler failed unexpectedly").into()
}
