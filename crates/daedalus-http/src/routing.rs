//! Path routing and method dispatch.
//!
//! Patterns are `/`-separated segments. A segment is either static, a
//! parameter `{name}` or, as the last segment only, a rest capture `*name`
//! (`*` alone captures without a name). A pattern without a rest capture must
//! consume the whole remaining path. The unmatched tail of a rest capture
//! becomes the path seen by nested dispatchers.

use crate::exchange::HttpMeans;
use daedalus_core::{
    with_modifier, BoxFuture, Capability, Context, Handler, HandlerResult, Modification,
    Modifier, ModifierId,
};
use http::Method;
use indexmap::IndexMap;
use std::fmt;
use std::sync::{Arc, OnceLock};
use thiserror::Error;

/// Means describing how far routing has progressed through the request path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteMeans {
    matched: String,
    remaining: String,
    params: IndexMap<String, String>,
}

impl RouteMeans {
    /// Starts routing at the beginning of `path`.
    #[must_use]
    pub fn new(path: &str) -> Self {
        Self {
            matched: String::new(),
            remaining: normalize(path),
            params: IndexMap::new(),
        }
    }

    /// Returns the part of the path consumed so far.
    #[must_use]
    pub fn matched(&self) -> &str {
        if self.matched.is_empty() {
            "/"
        } else {
            &self.matched
        }
    }

    /// Returns the part of the path still to be matched.
    #[must_use]
    pub fn remaining(&self) -> &str {
        &self.remaining
    }

    /// Returns a path parameter.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Returns all path parameters in match order.
    #[must_use]
    pub fn params(&self) -> &IndexMap<String, String> {
        &self.params
    }

    fn for_context(ctx: &Context) -> HandlerResult<Self> {
        if let Some(route) = ctx.get::<Self>() {
            return Ok(route.clone());
        }
        Ok(Self::new(ctx.require::<HttpMeans>()?.path()))
    }
}

fn normalize(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{trimmed}")
    }
}

/// An invalid route pattern.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    /// A rest capture appears before the last segment.
    #[error("Rest capture '{segment}' must be the last segment of '{pattern}'")]
    RestNotLast {
        /// The pattern.
        pattern: String,
        /// The offending segment.
        segment: String,
    },

    /// A parameter segment is malformed.
    #[error("Invalid parameter segment '{segment}' in '{pattern}'")]
    InvalidParam {
        /// The pattern.
        pattern: String,
        /// The offending segment.
        segment: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Static(String),
    Param(String),
    Rest(Option<String>),
}

/// A compiled route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    source: String,
    segments: Vec<Segment>,
}

impl Pattern {
    /// Compiles a pattern.
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        let raw: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();
        let mut segments = Vec::with_capacity(raw.len());

        for (index, segment) in raw.iter().enumerate() {
            let parsed = if let Some(inner) = segment.strip_prefix('{') {
                let name = inner
                    .strip_suffix('}')
                    .filter(|n| !n.is_empty() && !n.contains(['{', '}']))
                    .ok_or_else(|| PatternError::InvalidParam {
                        pattern: pattern.to_string(),
                        segment: (*segment).to_string(),
                    })?;
                Segment::Param(name.to_string())
            } else if let Some(name) = segment.strip_prefix('*') {
                if index + 1 != raw.len() {
                    return Err(PatternError::RestNotLast {
                        pattern: pattern.to_string(),
                        segment: (*segment).to_string(),
                    });
                }
                Segment::Rest((!name.is_empty()).then(|| name.to_string()))
            } else {
                Segment::Static((*segment).to_string())
            };
            segments.push(parsed);
        }

        Ok(Self {
            source: pattern.to_string(),
            segments,
        })
    }

    /// Returns the pattern as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Matches the remaining path of `route`, returning the advanced route.
    #[must_use]
    pub fn matches(&self, route: &RouteMeans) -> Option<RouteMeans> {
        let path: Vec<&str> = route
            .remaining
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();
        let mut params = route.params.clone();
        let mut consumed = 0;

        for segment in &self.segments {
            match segment {
                Segment::Static(expected) => {
                    if path.get(consumed) != Some(&expected.as_str()) {
                        return None;
                    }
                    consumed += 1;
                }
                Segment::Param(name) => {
                    let value = path.get(consumed)?;
                    let decoded = urlencoding::decode(value)
                        .map_or_else(|_| (*value).to_string(), |v| v.into_owned());
                    params.insert(name.clone(), decoded);
                    consumed += 1;
                }
                Segment::Rest(name) => {
                    let rest = path[consumed..].join("/");
                    if let Some(name) = name {
                        params.insert(name.clone(), rest);
                    }
                    return Some(route.advanced(&path[..consumed], &path[consumed..], params));
                }
            }
        }

        (consumed == path.len()).then(|| route.advanced(&path[..consumed], &[], params))
    }
}

impl RouteMeans {
    fn advanced(
        &self,
        consumed: &[&str],
        rest: &[&str],
        params: IndexMap<String, String>,
    ) -> Self {
        let mut matched = self.matched.clone();
        for segment in consumed {
            matched.push('/');
            matched.push_str(segment);
        }
        Self {
            matched,
            remaining: normalize(&rest.join("/")),
            params,
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

struct RoutingModifier {
    id: ModifierId,
}

impl Modifier for RoutingModifier {
    fn id(&self) -> ModifierId {
        self.id
    }

    fn modification<'a>(&'a self, ctx: &'a Context) -> BoxFuture<'a, HandlerResult<Modification>> {
        Box::pin(async move {
            if ctx.get::<RouteMeans>().is_some() {
                return Ok(Modification::new());
            }
            Ok(Modification::new().with(RouteMeans::for_context(ctx)?))
        })
    }
}

/// Capability starting path routing at the request path.
///
/// [`dispatch_by_pattern`] starts routing on its own when needed; applying
/// this capability makes [`RouteMeans`] available to handlers that are not
/// behind a pattern.
#[derive(Clone)]
pub struct Routing {
    modifier: Arc<RoutingModifier>,
}

impl Routing {
    /// Returns the process-wide routing capability.
    #[must_use]
    pub fn new() -> Self {
        static SHARED: OnceLock<Routing> = OnceLock::new();
        SHARED
            .get_or_init(|| Self {
                modifier: Arc::new(RoutingModifier {
                    id: ModifierId::mint(),
                }),
            })
            .clone()
    }
}

impl Default for Routing {
    fn default() -> Self {
        Self::new()
    }
}

impl Capability for Routing {
    fn for_handler(&self, handler: Handler) -> Handler {
        with_modifier(self.modifier.clone(), handler)
    }
}

/// Dispatches on the request path.
///
/// Routes are tried in order. Each matching route's handler runs with the
/// advanced [`RouteMeans`]; dispatch stops once a handler responds. When no
/// route responds the dispatcher does nothing, so the request falls through.
///
/// # Example
///
/// ```
/// use daedalus_core::Handler;
/// use daedalus_http::dispatch_by_pattern;
///
/// let api = dispatch_by_pattern([
///     ("/users/{id}", Handler::noop()),
///     ("/files/*path", Handler::noop()),
/// ])
/// .unwrap();
/// ```
pub fn dispatch_by_pattern<P: AsRef<str>>(
    routes: impl IntoIterator<Item = (P, Handler)>,
) -> Result<Handler, PatternError> {
    let routes: Arc<[(Pattern, Handler)]> = routes
        .into_iter()
        .map(|(pattern, handler)| Pattern::parse(pattern.as_ref()).map(|p| (p, handler)))
        .collect::<Result<Vec<_>, PatternError>>()?
        .into();

    Ok(Handler::new(move |ctx: Context| {
        let routes = Arc::clone(&routes);
        async move {
            let route = RouteMeans::for_context(&ctx)?;
            for (pattern, handler) in routes.iter() {
                let Some(advanced) = pattern.matches(&route) else {
                    continue;
                };
                tracing::trace!(pattern = %pattern, matched = advanced.matched(), "Route matched");
                if ctx
                    .next_with(handler, Modification::new().with(advanced))
                    .await?
                {
                    break;
                }
            }
            Ok(())
        }
    }))
}

/// Dispatches on the request method.
///
/// A `GET` handler also serves `HEAD` unless a `HEAD` handler is given.
/// Unlisted methods fall through.
pub fn dispatch_by_method(table: impl IntoIterator<Item = (Method, Handler)>) -> Handler {
    let table: Arc<IndexMap<Method, Handler>> = Arc::new(table.into_iter().collect());

    Handler::new(move |ctx: Context| {
        let table = Arc::clone(&table);
        async move {
            let method = ctx.require::<HttpMeans>()?.method().clone();
            let handler = table.get(&method).or_else(|| {
                (method == Method::HEAD)
                    .then(|| table.get(&Method::GET))
                    .flatten()
            });

            if let Some(handler) = handler {
                ctx.next(handler).await?;
            }
            Ok(())
        }
    })
}
