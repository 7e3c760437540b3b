//! Engine adapters.
//!
//! An engine owns route matching and the transport. The core hands it fully
//! compiled [`Route`]s at registration time and, per matched request, the
//! engine builds one [`Context`], runs the route's handler through [`drive`]
//! and sends back whatever was written.
//!
//! | Engine | Named catch-all | Native middleware | Transport |
//! |---|---|---|---|
//! | [`RadixEngine`] | yes (`{*name}`) | none | hyper via [`Server`](crate::Server) |
//! | [`MemoryEngine`] | no (`*` only) | trampoline stages | in-process |

pub mod memory;
pub mod radix;

use std::collections::HashMap;

use crate::context::Context;
use crate::error::Result;
use crate::handler::BoxedHandler;
use crate::method::Method;
use crate::response::Response;
use crate::wildcard::{ANONYMOUS, WildcardPath, WildcardSupport};

pub use memory::MemoryEngine;
pub use radix::RadixEngine;

/// What a routing engine must provide to host the core.
pub trait Engine: WildcardSupport + Send {
    /// Registers one route. The path is already in the engine's wildcard
    /// dialect (see [`fix_wildcard_path_if_need`](crate::fix_wildcard_path_if_need)).
    fn add_route(&mut self, route: Route) -> Result;
}

/// One registered route: method, engine-ready path and compiled handler.
#[derive(Clone, Debug)]
pub struct Route {
    pub method: Method,
    pub path: WildcardPath,
    pub handler: BoxedHandler,
}

impl Route {
    /// Exposes an anonymous catch-all under the name the route was written
    /// with, so `param("filepath")` works on every engine.
    pub fn alias_wildcard(&self, params: &mut HashMap<String, String>) {
        if self.path.key != ANONYMOUS {
            return;
        }
        if let Some(name) = &self.path.name {
            if let Some(tail) = params.get(ANONYMOUS).cloned() {
                params.entry(name.clone()).or_insert(tail);
            }
        }
    }
}

/// Runs a compiled handler to completion and produces the final response.
///
/// An error that survived the whole chain replaces the written response
/// (unless it was committed) with the error's status and message.
pub async fn drive(handler: &BoxedHandler, mut ctx: Context) -> Response {
    if let Err(err) = handler.call(&mut ctx).await {
        ctx.fail(&err);
    }
    ctx.into_response()
}
