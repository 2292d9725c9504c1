//! Before and after hooks.
//!
//! Hooks run for every inbound message, across every descriptor that defines
//! one, in registration order. A hook that fails or panics is logged and
//! skipped; it never stops the remaining hooks or the matching loop.

use std::sync::Arc;

use tracing::{error, trace};

use crate::context::ExecutionContext;
use crate::descriptor::HandlerDescriptor;
use crate::handler::guarded;
use crate::registry::HandlerRegistry;

/// Runs hook phases over a registry.
#[derive(Debug, Clone, Copy, Default)]
pub struct HookRunner;

impl HookRunner {
    /// Runs every before hook. Returns the names of descriptors whose hook
    /// faulted.
    pub async fn run_before(
        registry: &HandlerRegistry,
        ctx: &Arc<ExecutionContext>,
    ) -> Vec<String> {
        let mut faulted = Vec::new();
        for descriptor in registry {
            let Some(hook) = descriptor.before() else {
                continue;
            };
            trace!(handler = descriptor.name(), "Running before hook");
            if let Err(fault) = guarded(hook(Arc::clone(ctx))).await {
                error!(handler = descriptor.name(), error = %fault, "Before hook failed");
                faulted.push(descriptor.name().to_string());
            }
        }
        faulted
    }

    /// Runs every after hook with the command that executed successfully,
    /// if any. Returns the names of descriptors whose hook faulted.
    pub async fn run_after(
        registry: &HandlerRegistry,
        ctx: &Arc<ExecutionContext>,
        executed: Option<&Arc<HandlerDescriptor>>,
    ) -> Vec<String> {
        let mut faulted = Vec::new();
        for descriptor in registry {
            let Some(hook) = descriptor.after() else {
                continue;
            };
            trace!(handler = descriptor.name(), "Running after hook");
            if let Err(fault) = guarded(hook(Arc::clone(ctx), executed.cloned())).await {
                error!(handler = descriptor.name(), error = %fault, "After hook failed");
                faulted.push(descriptor.name().to_string());
            }
        }
        faulted
    }
}
