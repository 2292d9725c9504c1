//! The handler registry.
//!
//! A [`HandlerRegistry`] is an immutable, ordered collection of
//! [`HandlerDescriptor`]s. Order is significant: hooks run and commands are
//! matched in registration order, and the first matching command wins.
//!
//! Descriptors can be registered explicitly through [`RegistryBuilder`], or
//! contributed from anywhere in the binary with [`submit_handler!`] and
//! collected by [`HandlerRegistry::linked`].

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use linkme::distributed_slice;
use tracing::{debug, info};

use crate::descriptor::HandlerDescriptor;
use crate::error::{RegistryError, RegistryResult};

// =============================================================================
// Link-time registration
// =============================================================================

/// A descriptor contributed at link time by [`submit_handler!`].
pub struct LinkedHandler {
    /// Source file of the submission, used for ordering.
    pub file: &'static str,
    /// Source line of the submission, used for ordering.
    pub line: u32,
    /// Constructor for the descriptor.
    pub build: fn() -> HandlerDescriptor,
}

/// All descriptors contributed with [`submit_handler!`].
#[distributed_slice]
pub static HANDLERS: [LinkedHandler];

/// Contributes a descriptor constructor to [`HandlerRegistry::linked`].
///
/// ```rust,ignore
/// fn ping() -> HandlerDescriptor {
///     HandlerDescriptor::builder("ping")
///         .command("ping")
///         .execute(|_ctx| async { "pong" })
///         .build()
/// }
///
/// submit_handler!(ping);
/// ```
#[macro_export]
macro_rules! submit_handler {
    ($build:path) => {
        const _: () = {
            #[$crate::linkme::distributed_slice($crate::registry::HANDLERS)]
            #[linkme(crate = $crate::linkme)]
            static LINKED_HANDLER: $crate::registry::LinkedHandler =
                $crate::registry::LinkedHandler {
                    file: file!(),
                    line: line!(),
                    build: $build,
                };
        };
    };
}

// =============================================================================
// HandlerRegistry
// =============================================================================

/// Immutable, ordered collection of handler descriptors.
#[derive(Debug, Clone)]
pub struct HandlerRegistry {
    handlers: Vec<Arc<HandlerDescriptor>>,
}

impl HandlerRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Builds a registry from every [`submit_handler!`] contribution in the
    /// binary, ordered by source file and line.
    pub fn linked() -> RegistryResult<Self> {
        let mut entries: Vec<&LinkedHandler> = HANDLERS.iter().collect();
        entries.sort_by(|a, b| (a.file, a.line).cmp(&(b.file, b.line)));
        debug!(count = entries.len(), "Collecting linked handlers");

        entries
            .into_iter()
            .fold(RegistryBuilder::default(), |builder, entry| {
                builder.register((entry.build)())
            })
            .build()
    }

    /// Iterates descriptors in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<HandlerDescriptor>> {
        self.handlers.iter()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Looks a descriptor up by name.
    pub fn get(&self, name: &str) -> Option<&Arc<HandlerDescriptor>> {
        self.handlers.iter().find(|h| h.name() == name)
    }

    /// Groups command descriptors by category, for menus. Descriptors without
    /// a category are filed under `"misc"`. Passive handlers are skipped.
    pub fn by_category(&self) -> BTreeMap<&str, Vec<&Arc<HandlerDescriptor>>> {
        let mut map: BTreeMap<&str, Vec<&Arc<HandlerDescriptor>>> = BTreeMap::new();
        for handler in self.handlers.iter().filter(|h| h.is_command()) {
            map.entry(handler.category().unwrap_or("misc"))
                .or_default()
                .push(handler);
        }
        map
    }
}

impl<'a> IntoIterator for &'a HandlerRegistry {
    type Item = &'a Arc<HandlerDescriptor>;
    type IntoIter = std::slice::Iter<'a, Arc<HandlerDescriptor>>;

    fn into_iter(self) -> Self::IntoIter {
        self.handlers.iter()
    }
}

// =============================================================================
// RegistryBuilder
// =============================================================================

/// Collects descriptors and validates them into a [`HandlerRegistry`].
#[derive(Default)]
pub struct RegistryBuilder {
    handlers: Vec<HandlerDescriptor>,
}

impl RegistryBuilder {
    /// Appends a descriptor. Registration order is preserved.
    pub fn register(mut self, descriptor: HandlerDescriptor) -> Self {
        self.handlers.push(descriptor);
        self
    }

    /// Appends several descriptors in iteration order.
    pub fn extend(mut self, descriptors: impl IntoIterator<Item = HandlerDescriptor>) -> Self {
        self.handlers.extend(descriptors);
        self
    }

    /// Validates and freezes the registry.
    ///
    /// Fails when the registry is empty, when a name is empty, contains
    /// whitespace, or is repeated, or when a descriptor declares an empty token.
    pub fn build(self) -> RegistryResult<HandlerRegistry> {
        if self.handlers.is_empty() {
            return Err(RegistryError::Empty);
        }

        let mut seen = HashSet::with_capacity(self.handlers.len());
        for handler in &self.handlers {
            let name = handler.name();
            if name.is_empty() || name.chars().any(char::is_whitespace) {
                return Err(RegistryError::InvalidName(name.to_string()));
            }
            if !seen.insert(name) {
                return Err(RegistryError::DuplicateName(name.to_string()));
            }
            if handler.tokens().iter().any(|t| t.is_empty()) {
                return Err(RegistryError::EmptyToken(name.to_string()));
            }
        }

        info!(count = self.handlers.len(), "Handler registry built");
        Ok(HandlerRegistry {
            handlers: self.handlers.into_iter().map(Arc::new).collect(),
        })
    }
}
