//! Per-case context handed to hooks and case bodies.

use std::{collections::HashMap, fmt, sync::Arc};

use log::warn;

use crate::{client::Client, error::InjectionError, extensions::Extensions, server::ServerHandle};

/// A value injected into a case at a declared marker.
pub enum Injected {
    /// The group's running server.
    Server(Arc<ServerHandle>),
    /// A client created for this case.
    Client(Box<dyn Client>),
}

impl fmt::Debug for Injected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Server(server) => f.debug_tuple("Server").field(server).finish(),
            Self::Client(client) => f.debug_tuple("Client").field(client).finish(),
        }
    }
}

/// State visible to one case.
///
/// The server is lent for the duration of the case. Injected values are
/// looked up by the marker declared on the group descriptor, never by type
/// alone.
#[derive(Debug)]
pub struct CaseContext {
    group: String,
    case: String,
    server: Arc<ServerHandle>,
    injected: HashMap<String, Injected>,
    extensions: Extensions,
}

impl CaseContext {
    /// Create a context for `case` of `group`.
    #[must_use]
    pub fn new(group: impl Into<String>, case: impl Into<String>, server: Arc<ServerHandle>) -> Self {
        Self {
            group: group.into(),
            case: case.into(),
            server,
            injected: HashMap::new(),
            extensions: Extensions::default(),
        }
    }

    /// Name of the group.
    #[must_use]
    pub fn group_name(&self) -> &str { &self.group }

    /// Name of the case.
    #[must_use]
    pub fn case_name(&self) -> &str { &self.case }

    /// The group's server.
    #[must_use]
    pub fn server(&self) -> &ServerHandle { &self.server }

    /// Shared pointer to the group's server.
    #[must_use]
    pub fn shared_server(&self) -> &Arc<ServerHandle> { &self.server }

    /// Inject `value` at `marker`, replacing any previous value.
    pub fn inject(&mut self, marker: impl Into<String>, value: Injected) {
        self.injected.insert(marker.into(), value);
    }

    /// Whether a value was injected at `marker`.
    #[must_use]
    pub fn is_injected(&self, marker: &str) -> bool { self.injected.contains_key(marker) }

    /// The server injected at `marker`.
    #[must_use]
    pub fn server_at(&self, marker: &str) -> Option<&Arc<ServerHandle>> {
        match self.injected.get(marker)? {
            Injected::Server(server) => Some(server),
            Injected::Client(_) => None,
        }
    }

    /// The client of type `C` injected at `marker`.
    #[must_use]
    pub fn client<C: Client>(&self, marker: &str) -> Option<&C> {
        match self.injected.get(marker)? {
            Injected::Client(client) => (**client).as_any().downcast_ref::<C>(),
            Injected::Server(_) => None,
        }
    }

    /// Case-scoped extensions.
    #[must_use]
    pub fn extensions(&self) -> &Extensions { &self.extensions }

    /// Mutable case-scoped extensions.
    pub fn extensions_mut(&mut self) -> &mut Extensions { &mut self.extensions }

    /// Close and drop every injected client, returning the close failures.
    pub(crate) fn release_injected(&mut self) -> Vec<InjectionError> {
        let mut errors = Vec::new();
        for (marker, value) in self.injected.drain() {
            if let Injected::Client(mut client) = value
                && let Err(source) = client.close()
            {
                warn!(
                    "failed to close client: case={}, marker={marker}, error={source}",
                    self.case
                );
                errors.push(InjectionError::ClientClose { marker, source });
            }
        }
        errors
    }
}
