//! Connector registry - maps server kinds to connector factories.

use crate::connectors::{HttpBasicConnector, HttpTokenConnector};
use crate::directory::ExternalServer;
use squash_credentials::error::ConnectorError;
use squash_credentials::ConnectorShim;
use std::collections::HashMap;
use std::sync::Arc;

/// Creates a connector for one server of a given kind.
pub trait ConnectorFactory: Send + Sync {
    fn kind(&self) -> &str;

    fn create(&self, server: &ExternalServer) -> ConnectorShim;
}

/// Available connector factories, keyed by kind.
#[derive(Default)]
pub struct ConnectorRegistry {
    factories: HashMap<String, Arc<dyn ConnectorFactory>>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in HTTP connectors.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(HttpBasicFactory));
        registry.register(Arc::new(HttpTokenFactory));
        registry
    }

    /// Registers `factory`, replacing any factory of the same kind.
    pub fn register(&mut self, factory: Arc<dyn ConnectorFactory>) {
        self.factories.insert(factory.kind().to_string(), factory);
    }

    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.factories.keys().cloned().collect();
        kinds.sort();
        kinds
    }

    /// A fresh connector for `server`.
    pub fn connector_for(&self, server: &ExternalServer) -> Result<ConnectorShim, ConnectorError> {
        self.factories
            .get(&server.kind)
            .map(|factory| factory.create(server))
            .ok_or_else(|| ConnectorError::UnknownConnectorKind(server.kind.clone()))
    }
}

struct HttpBasicFactory;

impl ConnectorFactory for HttpBasicFactory {
    fn kind(&self) -> &str {
        HttpBasicConnector::KIND
    }

    fn create(&self, server: &ExternalServer) -> ConnectorShim {
        let mut connector = HttpBasicConnector::new(&server.url);
        if let Some(probe_path) = &server.probe_path {
            connector = connector.with_probe_path(probe_path);
        }
        ConnectorShim::Legacy(Arc::new(connector))
    }
}

struct HttpTokenFactory;

impl ConnectorFactory for HttpTokenFactory {
    fn kind(&self) -> &str {
        HttpTokenConnector::KIND
    }

    fn create(&self, server: &ExternalServer) -> ConnectorShim {
        let mut connector = HttpTokenConnector::new(&server.url);
        if let Some(probe_path) = &server.probe_path {
            connector = connector.with_probe_path(probe_path);
        }
        ConnectorShim::Modern(Arc::new(connector))
    }
}
