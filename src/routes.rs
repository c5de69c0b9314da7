// ABOUTME: Route records and the two-pass resolution used by the outbound carrier path
// ABOUTME: Carrier-tag matches take precedence over destination prefix matches

/// One routing rule. `endpoint` names the carrier handler to dispatch
/// through; `prefix` participates in the fallback scan when no route
/// matches the resolved carrier tag.
///
/// Every route dispatches through a carrier handler. Client-bound SMPP
/// delivery never consults the route table; it resolves through the
/// session registry instead.
#[derive(Clone, Debug)]
pub struct Route {
    pub prefix: String,
    pub endpoint: String,
}

impl Route {
    /// A tag-only route: matched by resolved carrier tag, never by prefix.
    pub fn carrier(endpoint: impl Into<String>) -> Route {
        Route {
            prefix: String::new(),
            endpoint: endpoint.into(),
        }
    }

    /// A prefix route: also reachable through the destination fallback.
    pub fn prefix(prefix: impl Into<String>, endpoint: impl Into<String>) -> Route {
        Route {
            prefix: prefix.into(),
            endpoint: endpoint.into(),
        }
    }
}

/// The gateway's route table, consulted by the carrier-bound path.
#[derive(Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn new(routes: Vec<Route>) -> RouteTable {
        RouteTable { routes }
    }

    /// Resolve a route for a message.
    ///
    /// First pass: routes whose endpoint equals the resolved carrier tag.
    /// Fallback: the first route whose prefix is a prefix of the
    /// destination number. Scan order is table order.
    pub fn resolve(&self, carrier: Option<&str>, destination: &str) -> Option<&Route> {
        if let Some(tag) = carrier {
            if let Some(route) = self.routes.iter().find(|r| r.endpoint == tag) {
                return Some(route);
            }
        }
        self.routes
            .iter()
            .find(|r| !r.prefix.is_empty() && destination.starts_with(&r.prefix))
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
