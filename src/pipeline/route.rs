use crate::buffer::DroppingProducer;
use crate::domain::{Level, LogEvent};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Where a logger's events go: the queue of the pipeline that owns its name.
#[derive(Debug, Clone)]
pub struct Route {
    pub producer: DroppingProducer<LogEvent>,
    pub threshold: Level,
    pub trace_level: Level,
}

/// Pipeline name to route. Read on every logging call, written only by
/// configure and shutdown.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: HashMap<String, Route>,
}

pub type SharedRoutes = Arc<RwLock<RouteTable>>;

impl RouteTable {
    pub fn insert(&mut self, name: &str, route: Route) {
        self.routes.insert(name.to_string(), route);
    }

    pub fn remove(&mut self, name: &str) -> Option<Route> {
        self.routes.remove(name)
    }

    /// The route for `name` or for its longest dotted prefix that has one:
    /// `app.db.pool` falls back to `app.db`, then `app`.
    pub fn lookup(&self, name: &str) -> Option<&Route> {
        let mut candidate = name;
        loop {
            if let Some(route) = self.routes.get(candidate) {
                return Some(route);
            }
            let (parent, _) = candidate.rsplit_once('.')?;
            candidate = parent;
        }
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::channel;

    fn route(threshold: Level) -> Route {
        let (producer, _consumer) = channel(1, "Queue full");
        Route {
            producer,
            threshold,
            trace_level: Level::TRACE,
        }
    }

    #[test]
    fn test_longest_prefix_wins() {
        let mut table = RouteTable::default();
        table.insert("app", route(Level::DEBUG));
        table.insert("app.db", route(Level::ERROR));

        assert_eq!(table.lookup("app.db.pool").unwrap().threshold, Level::ERROR);
        assert_eq!(table.lookup("app.http").unwrap().threshold, Level::DEBUG);
        assert_eq!(table.lookup("app").unwrap().threshold, Level::DEBUG);
        assert!(table.lookup("application").is_none());
        assert!(table.lookup("other.app").is_none());
    }
}
