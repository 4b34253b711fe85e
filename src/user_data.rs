//! Application data attached to nodes.
//!
//! Each node can carry any number of values under string keys. A value
//! may come with a handler that is told when its node is cloned,
//! imported into another document or renamed, so the application can
//! decide what the copy should carry. Handlers run with no part of the
//! tree borrowed.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use log::trace;

use super::dom::{Document, Node};
use super::raw::NodeId;

pub type UserData = Rc<dyn Any>;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum UserDataOperation {
    Cloned,
    Imported,
    Renamed,
}

pub trait UserDataHandler {
    /// `source` is the node the data is attached to; `destination` is
    /// the new copy, or the node itself after a rename.
    fn handle(
        &self,
        operation: UserDataOperation,
        key: &str,
        data: &UserData,
        source: Node<'_>,
        destination: Node<'_>,
    );
}

impl<F> UserDataHandler for F
    where F: Fn(UserDataOperation, &str, &UserData, Node<'_>, Node<'_>)
{
    fn handle(
        &self,
        operation: UserDataOperation,
        key: &str,
        data: &UserData,
        source: Node<'_>,
        destination: Node<'_>,
    ) {
        self(operation, key, data, source, destination)
    }
}

#[derive(Clone)]
struct Record {
    data: UserData,
    handler: Option<Rc<dyn UserDataHandler>>,
}

#[derive(Default)]
pub struct UserDataTable {
    nodes: HashMap<NodeId, HashMap<String, Record>>,
}

impl UserDataTable {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn set(
        &mut self,
        node: NodeId,
        key: &str,
        data: UserData,
        handler: Option<Rc<dyn UserDataHandler>>,
    ) -> Option<UserData> {
        self.nodes.entry(node).or_default()
            .insert(key.to_owned(), Record { data, handler })
            .map(|previous| previous.data)
    }

    pub fn get(&self, node: NodeId, key: &str) -> Option<UserData> {
        self.nodes.get(&node)?.get(key).map(|r| r.data.clone())
    }

    pub fn remove(&mut self, node: NodeId, key: &str) -> Option<UserData> {
        let records = self.nodes.get_mut(&node)?;
        let removed = records.remove(key);
        if records.is_empty() {
            self.nodes.remove(&node);
        }
        removed.map(|r| r.data)
    }

    fn handlers(&self, node: NodeId) -> Vec<(String, UserData, Rc<dyn UserDataHandler>)> {
        let records = match self.nodes.get(&node) {
            Some(records) => records,
            None => return Vec::new(),
        };
        let mut handlers: Vec<_> = records.iter()
            .filter_map(|(key, r)| r.handler.clone().map(|h| (key.clone(), r.data.clone(), h)))
            .collect();
        handlers.sort_by(|a, b| a.0.cmp(&b.0));
        handlers
    }
}

impl fmt::Debug for UserDataTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserDataTable {{ {} nodes }}", self.nodes.len())
    }
}

/// Tell the handlers of every source node in `pairs` about its copy.
/// Handlers of one node run in key order.
pub(crate) fn run_handlers(
    source: Document<'_>,
    destination: Document<'_>,
    operation: UserDataOperation,
    pairs: &[(NodeId, NodeId)],
) {
    for &(from, to) in pairs {
        let handlers = source.user_data_table().borrow().handlers(from);
        if handlers.is_empty() {
            continue;
        }
        let (from, to) = (source.wrap(from), destination.wrap(to));
        for (key, data, handler) in handlers {
            trace!(target: "dom.user_data", "{:?} {:?} under {:?}", operation, from, key);
            handler.handle(operation, &key, &data, from, to);
        }
    }
}
