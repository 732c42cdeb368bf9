use api::{ImplementationHandle, InterfaceId};
use std::collections::{HashMap, HashSet};

#[derive(Debug, thiserror::Error)]
#[error("No implementation registered for {0}")]
pub struct NotRegistered(pub InterfaceId);

/// Foreign implementations of one composite proxy, plus the signature keys
/// that are dispatched without waiting for a result.
///
/// The fire-and-forget set is shared by every interface in the table: two
/// interfaces declaring the same method shape share its blocking behaviour.
#[derive(Debug, Clone, Default)]
pub struct ImplementationTable {
    order: Vec<InterfaceId>,
    handles: HashMap<InterfaceId, ImplementationHandle>,
    async_methods: HashSet<String>,
}

impl ImplementationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last write wins for `interface`; `async_keys` are always added.
    pub fn put<I, K>(&mut self, interface: InterfaceId, handle: ImplementationHandle, async_keys: I)
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        if self.handles.insert(interface.clone(), handle).is_none() {
            self.order.push(interface);
        }
        self.async_methods
            .extend(async_keys.into_iter().map(Into::into));
    }

    pub fn get(&self, interface: &InterfaceId) -> Result<ImplementationHandle, NotRegistered> {
        self.handles
            .get(interface)
            .copied()
            .ok_or_else(|| NotRegistered(interface.clone()))
    }

    pub fn is_async(&self, signature: &str) -> bool {
        self.async_methods.contains(signature)
    }

    /// Interfaces in the order they were first added.
    pub fn interfaces(&self) -> impl Iterator<Item = &InterfaceId> {
        self.order.iter()
    }

    pub fn handles(&self) -> impl Iterator<Item = &ImplementationHandle> {
        self.order.iter().filter_map(|id| self.handles.get(id))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use api::{ChannelId, FunctionPointer};

    fn handle(channel: i64, pointer: i64) -> ImplementationHandle {
        ImplementationHandle::new(ChannelId(channel), FunctionPointer(pointer))
    }

    #[test]
    fn test_put_overwrites_and_keeps_first_position() {
        let mut table = ImplementationTable::new();
        table.put("a.A".into(), handle(1, 10), Vec::<String>::new());
        table.put("b.B".into(), handle(2, 20), Vec::<String>::new());
        table.put("a.A".into(), handle(3, 30), Vec::<String>::new());

        assert_eq!(table.len(), 2);
        assert_eq!(table.get(&"a.A".into()).unwrap(), handle(3, 30));
        let ids: Vec<_> = table.interfaces().map(|id| id.as_str()).collect();
        assert_eq!(ids, vec!["a.A", "b.B"]);
        let channels: Vec<_> = table.handles().map(|h| h.channel.0).collect();
        assert_eq!(channels, vec![3, 2]);
    }

    #[test]
    fn test_async_keys_are_shared_across_interfaces() {
        let mut table = ImplementationTable::new();
        table.put("a.A".into(), handle(1, 10), ["run()V"]);
        table.put("b.B".into(), handle(2, 20), ["stop()V"]);

        assert!(table.is_async("run()V"));
        assert!(table.is_async("stop()V"));
        assert!(!table.is_async("run()I"));
    }

    #[test]
    fn test_missing_interface() {
        let table = ImplementationTable::new();
        let err = table.get(&"x.X".into()).unwrap_err();
        assert_eq!(err.0.as_str(), "x.X");
    }
}
