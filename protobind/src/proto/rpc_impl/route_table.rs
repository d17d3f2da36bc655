use crate::proto::rpc_types::descriptor::MethodShape;

/// One bound RPC method, ready for dispatch registration.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MethodRouteEntry {
    /// `/<package>.<Service>/<Operation>`
    pub full_path: String,
    pub service: String,
    pub method: String,
    pub request_type: String,
    pub response_type: String,
    pub shape: MethodShape,
}

/// Route entries sorted by full path, ordinal comparison.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RouteTable {
    entries: Vec<MethodRouteEntry>,
}

impl RouteTable {
    pub fn new(mut entries: Vec<MethodRouteEntry>) -> Self {
        entries.sort_by(|a, b| a.full_path.cmp(&b.full_path));
        Self { entries }
    }

    pub fn merge(&mut self, other: RouteTable) {
        self.entries.extend(other.entries);
        self.entries.sort_by(|a, b| a.full_path.cmp(&b.full_path));
    }

    pub fn lookup(&self, full_path: &str) -> Option<&MethodRouteEntry> {
        self.entries
            .binary_search_by(|e| e.full_path.as_str().cmp(full_path))
            .ok()
            .map(|idx| &self.entries[idx])
    }

    pub fn paths(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.full_path.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MethodRouteEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IntoIterator for RouteTable {
    type Item = MethodRouteEntry;
    type IntoIter = std::vec::IntoIter<MethodRouteEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(path: &str) -> MethodRouteEntry {
        let (service, method) = path[1..].split_once('/').unwrap();
        MethodRouteEntry {
            full_path: path.to_string(),
            service: service.to_string(),
            method: method.to_string(),
            request_type: ".google.protobuf.Empty".to_string(),
            response_type: ".google.protobuf.Empty".to_string(),
            shape: MethodShape::Unary,
        }
    }

    #[test]
    fn table_is_sorted_ordinally() {
        let mut table = RouteTable::new(vec![entry("/b.S/a"), entry("/a.S/b"), entry("/a.S/B")]);
        table.merge(RouteTable::new(vec![entry("/a.T/x")]));
        assert_eq!(table.paths(), vec!["/a.S/B", "/a.S/b", "/a.T/x", "/b.S/a"]);
        assert_eq!(table.lookup("/a.T/x").unwrap().method, "x");
        assert!(table.lookup("/a.T/y").is_none());
    }
}
