use rustc_hash::FxHashMap;

/// A named location in the code.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Label {
    pub name: String,
    /// Location counter value at the point of definition.
    pub address: u16,
}

/// Label name -> address, filled in as the assembler walks the tokens.
#[derive(Debug, Default, Clone)]
pub struct LabelTable {
    labels: FxHashMap<String, Label>,
}

impl LabelTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defines a label. Returns the previous definition if the name was already taken,
    /// in which case the table is left unchanged.
    pub fn define(&mut self, name: &str, address: u16) -> Option<&Label> {
        if self.labels.contains_key(name) {
            return self.labels.get(name);
        }
        self.labels.insert(
            name.to_owned(),
            Label {
                name: name.to_owned(),
                address,
            },
        );
        None
    }

    /// Exact-match lookup.
    pub fn resolve(&self, name: &str) -> Option<u16> {
        self.labels.get(name).map(|l| l.address)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// All labels, sorted by address then name.
    pub fn sorted(&self) -> Vec<&Label> {
        let mut v: Vec<_> = self.labels.values().collect();
        v.sort_by(|a, b| a.address.cmp(&b.address).then_with(|| a.name.cmp(&b.name)));
        v
    }
}
