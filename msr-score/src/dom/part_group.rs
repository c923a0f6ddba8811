use super::{arena::Handle, part::Part, score::Score};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartGroupElement {
    Part(Handle<Part>),
    PartGroup(Handle<PartGroup>),
}

/// Bracketed group of parts. Groups nest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartGroup {
    handle: Handle<PartGroup>,
    number: i32,
    name: String,
    pub line: usize,
    pub(crate) elements: Vec<PartGroupElement>,
    parent: Option<Handle<PartGroup>>,
}
impl PartGroup {
    pub fn new(
        handle: Handle<PartGroup>,
        number: i32,
        name: impl Into<String>,
        parent: Option<Handle<PartGroup>>,
        line: usize,
    ) -> Self {
        Self {
            handle,
            number,
            name: name.into(),
            line,
            elements: Vec::new(),
            parent,
        }
    }
    pub fn handle(&self) -> Handle<PartGroup> {
        self.handle
    }
    pub fn number(&self) -> i32 {
        self.number
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn elements(&self) -> &[PartGroupElement] {
        &self.elements
    }
    pub fn parent(&self) -> Option<Handle<PartGroup>> {
        self.parent
    }
}

impl Score {
    /// New group, nested in `parent` or at the top of the score.
    pub fn create_part_group(
        &mut self,
        number: i32,
        name: &str,
        parent: Option<Handle<PartGroup>>,
        line: usize,
    ) -> Handle<PartGroup> {
        let group = self
            .part_groups
            .alloc_with(|h| PartGroup::new(h, number, name, parent, line));
        match parent {
            Some(parent) => self.part_groups[parent]
                .elements
                .push(PartGroupElement::PartGroup(group)),
            None => self.groups.push(group),
        }
        log::debug!("line {line}: part group {number} \"{name}\" created");
        group
    }

    /// Parts of the group and its nested groups, in order.
    pub fn part_group_parts(&self, group: Handle<PartGroup>) -> Vec<Handle<Part>> {
        self.part_groups[group]
            .elements
            .iter()
            .flat_map(|element| match element {
                PartGroupElement::Part(part) => vec![*part],
                PartGroupElement::PartGroup(nested) => self.part_group_parts(*nested),
            })
            .collect()
    }
}
