//! Ordered resource rows with an id → row lookup.
//!
//! Rows keep discovery order. The lookup map is rebuilt in full after every
//! structural edit (see [`StructuralEdit`]), so a row number is only
//! meaningful until the next insert or remove.

use std::collections::HashMap;

use crate::resource::Resource;

#[derive(Debug, Default)]
pub struct ResourceIndex {
    rows: Vec<Resource>,
    rows_by_id: HashMap<String, usize>,
}

impl ResourceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn size(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn at(&self, row: usize) -> Option<&Resource> {
        self.rows.get(row)
    }

    pub fn find(&self, id: &str) -> Option<&Resource> {
        self.row_of(id).and_then(|row| self.rows.get(row))
    }

    pub fn row_of(&self, id: &str) -> Option<usize> {
        self.rows_by_id.get(id).copied()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.rows_by_id.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Resource> {
        self.rows.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().map(Resource::id)
    }

    /// Swaps the resource at `row` for `resource`, returning the old one.
    pub(crate) fn replace(&mut self, row: usize, resource: Resource) -> Option<Resource> {
        let slot = self.rows.get_mut(row)?;
        let old = std::mem::replace(slot, resource);
        self.rekey(row, old.id());
        Some(old)
    }

    /// Mutates the resource at `row` in place.
    ///
    /// If `f` changes the id (enable/disable), only that row's lookup entry
    /// is moved; the row count is unchanged so no rebuild is needed.
    pub(crate) fn update_row<R>(&mut self, row: usize, f: impl FnOnce(&mut Resource) -> R) -> Option<R> {
        let resource = self.rows.get_mut(row)?;
        let old_id = resource.id().to_string();
        let result = f(resource);
        self.rekey(row, &old_id);
        Some(result)
    }

    pub(crate) fn edit(&mut self) -> StructuralEdit<'_> {
        StructuralEdit { index: self }
    }

    fn rekey(&mut self, row: usize, old_id: &str) {
        let new_id = self.rows[row].id();
        if new_id != old_id {
            self.rows_by_id.remove(old_id);
            self.rows_by_id.insert(new_id.to_string(), row);
        }
    }

    fn rebuild(&mut self) {
        self.rows_by_id = self
            .rows
            .iter()
            .enumerate()
            .map(|(row, resource)| (resource.id().to_string(), row))
            .collect();
    }
}

/// Batch of inserts and removals; the lookup map is rebuilt once on drop.
///
/// While the edit is open, rows are addressed by position only.
pub(crate) struct StructuralEdit<'a> {
    index: &'a mut ResourceIndex,
}

impl StructuralEdit<'_> {
    /// Removes rows `first..=last`, returning them in order.
    pub(crate) fn remove_range(&mut self, first: usize, last: usize) -> Vec<Resource> {
        self.index.rows.drain(first..=last).collect()
    }

    /// Appends a row and returns its position.
    pub(crate) fn push(&mut self, resource: Resource) -> usize {
        self.index.rows.push(resource);
        self.index.rows.len() - 1
    }

    pub(crate) fn len(&self) -> usize {
        self.index.rows.len()
    }
}

impl Drop for StructuralEdit<'_> {
    fn drop(&mut self) {
        self.index.rebuild();
    }
}
