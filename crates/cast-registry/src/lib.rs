//! Template Registry (`spec.md` §4.E): interns `Template`s into small,
//! dense, first-seen-order integer IDs, with an O(1) amortized lookup keyed
//! on the template's canonical byte sequence.

use ahash::AHashMap;
use cast_tokenizer::Template;

/// Default cap on distinct templates per block; exceeding it seals the
/// block early (`spec.md` §3, §4.E).
pub const MAX_TEMPLATES: usize = 65_535;

pub type TemplateId = u32;

#[derive(Debug, Default)]
pub struct TemplateRegistry {
    by_key: AHashMap<Vec<u8>, TemplateId>,
    by_id: Vec<Template>,
    cap: usize,
}

/// Returned by `intern` when inserting the template would exceed `cap`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryOverflow;

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::with_cap(MAX_TEMPLATES)
    }

    pub fn with_cap(cap: usize) -> Self {
        Self { by_key: AHashMap::new(), by_id: Vec::new(), cap }
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Looks up `template`, assigning it the next dense ID in first-seen
    /// order on a miss. Returns `Err(RegistryOverflow)` without mutating the
    /// registry if `template` is new and the registry is already at `cap`.
    pub fn intern(&mut self, template: &Template) -> Result<TemplateId, RegistryOverflow> {
        let key = template.key_bytes();
        if let Some(&id) = self.by_key.get(&key) {
            return Ok(id);
        }
        if self.by_id.len() >= self.cap {
            return Err(RegistryOverflow);
        }
        let id = self.by_id.len() as TemplateId;
        self.by_id.push(template.clone());
        self.by_key.insert(key, id);
        Ok(id)
    }

    pub fn get(&self, id: TemplateId) -> Option<&Template> {
        self.by_id.get(id as usize)
    }

    /// Templates in ID (first-seen) order, as required by the on-disk
    /// `TEMPLATE_TABLE` layout.
    pub fn templates_in_order(&self) -> &[Template] {
        &self.by_id
    }

    /// Rebuilds a registry from an ordered template list, as read back from
    /// the on-disk `TEMPLATE_TABLE` during decompression. IDs are assigned
    /// densely by position, matching how they were written.
    pub fn from_ordered(templates: Vec<Template>) -> Self {
        let mut by_key = AHashMap::with_capacity(templates.len());
        for (i, t) in templates.iter().enumerate() {
            by_key.insert(t.key_bytes(), i as TemplateId);
        }
        Self { by_key, cap: templates.len().max(MAX_TEMPLATES), by_id: templates }
    }
}
