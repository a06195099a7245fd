//! Storage for decoded symbol bitmaps and symbol dictionary export lists.
//!
//! Every symbol bitmap lives exactly once in a [`SymbolStore`]. Dictionaries
//! only hold [`SymbolId`]s, so re-exporting an input symbol or referring to a
//! dictionary from several text regions never copies bitmaps.
//!
//! Dictionaries associated with a page are released once that page is
//! complete, and the symbols no remaining dictionary exports are freed.

use alloc::collections::{BTreeMap, BTreeSet};
use alloc::vec::Vec;

use crate::image::Image;

/// Index of a symbol bitmap in a [`SymbolStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct SymbolId(u32);

#[derive(Debug, Clone, Default)]
pub(crate) struct SymbolStore {
    symbols: Vec<Option<Image>>,
    /// Slots freed by [`SymbolStore::retain`], reused by the next pushes.
    free: Vec<u32>,
}

impl SymbolStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, symbol: Image) -> SymbolId {
        if let Some(slot) = self.free.pop() {
            self.symbols[slot as usize] = Some(symbol);
            return SymbolId(slot);
        }

        let id = SymbolId(self.symbols.len() as u32);
        self.symbols.push(Some(symbol));
        id
    }

    /// The symbol behind `id`, `None` if it has been freed.
    pub(crate) fn get(&self, id: SymbolId) -> Option<&Image> {
        self.symbols.get(id.0 as usize)?.as_ref()
    }

    /// The number of symbols currently stored.
    pub(crate) fn len(&self) -> usize {
        self.symbols.len() - self.free.len()
    }

    /// Free every symbol not in `live`.
    pub(crate) fn retain(&mut self, live: &BTreeSet<SymbolId>) {
        for (index, slot) in self.symbols.iter_mut().enumerate() {
            let id = SymbolId(index as u32);

            if slot.is_some() && !live.contains(&id) {
                *slot = None;
                self.free.push(id.0);
            }
        }
    }
}

#[derive(Debug, Clone)]
struct Dictionary {
    page_association: u32,
    exports: Vec<SymbolId>,
}

/// The export lists of all live symbol dictionaries, by segment number.
#[derive(Debug, Clone, Default)]
pub(crate) struct Dictionaries {
    dictionaries: BTreeMap<u32, Dictionary>,
}

impl Dictionaries {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(
        &mut self,
        segment_number: u32,
        page_association: u32,
        exports: Vec<SymbolId>,
    ) {
        self.dictionaries.insert(
            segment_number,
            Dictionary {
                page_association,
                exports,
            },
        );
    }

    /// Concatenate the export lists of the referred-to dictionaries.
    ///
    /// "SDINSYMS = the concatenation of all the symbols exported by the
    /// referred-to symbol dictionary segments, in the order in which they are
    /// referred to" (7.4.2.2). Each list already contains whatever its
    /// dictionary re-exported from its own inputs, so only direct references
    /// are followed. A dictionary referred to twice contributes its symbols
    /// twice. Referred-to segments that are not dictionaries are skipped.
    pub(crate) fn collect(&self, referred_to: &[u32]) -> Vec<SymbolId> {
        referred_to
            .iter()
            .filter_map(|segment| self.dictionaries.get(segment))
            .flat_map(|dictionary| dictionary.exports.iter().copied())
            .collect()
    }

    /// Drop the dictionaries associated with `page`, returning how many
    /// were dropped. Dictionaries without a page (association 0) stay.
    pub(crate) fn release_page(&mut self, page: u32) -> usize {
        if page == 0 {
            return 0;
        }

        let before = self.dictionaries.len();
        self.dictionaries
            .retain(|_, dictionary| dictionary.page_association != page);

        before - self.dictionaries.len()
    }

    /// Every symbol some dictionary still exports.
    pub(crate) fn live_symbols(&self) -> BTreeSet<SymbolId> {
        self.dictionaries
            .values()
            .flat_map(|dictionary| dictionary.exports.iter().copied())
            .collect()
    }
}
