use rigging_common::value::ConfigMap;
use rigging_registry::sequence::NormalizedSequenceEntry;

/// Pairs runtime instances of one plugin type with that plugin's
/// sequence entries. Each entry binds at most once; consumption state
/// lives for a single resolution pass.
pub struct EntryMatcher<'a> {
    entries: &'a [NormalizedSequenceEntry],
    consumed: Vec<bool>,
}

impl<'a> EntryMatcher<'a> {
    pub fn new(entries: &'a [NormalizedSequenceEntry]) -> Self {
        EntryMatcher {
            entries,
            consumed: vec![false; entries.len()],
        }
    }

    /// Finds the best entry for one instance and marks it consumed.
    ///
    /// With an override config, every unconsumed entry is scored by the
    /// number of override keys exactly equal to the entry's config
    /// values; the highest scorer wins, ties broken by lowest position.
    /// With no override, or when nothing scores above zero, the entry at
    /// the instance's occurrence index is taken if still free.
    pub fn best_match(
        &mut self,
        override_config: Option<&ConfigMap>,
        occurrence_index: usize,
    ) -> Option<&'a NormalizedSequenceEntry> {
        if let Some(overrides) = override_config {
            let mut best: Option<(usize, usize)> = None;
            for (i, entry) in self.entries.iter().enumerate() {
                if self.consumed[i] {
                    continue;
                }
                let score = overrides
                    .iter()
                    .filter(|(key, value)| entry.config.get(*key) == Some(value))
                    .count();
                if score > 0 && best.map(|(_, s)| score > s).unwrap_or(true) {
                    best = Some((i, score));
                }
            }
            if let Some((i, _)) = best {
                self.consumed[i] = true;
                return Some(&self.entries[i]);
            }
        }

        match self.consumed.get(occurrence_index) {
            Some(false) => {
                self.consumed[occurrence_index] = true;
                Some(&self.entries[occurrence_index])
            }
            _ => None,
        }
    }
}
