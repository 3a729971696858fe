//! Binding relocation records emitted by the rewrite passes.
//!
//! Splitting a binding changes the pipeline-layout contract of the module, so
//! each pass reports what it did as a map from original `(set, binding)` to
//! the replacement bindings and their roles. Callers use this to rebuild
//! descriptor-set layouts; a binding with no entry was left untouched.

use std::collections::{BTreeMap, BTreeSet};

/// A `(descriptor set, binding)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BindingLocation {
    /// Descriptor set number.
    pub set: u32,
    /// Binding number within the set.
    pub binding: u32,
}

impl BindingLocation {
    /// Builds a location from its set and binding numbers.
    pub fn new(set: u32, binding: u32) -> Self {
        BindingLocation { set, binding }
    }
}

/// What a replacement binding holds after a split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingRole {
    /// The bare image half of a split combined image sampler, or the
    /// non-comparison half of a mixed-use depth split.
    Texture,
    /// The bare sampler half of a split combined image sampler.
    Sampler,
    /// A texture retyped (or duplicated) to the explicit depth-comparison
    /// form.
    DepthComparisonTexture,
}

/// One replacement binding produced by splitting an original binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Correction {
    /// Where the replacement binding lives.
    pub location: BindingLocation,
    /// What the replacement binding holds.
    pub role: BindingRole,
}

/// Relocation record built by a single pass invocation.
///
/// Entries are appended while the pass runs and are read-only afterwards.
/// The map is an ordinary owned value: dropping it releases it, and it is
/// independent of the output module buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorrectionMap {
    entries: BTreeMap<BindingLocation, Vec<Correction>>,
}

impl CorrectionMap {
    /// The corrections for `original`, or an empty slice if that binding was
    /// untouched by the pass.
    pub fn lookup(&self, original: BindingLocation) -> &[Correction] {
        self.entries.get(&original).map(Vec::as_slice).unwrap_or(&[])
    }

    /// True when the pass changed nothing.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of original bindings with at least one correction.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Iterates entries in ascending `(set, binding)` order of the original.
    pub fn iter(&self) -> impl Iterator<Item = (BindingLocation, &[Correction])> {
        self.entries.iter().map(|(k, v)| (*k, v.as_slice()))
    }

    pub(crate) fn record(&mut self, original: BindingLocation, correction: Correction) {
        self.entries.entry(original).or_default().push(correction);
    }
}

/// Deterministic allocator for the binding numbers of synthesized variables.
///
/// Convention (shared by both passes, and part of the external contract the
/// caller's pipeline-layout reconciliation must mirror): a synthesized
/// binding stays in the same descriptor set as the original and takes the
/// smallest binding number strictly greater than the original's that is not
/// used by any pre-existing binding in that set nor by a binding this pass
/// already assigned.
#[derive(Debug, Default)]
pub struct BindingAllocator {
    used: BTreeMap<u32, BTreeSet<u32>>,
}

impl BindingAllocator {
    /// Seeds the allocator with every `(set, binding)` already present.
    pub fn new(existing: impl IntoIterator<Item = (u32, u32)>) -> Self {
        let mut used: BTreeMap<u32, BTreeSet<u32>> = BTreeMap::new();
        for (set, binding) in existing {
            used.entry(set).or_default().insert(binding);
        }
        BindingAllocator { used }
    }

    /// Allocates the next free binding in `set` above `original_binding`.
    pub fn allocate_above(&mut self, set: u32, original_binding: u32) -> u32 {
        let bindings = self.used.entry(set).or_default();
        let mut candidate = original_binding.wrapping_add(1);
        while bindings.contains(&candidate) {
            candidate = candidate.wrapping_add(1);
        }
        bindings.insert(candidate);
        candidate
    }
}
