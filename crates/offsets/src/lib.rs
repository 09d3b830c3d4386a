use std::collections::{BTreeMap, HashMap};

/// In-memory map from stream id to the byte offsets of that stream's
/// elements, in append order.
///
/// Element `i` of a stream is `offsets[stream][i]`, so lookups by
/// `(stream, index)` are a hash probe plus a positional index. Entries are
/// never removed individually; the whole index is dropped with [`clear`].
///
/// [`clear`]: OffsetIndex::clear
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OffsetIndex {
    streams: HashMap<u64, Vec<u64>>,
    total: usize,
}

impl OffsetIndex {
    pub fn new() -> Self {
        Self {
            streams: HashMap::new(),
            total: 0,
        }
    }

    /// Records `offset` as the next element of `stream` and returns its
    /// element index.
    pub fn push(&mut self, stream: u64, offset: u64) -> usize {
        let list = self.streams.entry(stream).or_default();
        list.push(offset);
        self.total += 1;
        list.len() - 1
    }

    /// Byte offset of element `index` of `stream`, if it exists.
    pub fn get(&self, stream: u64, index: usize) -> Option<u64> {
        self.streams.get(&stream).and_then(|l| l.get(index).copied())
    }

    /// Number of elements appended to `stream` (0 if it has none).
    pub fn count(&self, stream: u64) -> usize {
        self.streams.get(&stream).map_or(0, Vec::len)
    }

    pub fn contains(&self, stream: u64) -> bool {
        self.streams.contains_key(&stream)
    }

    /// All offsets of `stream`, in append order.
    pub fn offsets(&self, stream: u64) -> Option<&[u64]> {
        self.streams.get(&stream).map(Vec::as_slice)
    }

    /// Number of streams with at least one element.
    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    /// Number of elements across all streams.
    pub fn total_elements(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    pub fn clear(&mut self) {
        self.streams.clear();
        self.total = 0;
    }

    /// Unordered iterator over `(stream, offsets)`.
    pub fn iter(&self) -> impl Iterator<Item = (u64, &[u64])> {
        self.streams.iter().map(|(s, l)| (*s, l.as_slice()))
    }

    /// Sorted copy of the index, for deterministic serialization.
    pub fn to_sorted(&self) -> BTreeMap<u64, Vec<u64>> {
        self.iter().map(|(s, l)| (s, l.to_vec())).collect()
    }
}

impl FromIterator<(u64, Vec<u64>)> for OffsetIndex {
    /// Builds an index from `(stream, offsets)` pairs. Streams with an empty
    /// offset list are dropped so that `contains` keeps meaning "has
    /// elements". A repeated stream id extends the earlier list.
    fn from_iter<I: IntoIterator<Item = (u64, Vec<u64>)>>(iter: I) -> Self {
        let mut index = Self::new();
        for (stream, offsets) in iter {
            if offsets.is_empty() {
                continue;
            }
            index.total += offsets.len();
            index.streams.entry(stream).or_default().extend(offsets);
        }
        index
    }
}
