//! The insertion-ordered string interner (C2). The linker runs two
//! independent instances of this type: one for section-header names
//! (`.shstrtab`) and one for symbol names (the global `.strtab`).

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    offset: u32,
}

#[derive(Debug, Clone, Default)]
/// An insertion-ordered table mapping distinct strings to a stable index
/// and a byte offset into the table's serialized form.
///
/// Every serialized ELF string table begins with a `'\0'` byte at offset 0
/// (the "no name" sentinel every `st_name`/`sh_name` of 0 points at), so the
/// first interned string starts at offset 1.
pub struct StringTable {
    entries: Vec<Entry>,
}

impl StringTable {
    /// An empty table, as it exists before anything has been interned.
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern `value`, returning its index. Interning the same string twice
    /// returns the same index both times (spec §4.2, §8 idempotence).
    pub fn add(&mut self, value: &str) -> usize {
        if let Some(index) = self.entries.iter().position(|e| e.value == value) {
            return index;
        }
        let offset = self.entries.last().map_or(1, |last| {
            last.offset + last.value.len() as u32 + 1
        });
        self.entries.push(Entry {
            value: value.to_string(),
            offset,
        });
        self.entries.len() - 1
    }

    /// The string and byte offset at `index`, or `None` if out of range.
    pub fn get(&self, index: usize) -> Option<(&str, u32)> {
        self.entries.get(index).map(|e| (e.value.as_str(), e.offset))
    }

    /// The byte offset of the string at `index`, if any.
    pub fn offset_of(&self, index: usize) -> Option<u32> {
        self.entries.get(index).map(|e| e.offset)
    }

    /// Number of distinct strings interned so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no strings have been interned yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The total size, in bytes, of this table's serialized form: the
    /// leading `'\0'`, then every string plus its own null terminator.
    pub fn serialized_len(&self) -> usize {
        1 + self
            .entries
            .iter()
            .map(|e| e.value.len() + 1)
            .sum::<usize>()
    }

    /// Serialize this table: a leading `'\0'`, then every interned string
    /// (in insertion order) followed by its null terminator.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.serialized_len());
        bytes.push(0);
        for entry in &self.entries {
            bytes.extend_from_slice(entry.value.as_bytes());
            bytes.push(0);
        }
        bytes
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn first_string_lands_at_offset_one() {
        let mut table = StringTable::new();
        let idx = table.add(".text");
        assert_eq!(table.offset_of(idx), Some(1));
    }

    #[test]
    fn repeated_add_is_idempotent() {
        let mut table = StringTable::new();
        let first = table.add("main");
        let len_after_first = table.len();
        let second = table.add("main");
        assert_eq!(first, second);
        assert_eq!(table.len(), len_after_first);
    }

    #[test]
    fn distinct_strings_get_distinct_offsets() {
        let mut table = StringTable::new();
        let a = table.add(".text");
        let b = table.add(".data");
        let (_, off_a) = table.get(a).unwrap();
        let (_, off_b) = table.get(b).unwrap();
        assert_ne!(off_a, off_b);
        assert_eq!(off_b, off_a + ".text".len() as u32 + 1);
    }

    #[test]
    fn serialized_bytes_match_layout() {
        let mut table = StringTable::new();
        table.add("_start");
        let bytes = table.to_bytes();
        assert_eq!(bytes[0], 0);
        assert_eq!(&bytes[1..7], b"_start");
        assert_eq!(bytes[7], 0);
        assert_eq!(bytes.len(), table.serialized_len());
    }
}
