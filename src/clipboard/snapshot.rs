//! Capture and restore of the full clipboard contents
//!
//! A snapshot holds every item and every type the pasteboard exposes, so the
//! clipboard can be borrowed for a synthetic copy and handed back unchanged.

use tracing::{debug, trace, warn};

/// Plain UTF-8 text type tag
pub const PLAIN_TEXT_TYPE: &str = "public.utf8-plain-text";
/// HTML type tag
pub const HTML_TYPE: &str = "public.html";
/// Rich text format type tag
pub const RTF_TYPE: &str = "public.rtf";

/// One representation of a pasteboard item
#[derive(Debug, Clone, PartialEq)]
pub enum PasteboardValue {
    /// Raw bytes, the preferred representation
    Data(Vec<u8>),
    /// Text, when the type is only readable as a string
    String(String),
    /// Structured property list, when neither of the above is available
    PropertyList(serde_json::Value),
}

/// A single pasteboard item: type tag → value, in the order the types were reported
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PasteboardItem {
    entries: Vec<(String, PasteboardValue)>,
}

impl PasteboardItem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, replacing an existing entry of the same type
    pub fn with(mut self, type_tag: impl Into<String>, value: PasteboardValue) -> Self {
        self.insert(type_tag, value);
        self
    }

    pub fn insert(&mut self, type_tag: impl Into<String>, value: PasteboardValue) {
        let type_tag = type_tag.into();
        match self.entries.iter().position(|(t, _)| *t == type_tag) {
            Some(pos) => self.entries[pos].1 = value,
            None => self.entries.push((type_tag, value)),
        }
    }

    pub fn get(&self, type_tag: &str) -> Option<&PasteboardValue> {
        self.entries
            .iter()
            .find(|(t, _)| t == type_tag)
            .map(|(_, v)| v)
    }

    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(t, _)| t.as_str())
    }

    pub fn entries(&self) -> &[(String, PasteboardValue)] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Errors raised by pasteboard writes
#[derive(Debug, thiserror::Error)]
pub enum PasteboardError {
    #[error("pasteboard rejected the written items")]
    Rejected,
}

/// Access to a multi-item, multi-type clipboard
pub trait Pasteboard: Send {
    /// Number of items currently on the pasteboard
    fn item_count(&self) -> usize;

    /// Type tags of the item at `index`, in preference order
    fn types(&self, index: usize) -> Vec<String>;

    /// Read a type as raw bytes
    fn data(&self, index: usize, type_tag: &str) -> Option<Vec<u8>>;

    /// Read a type as a string
    fn string(&self, index: usize, type_tag: &str) -> Option<String>;

    /// Read a type as a structured property list
    fn property_list(&self, index: usize, type_tag: &str) -> Option<serde_json::Value>;

    /// Counter that changes whenever the pasteboard contents change
    fn change_count(&self) -> i64;

    /// Remove every item
    fn clear(&mut self) -> Result<(), PasteboardError>;

    /// Append items; callers clear first when replacing contents.
    ///
    /// Types an item cannot hold are skipped, and items left without any
    /// type are dropped. Fails only when the items are refused as a whole.
    fn write(&mut self, items: &[PasteboardItem]) -> Result<(), PasteboardError>;
}

/// Full copy of the pasteboard contents at one point in time
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PasteboardSnapshot {
    items: Vec<PasteboardItem>,
}

impl PasteboardSnapshot {
    pub fn items(&self) -> &[PasteboardItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Read every item and type from the pasteboard.
    ///
    /// Each type is read as bytes if possible, else as a string, else as a
    /// property list. Types unreadable in all three forms are skipped.
    pub fn capture<P: Pasteboard + ?Sized>(pasteboard: &P) -> Self {
        let count = pasteboard.item_count();
        let mut items = Vec::with_capacity(count);

        for index in 0..count {
            let mut item = PasteboardItem::new();
            for type_tag in pasteboard.types(index) {
                match read_value(pasteboard, index, &type_tag) {
                    Some(value) => item.insert(type_tag, value),
                    None => trace!(index, %type_tag, "pasteboard type unreadable, skipped"),
                }
            }
            if item.is_empty() {
                trace!(index, "pasteboard item has no readable type, skipped");
                continue;
            }
            items.push(item);
        }

        debug!(items = items.len(), "captured pasteboard snapshot");
        Self { items }
    }

    /// Replace the pasteboard contents with this snapshot.
    ///
    /// An empty snapshot leaves the pasteboard empty. When the items are
    /// refused together, each is written on its own so one bad item does not
    /// cost the rest; an error is returned only if none could be written.
    pub fn restore<P: Pasteboard + ?Sized>(&self, pasteboard: &mut P) -> Result<(), PasteboardError> {
        pasteboard.clear()?;
        if self.items.is_empty() {
            debug!("restored empty pasteboard");
            return Ok(());
        }

        if let Err(e) = pasteboard.write(&self.items) {
            warn!(?e, "pasteboard refused snapshot, restoring item by item");
            return self.restore_each(pasteboard);
        }
        debug!(items = self.items.len(), "restored pasteboard snapshot");
        Ok(())
    }

    fn restore_each<P: Pasteboard + ?Sized>(&self, pasteboard: &mut P) -> Result<(), PasteboardError> {
        pasteboard.clear()?;
        let mut restored = 0;
        for (index, item) in self.items.iter().enumerate() {
            match pasteboard.write(std::slice::from_ref(item)) {
                Ok(()) => restored += 1,
                Err(e) => warn!(?e, index, "pasteboard item could not be restored"),
            }
        }
        if restored == 0 {
            return Err(PasteboardError::Rejected);
        }
        debug!(restored, items = self.items.len(), "partially restored pasteboard snapshot");
        Ok(())
    }
}

fn read_value<P: Pasteboard + ?Sized>(
    pasteboard: &P,
    index: usize,
    type_tag: &str,
) -> Option<PasteboardValue> {
    if let Some(bytes) = pasteboard.data(index, type_tag) {
        return Some(PasteboardValue::Data(bytes));
    }
    if let Some(text) = pasteboard.string(index, type_tag) {
        return Some(PasteboardValue::String(text));
    }
    pasteboard
        .property_list(index, type_tag)
        .map(PasteboardValue::PropertyList)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clipboard::MemoryPasteboard;

    fn rich_item(text: &str) -> PasteboardItem {
        PasteboardItem::new()
            .with(PLAIN_TEXT_TYPE, PasteboardValue::Data(text.as_bytes().to_vec()))
            .with(HTML_TYPE, PasteboardValue::String(format!("<b>{}</b>", text)))
            .with(
                "com.example.meta",
                PasteboardValue::PropertyList(serde_json::json!({ "len": text.len() })),
            )
    }

    #[test]
    fn test_round_trip_multiple_items() {
        let original = vec![
            rich_item("first"),
            PasteboardItem::new().with("public.png", PasteboardValue::Data(vec![0x89, 0x50, 0x00, 0xff])),
            rich_item("third"),
        ];
        let mut pasteboard = MemoryPasteboard::with_items(original.clone());

        let snapshot = PasteboardSnapshot::capture(&pasteboard);
        assert_eq!(snapshot.items().len(), 3);

        pasteboard.set_text("clobbered").unwrap();
        snapshot.restore(&mut pasteboard).unwrap();

        assert_eq!(pasteboard.items(), original.as_slice());
    }

    #[test]
    fn test_capture_prefers_bytes_then_string_then_plist() {
        let pasteboard = MemoryPasteboard::with_items(vec![rich_item("x")]);
        let snapshot = PasteboardSnapshot::capture(&pasteboard);
        let item = &snapshot.items()[0];

        assert!(matches!(item.get(PLAIN_TEXT_TYPE), Some(PasteboardValue::Data(_))));
        assert!(matches!(item.get(HTML_TYPE), Some(PasteboardValue::String(_))));
        assert!(matches!(
            item.get("com.example.meta"),
            Some(PasteboardValue::PropertyList(_))
        ));
    }

    #[test]
    fn test_type_order_preserved() {
        let pasteboard = MemoryPasteboard::with_items(vec![rich_item("x")]);
        let snapshot = PasteboardSnapshot::capture(&pasteboard);
        let types: Vec<_> = snapshot.items()[0].types().collect();
        assert_eq!(types, vec![PLAIN_TEXT_TYPE, HTML_TYPE, "com.example.meta"]);
    }

    #[test]
    fn test_empty_pasteboard_restores_empty() {
        let mut pasteboard = MemoryPasteboard::new();
        let snapshot = PasteboardSnapshot::capture(&pasteboard);
        assert!(snapshot.is_empty());

        pasteboard.set_text("stale").unwrap();
        snapshot.restore(&mut pasteboard).unwrap();
        assert_eq!(pasteboard.item_count(), 0);
    }

    #[test]
    fn test_restore_changes_change_count() {
        let mut pasteboard = MemoryPasteboard::with_items(vec![rich_item("x")]);
        let before = pasteboard.change_count();
        PasteboardSnapshot::capture(&pasteboard)
            .restore(&mut pasteboard)
            .unwrap();
        assert!(pasteboard.change_count() > before);
    }

    /// Refuses any write that contains an item carrying `poison`
    struct PickyPasteboard {
        inner: MemoryPasteboard,
        poison: &'static str,
    }

    impl Pasteboard for PickyPasteboard {
        fn item_count(&self) -> usize {
            self.inner.item_count()
        }
        fn types(&self, index: usize) -> Vec<String> {
            self.inner.types(index)
        }
        fn data(&self, index: usize, type_tag: &str) -> Option<Vec<u8>> {
            self.inner.data(index, type_tag)
        }
        fn string(&self, index: usize, type_tag: &str) -> Option<String> {
            self.inner.string(index, type_tag)
        }
        fn property_list(&self, index: usize, type_tag: &str) -> Option<serde_json::Value> {
            self.inner.property_list(index, type_tag)
        }
        fn change_count(&self) -> i64 {
            self.inner.change_count()
        }
        fn clear(&mut self) -> Result<(), PasteboardError> {
            self.inner.clear()
        }
        fn write(&mut self, items: &[PasteboardItem]) -> Result<(), PasteboardError> {
            if items.iter().any(|item| item.get(self.poison).is_some()) {
                return Err(PasteboardError::Rejected);
            }
            self.inner.write(items)
        }
    }

    #[test]
    fn test_refused_type_keeps_the_rest_of_the_item() {
        let original = PasteboardItem::new()
            .with(PLAIN_TEXT_TYPE, PasteboardValue::String("foo".into()))
            .with("dyn.private", PasteboardValue::Data(vec![7]));
        let mut pasteboard = MemoryPasteboard::with_items(vec![original]);
        pasteboard.refuse_type("dyn.private");

        let snapshot = PasteboardSnapshot::capture(&pasteboard);
        pasteboard.set_text("bar").unwrap();
        snapshot.restore(&mut pasteboard).unwrap();

        assert_eq!(pasteboard.item_count(), 1);
        assert_eq!(pasteboard.text().as_deref(), Some("foo"));
        assert!(pasteboard.data(0, "dyn.private").is_none());
    }

    #[test]
    fn test_refused_item_keeps_the_others() {
        let original = vec![
            rich_item("first"),
            PasteboardItem::new().with("com.example.poison", PasteboardValue::Data(vec![0])),
            rich_item("third"),
        ];
        let mut pasteboard = PickyPasteboard {
            inner: MemoryPasteboard::with_items(original.clone()),
            poison: "com.example.poison",
        };

        let snapshot = PasteboardSnapshot::capture(&pasteboard);
        pasteboard.inner.set_text("bar").unwrap();
        snapshot.restore(&mut pasteboard).unwrap();

        assert_eq!(
            pasteboard.inner.items(),
            &[original[0].clone(), original[2].clone()]
        );
    }

    #[test]
    fn test_restore_fails_only_when_nothing_fits() {
        let mut pasteboard = PickyPasteboard {
            inner: MemoryPasteboard::with_items(vec![
                PasteboardItem::new().with("com.example.poison", PasteboardValue::Data(vec![0])),
            ]),
            poison: "com.example.poison",
        };
        let snapshot = PasteboardSnapshot::capture(&pasteboard);
        assert!(matches!(
            snapshot.restore(&mut pasteboard),
            Err(PasteboardError::Rejected)
        ));
    }

    /// Lists a type for item 0 that cannot be read in any form
    struct OpaquePasteboard;

    impl Pasteboard for OpaquePasteboard {
        fn item_count(&self) -> usize {
            1
        }
        fn types(&self, _index: usize) -> Vec<String> {
            vec!["com.example.promise".into()]
        }
        fn data(&self, _index: usize, _type_tag: &str) -> Option<Vec<u8>> {
            None
        }
        fn string(&self, _index: usize, _type_tag: &str) -> Option<String> {
            None
        }
        fn property_list(&self, _index: usize, _type_tag: &str) -> Option<serde_json::Value> {
            None
        }
        fn change_count(&self) -> i64 {
            0
        }
        fn clear(&mut self) -> Result<(), PasteboardError> {
            Ok(())
        }
        fn write(&mut self, _items: &[PasteboardItem]) -> Result<(), PasteboardError> {
            Ok(())
        }
    }

    #[test]
    fn test_capture_drops_unreadable_items() {
        let snapshot = PasteboardSnapshot::capture(&OpaquePasteboard);
        assert!(snapshot.is_empty());
    }

    #[test]
    fn test_item_insert_replaces_same_type() {
        let item = PasteboardItem::new()
            .with(PLAIN_TEXT_TYPE, PasteboardValue::String("a".into()))
            .with(PLAIN_TEXT_TYPE, PasteboardValue::String("b".into()));
        assert_eq!(item.entries().len(), 1);
        assert_eq!(
            item.get(PLAIN_TEXT_TYPE),
            Some(&PasteboardValue::String("b".into()))
        );
    }
}
