//! In-process pasteboard
//!
//! Behaves like the system pasteboard for every operation the snapshot and
//! the selection fallback need. Used by tests and by hosts without a native
//! pasteboard backend.

use tracing::trace;

use super::snapshot::{
    Pasteboard, PasteboardError, PasteboardItem, PasteboardValue, PLAIN_TEXT_TYPE,
};

#[derive(Debug, Default)]
pub struct MemoryPasteboard {
    items: Vec<PasteboardItem>,
    change_count: i64,
    refused: Vec<String>,
}

impl MemoryPasteboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items(items: Vec<PasteboardItem>) -> Self {
        Self {
            items,
            ..Self::default()
        }
    }

    /// Make writes skip this type, the way a system pasteboard drops types
    /// it cannot hold
    pub fn refuse_type(&mut self, type_tag: impl Into<String>) {
        self.refused.push(type_tag.into());
    }

    pub fn items(&self) -> &[PasteboardItem] {
        &self.items
    }

    /// Replace the contents with a single plain-text item
    pub fn set_text(&mut self, text: &str) -> Result<(), PasteboardError> {
        self.clear()?;
        let item = PasteboardItem::new()
            .with(PLAIN_TEXT_TYPE, PasteboardValue::String(text.to_string()));
        self.write(&[item])
    }

    /// Plain text of the first item, if any
    pub fn text(&self) -> Option<String> {
        self.string(0, PLAIN_TEXT_TYPE)
            .or_else(|| self.data(0, PLAIN_TEXT_TYPE).and_then(|b| String::from_utf8(b).ok()))
    }

    fn value(&self, index: usize, type_tag: &str) -> Option<&PasteboardValue> {
        self.items.get(index)?.get(type_tag)
    }
}

impl Pasteboard for MemoryPasteboard {
    fn item_count(&self) -> usize {
        self.items.len()
    }

    fn types(&self, index: usize) -> Vec<String> {
        self.items
            .get(index)
            .map(|item| item.types().map(str::to_string).collect())
            .unwrap_or_default()
    }

    fn data(&self, index: usize, type_tag: &str) -> Option<Vec<u8>> {
        match self.value(index, type_tag)? {
            PasteboardValue::Data(bytes) => Some(bytes.clone()),
            _ => None,
        }
    }

    fn string(&self, index: usize, type_tag: &str) -> Option<String> {
        match self.value(index, type_tag)? {
            PasteboardValue::String(text) => Some(text.clone()),
            _ => None,
        }
    }

    fn property_list(&self, index: usize, type_tag: &str) -> Option<serde_json::Value> {
        match self.value(index, type_tag)? {
            PasteboardValue::PropertyList(value) => Some(value.clone()),
            _ => None,
        }
    }

    fn change_count(&self) -> i64 {
        self.change_count
    }

    fn clear(&mut self) -> Result<(), PasteboardError> {
        self.items.clear();
        self.change_count += 1;
        Ok(())
    }

    fn write(&mut self, items: &[PasteboardItem]) -> Result<(), PasteboardError> {
        let accepted: Vec<PasteboardItem> = items
            .iter()
            .map(|item| {
                let mut kept = PasteboardItem::new();
                for (type_tag, value) in item.entries() {
                    if self.refused.contains(type_tag) {
                        trace!(%type_tag, "type refused, skipped");
                    } else {
                        kept.insert(type_tag.clone(), value.clone());
                    }
                }
                kept
            })
            .filter(|item| !item.is_empty())
            .collect();

        if accepted.is_empty() && !items.is_empty() {
            return Err(PasteboardError::Rejected);
        }
        self.items.extend(accepted);
        self.change_count += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_read_text() {
        let mut pasteboard = MemoryPasteboard::new();
        assert_eq!(pasteboard.text(), None);

        pasteboard.set_text("foo").unwrap();
        assert_eq!(pasteboard.text().as_deref(), Some("foo"));
        assert_eq!(pasteboard.item_count(), 1);
    }

    #[test]
    fn test_reads_are_representation_specific() {
        let pasteboard = MemoryPasteboard::with_items(vec![PasteboardItem::new()
            .with("a", PasteboardValue::Data(vec![1]))]);
        assert_eq!(pasteboard.data(0, "a"), Some(vec![1]));
        assert_eq!(pasteboard.string(0, "a"), None);
        assert_eq!(pasteboard.property_list(0, "a"), None);
        assert!(pasteboard.types(3).is_empty());
    }

    #[test]
    fn test_refused_types_are_skipped() {
        let mut pasteboard = MemoryPasteboard::new();
        pasteboard.refuse_type("b");

        let mixed = PasteboardItem::new()
            .with("a", PasteboardValue::Data(vec![1]))
            .with("b", PasteboardValue::Data(vec![2]));
        let only_refused = PasteboardItem::new().with("b", PasteboardValue::Data(vec![3]));
        pasteboard.write(&[mixed, only_refused.clone()]).unwrap();

        assert_eq!(pasteboard.item_count(), 1);
        assert_eq!(pasteboard.types(0), vec!["a".to_string()]);
        assert!(matches!(
            pasteboard.write(&[only_refused]),
            Err(PasteboardError::Rejected)
        ));
    }
}
