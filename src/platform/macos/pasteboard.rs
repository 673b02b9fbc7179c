//! NSPasteboard access

use objc2::rc::Retained;
use objc2::runtime::{AnyObject, ProtocolObject};
use objc2_app_kit::{NSPasteboard, NSPasteboardItem, NSPasteboardWriting};
use objc2_foundation::{
    NSArray, NSData, NSJSONReadingOptions, NSJSONSerialization, NSJSONWritingOptions, NSString,
};
use tracing::{trace, warn};

use crate::clipboard::{Pasteboard, PasteboardError, PasteboardItem, PasteboardValue};

/// The general pasteboard. Stateless: every call asks AppKit.
pub struct MacPasteboard;

fn general() -> Retained<NSPasteboard> {
    unsafe { NSPasteboard::generalPasteboard() }
}

fn item_at(index: usize) -> Option<Retained<NSPasteboardItem>> {
    let items = unsafe { general().pasteboardItems() }?;
    if index >= items.count() {
        return None;
    }
    Some(items.objectAtIndex(index))
}

/// Property lists are carried as JSON; non-JSON plists are skipped
fn plist_to_json(plist: &AnyObject) -> Option<serde_json::Value> {
    if !unsafe { NSJSONSerialization::isValidJSONObject(plist) } {
        return None;
    }
    let data = unsafe {
        NSJSONSerialization::dataWithJSONObject_options_error(plist, NSJSONWritingOptions(0))
    }
    .ok()?;
    serde_json::from_slice(data.bytes()).ok()
}

fn json_to_plist(value: &serde_json::Value) -> Option<Retained<AnyObject>> {
    let bytes = serde_json::to_vec(value).ok()?;
    let data = NSData::with_bytes(&bytes);
    unsafe { NSJSONSerialization::JSONObjectWithData_options_error(&data, NSJSONReadingOptions(0)) }
        .ok()
}

impl Pasteboard for MacPasteboard {
    fn item_count(&self) -> usize {
        unsafe { general().pasteboardItems() }.map_or(0, |items| items.count())
    }

    fn types(&self, index: usize) -> Vec<String> {
        let Some(item) = item_at(index) else {
            return Vec::new();
        };
        unsafe { item.types() }
            .iter()
            .map(|type_tag| type_tag.to_string())
            .collect()
    }

    fn data(&self, index: usize, type_tag: &str) -> Option<Vec<u8>> {
        let item = item_at(index)?;
        let data = unsafe { item.dataForType(&NSString::from_str(type_tag)) }?;
        Some(data.bytes().to_vec())
    }

    fn string(&self, index: usize, type_tag: &str) -> Option<String> {
        let item = item_at(index)?;
        let string = unsafe { item.stringForType(&NSString::from_str(type_tag)) }?;
        Some(string.to_string())
    }

    fn property_list(&self, index: usize, type_tag: &str) -> Option<serde_json::Value> {
        let item = item_at(index)?;
        let plist = unsafe { item.propertyListForType(&NSString::from_str(type_tag)) }?;
        plist_to_json(&plist)
    }

    fn change_count(&self) -> i64 {
        unsafe { general().changeCount() as i64 }
    }

    fn clear(&mut self) -> Result<(), PasteboardError> {
        unsafe { general().clearContents() };
        Ok(())
    }

    fn write(&mut self, items: &[PasteboardItem]) -> Result<(), PasteboardError> {
        let mut objects = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            let native = unsafe { NSPasteboardItem::new() };
            let mut kept = 0;
            for (type_tag, value) in item.entries() {
                let tag = NSString::from_str(type_tag);
                let written = unsafe {
                    match value {
                        PasteboardValue::Data(bytes) => {
                            native.setData_forType(&NSData::with_bytes(bytes), &tag)
                        }
                        PasteboardValue::String(text) => {
                            native.setString_forType(&NSString::from_str(text), &tag)
                        }
                        PasteboardValue::PropertyList(value) => match json_to_plist(value) {
                            Some(plist) => native.setPropertyList_forType(&plist, &tag),
                            None => false,
                        },
                    }
                };
                if written {
                    kept += 1;
                } else {
                    warn!(index, %type_tag, "pasteboard type refused, skipped");
                }
            }
            if kept == 0 {
                warn!(index, "pasteboard item has no writable type, skipped");
                continue;
            }
            objects.push(ProtocolObject::<dyn NSPasteboardWriting>::from_retained(native));
        }

        if objects.is_empty() {
            return if items.is_empty() {
                Ok(())
            } else {
                Err(PasteboardError::Rejected)
            };
        }

        let written = objects.len();
        let array = NSArray::from_vec(objects);
        if !unsafe { general().writeObjects(&array) } {
            return Err(PasteboardError::Rejected);
        }
        trace!(items = written, "pasteboard written");
        Ok(())
    }
}
