//! Selection through the macOS accessibility API
//!
//! Walks system-wide element → focused application → focused element, or
//! the focused window when no element reports focus. Attributed text for the
//! selected range is preferred; `AXSelectedText` is the plain fallback.

use accessibility_sys::{
    kAXAttributedStringForRangeParameterizedAttribute, kAXErrorSuccess,
    kAXFocusedApplicationAttribute, kAXFocusedUIElementAttribute, kAXFocusedWindowAttribute,
    kAXSelectedTextAttribute, kAXSelectedTextRangeAttribute, AXUIElementCopyAttributeValue,
    AXUIElementCopyParameterizedAttributeValue, AXUIElementCreateSystemWide, AXUIElementRef,
};
use core_foundation::attributed_string::CFAttributedString;
use core_foundation::base::{CFType, CFTypeRef, TCFType};
use core_foundation::string::CFString;
use objc2_foundation::{NSAttributedString, NSDictionary, NSRange};
use tracing::{debug, trace};

use crate::selection::{Accessibility, AttributedText, AxSelection};

/// Reads the focused selection through AX
pub struct MacAccessibility;

impl Accessibility for MacAccessibility {
    fn selection(&self) -> Option<AxSelection> {
        // SAFETY: the system-wide element follows the create rule
        let system = unsafe { CFType::wrap_under_create_rule(AXUIElementCreateSystemWide() as CFTypeRef) };
        let app = copy_attribute(&system, kAXFocusedApplicationAttribute)?;

        let element = copy_attribute(&app, kAXFocusedUIElementAttribute).or_else(|| {
            trace!("no focused element, trying focused window");
            copy_attribute(&app, kAXFocusedWindowAttribute)
        })?;

        if let Some(text) = attributed_selection(&element) {
            if !text.string.is_empty() {
                return Some(AxSelection::Rich(text));
            }
        }

        let plain = copy_attribute(&element, kAXSelectedTextAttribute)?
            .downcast_into::<CFString>()?
            .to_string();
        if plain.is_empty() {
            debug!("accessibility reports an empty selection");
            return None;
        }
        Some(AxSelection::Plain(plain))
    }
}

fn copy_attribute(element: &CFType, attribute: &'static str) -> Option<CFType> {
    let name = CFString::from_static_string(attribute);
    let mut value: CFTypeRef = std::ptr::null();
    // SAFETY: element is an AXUIElement and value is an out-parameter
    let status = unsafe {
        AXUIElementCopyAttributeValue(
            element.as_CFTypeRef() as AXUIElementRef,
            name.as_concrete_TypeRef(),
            &mut value,
        )
    };
    if status != kAXErrorSuccess || value.is_null() {
        return None;
    }
    // SAFETY: copied values follow the create rule
    Some(unsafe { CFType::wrap_under_create_rule(value) })
}

fn attributed_selection(element: &CFType) -> Option<AttributedText> {
    let range = copy_attribute(element, kAXSelectedTextRangeAttribute)?;
    let name = CFString::from_static_string(kAXAttributedStringForRangeParameterizedAttribute);
    let mut value: CFTypeRef = std::ptr::null();
    // SAFETY: range is the AXValue the element reported for its selection
    let status = unsafe {
        AXUIElementCopyParameterizedAttributeValue(
            element.as_CFTypeRef() as AXUIElementRef,
            name.as_concrete_TypeRef(),
            range.as_CFTypeRef(),
            &mut value,
        )
    };
    if status != kAXErrorSuccess || value.is_null() {
        return None;
    }
    // SAFETY: copied values follow the create rule
    let attributed = unsafe { CFType::wrap_under_create_rule(value) }
        .downcast_into::<CFAttributedString>()?;

    // SAFETY: CFAttributedString is toll-free bridged to NSAttributedString
    // and stays alive for this borrow
    let ns: &NSAttributedString =
        unsafe { &*(attributed.as_concrete_TypeRef() as *const NSAttributedString) };
    let string = unsafe { ns.string() }.to_string();
    let length = unsafe { ns.length() };
    let rtf = unsafe {
        ns.RTFFromRange_documentAttributes(NSRange::new(0, length), &NSDictionary::new())
    }
    .map(|data| data.bytes().to_vec());

    Some(AttributedText {
        string,
        rtf,
        html: None,
    })
}
