//! Click capture and classification
//!
//! Turns a clicked element into an immutable `ClickRecord` and works out
//! which engagement counters the click feeds. Classification is a pure
//! function of the element snapshot.

use chrono::{DateTime, Duration, Utc};

use crate::types::{
    ClickCategory, ClickRecord, ClickType, Classification, ElementSnapshot, Importance,
    PageGeometry, PointerPosition,
};

/// Class marking a product card
pub const PRODUCT_CARD_CLASS: &str = "product-card";

/// Classes marking a WhatsApp call-to-action button
pub const WHATSAPP_BUTTON_CLASSES: [&str; 2] = ["btn-whatsapp", "whatsapp-btn"];

/// Class marking the navigation link list
pub const NAV_LINKS_CLASS: &str = "nav-links";

/// WhatsApp deep-link host
pub const WHATSAPP_HOST: &str = "wa.me";

/// Catalog page path fragment
pub const COLLECTION_PAGE: &str = "collection.html";

/// Product name used when a card has no heading
pub const UNKNOWN_PRODUCT: &str = "Unknown Product";

fn is_product_card(element: &ElementSnapshot) -> bool {
    element.has_class(PRODUCT_CARD_CLASS)
}

fn is_whatsapp_button(element: &ElementSnapshot) -> bool {
    WHATSAPP_BUTTON_CLASSES.iter().any(|c| element.has_class(c))
}

fn links_to_whatsapp(element: &ElementSnapshot) -> bool {
    element.href_str().contains(WHATSAPP_HOST)
}

/// Derive the click type.
///
/// WhatsApp targets win over the generic link/button types so that a
/// `wa.me` anchor is reported as `whatsapp`.
pub fn click_type(element: &ElementSnapshot) -> ClickType {
    if is_whatsapp_button(element) || links_to_whatsapp(element) {
        return ClickType::Whatsapp;
    }
    if element.is_tag("a") {
        return ClickType::Link;
    }
    if element.is_tag("button") {
        return ClickType::Button;
    }
    if element.closest(is_product_card).is_some() {
        return ClickType::Product;
    }
    if element.input_type_is("submit") {
        return ClickType::FormSubmit;
    }
    if element.input_type_is("input") {
        return ClickType::FormInput;
    }
    ClickType::Other
}

/// Derive the click category, first match wins
pub fn click_category(element: &ElementSnapshot) -> ClickCategory {
    let href = element.href_str();
    if href.contains(WHATSAPP_HOST) {
        ClickCategory::Whatsapp
    } else if href.contains(COLLECTION_PAGE) {
        ClickCategory::Navigation
    } else if element.closest(is_product_card).is_some() {
        ClickCategory::ProductView
    } else if is_whatsapp_button(element) {
        ClickCategory::OrderIntent
    } else if element.has_class(NAV_LINKS_CLASS) {
        ClickCategory::Navigation
    } else if element.is_tag("form") {
        ClickCategory::FormInteraction
    } else {
        ClickCategory::General
    }
}

pub fn click_importance(category: ClickCategory) -> Importance {
    match category {
        ClickCategory::Whatsapp | ClickCategory::OrderIntent => Importance::High,
        ClickCategory::ProductView => Importance::Medium,
        _ => Importance::Low,
    }
}

pub fn classify(element: &ElementSnapshot) -> Classification {
    let category = click_category(element);
    Classification {
        click_type: click_type(element),
        category,
        importance: click_importance(category),
    }
}

/// Wall-clock time of a click, saturating at the latest representable instant
fn click_timestamp(started_at: DateTime<Utc>, time_on_page_ms: u64) -> DateTime<Utc> {
    i64::try_from(time_on_page_ms)
        .ok()
        .and_then(Duration::try_milliseconds)
        .and_then(|offset| started_at.checked_add_signed(offset))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Build the record for one click
pub fn capture_click(
    element: &ElementSnapshot,
    pointer: PointerPosition,
    geometry: PageGeometry,
    started_at: DateTime<Utc>,
    time_on_page_ms: u64,
) -> ClickRecord {
    let classification = classify(element);

    ClickRecord {
        timestamp: click_timestamp(started_at, time_on_page_ms),
        element: element.tag.to_lowercase(),
        class_name: element.classes.join(" "),
        id: element.id.clone(),
        text: element.truncated_text(),
        href: element.href_str().to_string(),
        position: pointer,
        scroll_position: geometry.scroll_y,
        viewport_height: geometry.viewport_height,
        time_on_page_ms,
        click_type: classification.click_type,
        category: classification.category,
        importance: classification.importance,
    }
}

/// Engagement counters a click feeds
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EngagementSignals {
    /// Product name when the click landed inside a product card
    pub product_view: Option<String>,
    pub whatsapp_click: bool,
    pub form_interaction: bool,
}

/// Work out which engagement counters a click should bump
pub fn engagement_signals(element: &ElementSnapshot) -> EngagementSignals {
    let product_view = element.closest(is_product_card).map(|card| {
        card.heading
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(UNKNOWN_PRODUCT)
            .to_string()
    });

    let whatsapp_click =
        element.closest(is_whatsapp_button).is_some() || links_to_whatsapp(element);

    let form_interaction =
        element.closest(|e| e.is_tag("form")).is_some() || element.input_type_is("submit");

    EngagementSignals {
        product_view,
        whatsapp_click,
        form_interaction,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_whatsapp_anchor() {
        let element = ElementSnapshot::new("A").with_href("https://wa.me/254700000000?text=hi");
        let c = classify(&element);
        assert_eq!(c.click_type, ClickType::Whatsapp);
        assert_eq!(c.category, ClickCategory::Whatsapp);
        assert_eq!(c.importance, Importance::High);
    }

    #[test]
    fn test_plain_link_and_button() {
        let link = ElementSnapshot::new("a").with_href("/about.html");
        assert_eq!(classify(&link).click_type, ClickType::Link);
        assert_eq!(classify(&link).category, ClickCategory::General);
        assert_eq!(classify(&link).importance, Importance::Low);

        let button = ElementSnapshot::new("BUTTON");
        assert_eq!(click_type(&button), ClickType::Button);
    }

    #[test]
    fn test_collection_link_is_navigation() {
        let link = ElementSnapshot::new("a").with_href("https://example.com/collection.html");
        assert_eq!(click_category(&link), ClickCategory::Navigation);
        assert_eq!(click_importance(ClickCategory::Navigation), Importance::Low);
    }

    #[test]
    fn test_product_card_and_descendant() {
        let card = ElementSnapshot::new("div").with_class(PRODUCT_CARD_CLASS);
        let c = classify(&card);
        assert_eq!(c.click_type, ClickType::Product);
        assert_eq!(c.category, ClickCategory::ProductView);
        assert_eq!(c.importance, Importance::Medium);

        let image = ElementSnapshot::new("img").with_ancestor(card);
        assert_eq!(click_type(&image), ClickType::Product);
        assert_eq!(click_category(&image), ClickCategory::ProductView);
    }

    #[test]
    fn test_whatsapp_button_marker() {
        let button = ElementSnapshot::new("span").with_class("btn-whatsapp");
        let c = classify(&button);
        assert_eq!(c.click_type, ClickType::Whatsapp);
        assert_eq!(c.category, ClickCategory::OrderIntent);
        assert_eq!(c.importance, Importance::High);

        let alt = ElementSnapshot::new("span").with_class("whatsapp-btn");
        assert_eq!(click_type(&alt), ClickType::Whatsapp);
    }

    #[test]
    fn test_form_types() {
        let submit = ElementSnapshot::new("input").with_type("submit");
        assert_eq!(click_type(&submit), ClickType::FormSubmit);

        let input = ElementSnapshot::new("input").with_type("input");
        assert_eq!(click_type(&input), ClickType::FormInput);

        let form = ElementSnapshot::new("FORM");
        assert_eq!(click_category(&form), ClickCategory::FormInteraction);
        assert_eq!(click_type(&form), ClickType::Other);
    }

    #[test]
    fn test_nav_links_marker() {
        let nav = ElementSnapshot::new("ul").with_class(NAV_LINKS_CLASS);
        assert_eq!(click_category(&nav), ClickCategory::Navigation);
    }

    #[test]
    fn test_classification_is_deterministic() {
        let element = ElementSnapshot::new("div")
            .with_class("hero")
            .with_ancestor(ElementSnapshot::new("section"));
        let first = classify(&element);
        for _ in 0..10 {
            assert_eq!(classify(&element), first);
        }
        assert_eq!(first.click_type, ClickType::Other);
        assert_eq!(first.category, ClickCategory::General);
    }

    #[test]
    fn test_capture_click_record() {
        let started_at = Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap();
        let element = ElementSnapshot::new("A")
            .with_class("btn")
            .with_class("btn-primary")
            .with_text(format!("  {}  ", "Order now ".repeat(10)))
            .with_href("https://wa.me/1");

        let record = capture_click(
            &element,
            PointerPosition { x: 12.0, y: 34.0 },
            PageGeometry::new(400.0, 3000.0, 800.0),
            started_at,
            1_500,
        );

        assert_eq!(record.element, "a");
        assert_eq!(record.class_name, "btn btn-primary");
        assert_eq!(record.text.chars().count(), 50);
        assert_eq!(record.href, "https://wa.me/1");
        assert_eq!(record.scroll_position, 400.0);
        assert_eq!(record.viewport_height, 800.0);
        assert_eq!(record.time_on_page_ms, 1_500);
        assert_eq!(record.timestamp, started_at + Duration::milliseconds(1_500));
        assert_eq!(record.click_type, ClickType::Whatsapp);
    }

    #[test]
    fn test_unrepresentable_offset_saturates() {
        let record = capture_click(
            &ElementSnapshot::new("button"),
            PointerPosition::default(),
            PageGeometry::default(),
            Utc::now(),
            u64::MAX,
        );
        assert_eq!(record.timestamp, DateTime::<Utc>::MAX_UTC);
        assert_eq!(record.time_on_page_ms, u64::MAX);
    }

    #[test]
    fn test_malformed_target_defaults_to_empty() {
        let record = capture_click(
            &ElementSnapshot::default(),
            PointerPosition::default(),
            PageGeometry::default(),
            Utc::now(),
            0,
        );
        assert_eq!(record.element, "");
        assert_eq!(record.text, "");
        assert_eq!(record.href, "");
        assert_eq!(record.category, ClickCategory::General);
    }

    #[test]
    fn test_engagement_signals() {
        let title = ElementSnapshot::new("h3").with_ancestor(
            ElementSnapshot::new("div")
                .with_class(PRODUCT_CARD_CLASS)
                .with_heading("Fairy Lights 10m"),
        );
        let signals = engagement_signals(&title);
        assert_eq!(signals.product_view.as_deref(), Some("Fairy Lights 10m"));
        assert!(!signals.whatsapp_click);
        assert!(!signals.form_interaction);

        let icon = ElementSnapshot::new("i").with_ancestor(
            ElementSnapshot::new("a").with_class("btn-whatsapp"),
        );
        assert!(engagement_signals(&icon).whatsapp_click);

        let field = ElementSnapshot::new("input").with_ancestor(ElementSnapshot::new("form"));
        assert!(engagement_signals(&field).form_interaction);
    }

    #[test]
    fn test_product_without_heading_is_unknown() {
        let card = ElementSnapshot::new("div").with_class(PRODUCT_CARD_CLASS);
        assert_eq!(
            engagement_signals(&card).product_view.as_deref(),
            Some(UNKNOWN_PRODUCT)
        );
    }
}
