//! Core data types
//!
//! Element snapshots and click records captured from the page, plus the
//! page-lifetime `TrackingState` every handler mutates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Maximum number of characters of element text kept on a click record
pub const MAX_CLICK_TEXT_CHARS: usize = 50;

/// Observable attributes of a DOM element at the instant of an interaction.
///
/// Ancestors are listed nearest-first and are used for `closest()`-style
/// lookups (product cards, forms, WhatsApp buttons wrapping an icon).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElementSnapshot {
    /// Tag name, any case (`A`, `button`, ...)
    pub tag: String,
    /// Class list
    pub classes: Vec<String>,
    /// Element id, empty when absent
    pub id: String,
    /// Text content, untrimmed
    pub text: String,
    /// Resolved link target, if the element is a link
    #[serde(skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    /// `type` attribute (`submit`, `text`, ...)
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub input_type: Option<String>,
    /// Text of the element's first `h3`, used as product name on product cards
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading: Option<String>,
    /// Ancestor chain, nearest first
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ancestors: Vec<ElementSnapshot>,
}

impl ElementSnapshot {
    /// Create a snapshot with just a tag name
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    pub fn with_href(mut self, href: impl Into<String>) -> Self {
        self.href = Some(href.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_type(mut self, input_type: impl Into<String>) -> Self {
        self.input_type = Some(input_type.into());
        self
    }

    pub fn with_heading(mut self, heading: impl Into<String>) -> Self {
        self.heading = Some(heading.into());
        self
    }

    pub fn with_ancestor(mut self, ancestor: ElementSnapshot) -> Self {
        self.ancestors.push(ancestor);
        self
    }

    /// Case-insensitive tag comparison
    pub fn is_tag(&self, tag: &str) -> bool {
        self.tag.eq_ignore_ascii_case(tag)
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    /// Link target or empty string
    pub fn href_str(&self) -> &str {
        self.href.as_deref().unwrap_or("")
    }

    pub fn input_type_is(&self, value: &str) -> bool {
        self.input_type
            .as_deref()
            .is_some_and(|t| t.eq_ignore_ascii_case(value))
    }

    /// The element itself or its nearest ancestor matching `pred`
    pub fn closest<F>(&self, pred: F) -> Option<&ElementSnapshot>
    where
        F: Fn(&ElementSnapshot) -> bool,
    {
        if pred(self) {
            return Some(self);
        }
        self.ancestors.iter().find(|a| pred(a))
    }

    /// Trimmed text content cut to `MAX_CLICK_TEXT_CHARS` characters
    pub fn truncated_text(&self) -> String {
        self.text.trim().chars().take(MAX_CLICK_TEXT_CHARS).collect()
    }
}

/// Scroll and viewport measurements at the instant of an event
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PageGeometry {
    /// Vertical scroll offset in pixels
    pub scroll_y: f64,
    /// Full document height in pixels
    pub document_height: f64,
    /// Viewport height in pixels
    pub viewport_height: f64,
}

impl PageGeometry {
    pub fn new(scroll_y: f64, document_height: f64, viewport_height: f64) -> Self {
        Self {
            scroll_y,
            document_height,
            viewport_height,
        }
    }

    /// Scrollable distance; zero or negative when the page fits one screen
    pub fn scrollable_height(&self) -> f64 {
        self.document_height - self.viewport_height
    }
}

/// Pointer coordinates in viewport space
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PointerPosition {
    pub x: f64,
    pub y: f64,
}

/// What kind of element was clicked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClickType {
    Link,
    Button,
    Product,
    Whatsapp,
    FormSubmit,
    FormInput,
    Other,
}

impl ClickType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClickType::Link => "link",
            ClickType::Button => "button",
            ClickType::Product => "product",
            ClickType::Whatsapp => "whatsapp",
            ClickType::FormSubmit => "form_submit",
            ClickType::FormInput => "form_input",
            ClickType::Other => "other",
        }
    }
}

/// Business meaning of a click
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClickCategory {
    Whatsapp,
    Navigation,
    ProductView,
    OrderIntent,
    FormInteraction,
    General,
}

impl ClickCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClickCategory::Whatsapp => "whatsapp",
            ClickCategory::Navigation => "navigation",
            ClickCategory::ProductView => "product_view",
            ClickCategory::OrderIntent => "order_intent",
            ClickCategory::FormInteraction => "form_interaction",
            ClickCategory::General => "general",
        }
    }
}

/// How much a click matters for conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Importance {
    Low,
    Medium,
    High,
}

impl Importance {
    /// Numeric weight forwarded as the click event value
    pub fn weight(&self) -> u64 {
        match self {
            Importance::High => 3,
            Importance::Medium => 2,
            Importance::Low => 1,
        }
    }
}

/// Result of classifying an element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    #[serde(rename = "type")]
    pub click_type: ClickType,
    pub category: ClickCategory,
    pub importance: Importance,
}

/// One captured click. Immutable once appended to the state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClickRecord {
    /// Wall-clock time of the click
    pub timestamp: DateTime<Utc>,
    /// Lowercased tag name
    pub element: String,
    /// Space-joined class list
    pub class_name: String,
    pub id: String,
    /// Trimmed text, at most 50 characters
    pub text: String,
    /// Link target, empty when none
    pub href: String,
    pub position: PointerPosition,
    pub scroll_position: f64,
    pub viewport_height: f64,
    /// Milliseconds since page load
    pub time_on_page_ms: u64,
    #[serde(rename = "type")]
    pub click_type: ClickType,
    pub category: ClickCategory,
    pub importance: Importance,
}

/// Scroll direction between two debounced evaluations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollDirection {
    Up,
    Down,
}

/// Per-session engagement counters. Counters only grow and
/// `high_engagement` is a one-way latch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementCounters {
    pub high_engagement: bool,
    pub product_views: u32,
    pub whatsapp_clicks: u32,
    pub form_interactions: u32,
}

/// Everything the tracker knows about the current page view
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackingState {
    /// Captured clicks in capture order
    pub clicks: Vec<ClickRecord>,
    /// Scroll-depth milestones reached
    pub scroll_milestones: BTreeSet<u32>,
    /// Time-on-page milestones reached, in milliseconds
    pub time_milestones: BTreeSet<u64>,
    /// Last refreshed time on page
    pub time_on_page_ms: u64,
    pub exit_intent_triggered: bool,
    pub engagement: EngagementCounters,
    /// Whether the scroll-driven engagement indicator has been shown
    pub engagement_shown: bool,
}

/// Debug view of a session: state plus derived metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsSnapshot {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    #[serde(flatten)]
    pub state: TrackingState,
    pub session_duration_ms: u64,
    pub engagement_score: u32,
    pub recommendations: Vec<String>,
}
