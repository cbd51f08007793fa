//! Engagement scoring
//!
//! Recomputed on every call from the current state; nothing is cached.

use crate::types::TrackingState;

/// Upper bound of the engagement score
pub const MAX_ENGAGEMENT_SCORE: u32 = 100;

const CLICK_WEIGHT: u64 = 2;
const SCROLL_MILESTONE_WEIGHT: u64 = 5;
const PRODUCT_VIEW_WEIGHT: u64 = 10;
const WHATSAPP_CLICK_WEIGHT: u64 = 20;
const FORM_INTERACTION_WEIGHT: u64 = 15;
const HIGH_ENGAGEMENT_BONUS: u64 = 50;

pub const RECOMMEND_WHATSAPP: &str = "Consider adding more prominent WhatsApp contact options";
pub const RECOMMEND_LAYOUT: &str =
    "Users may not be engaging with content - consider improving page layout";
pub const RECOMMEND_PRODUCTS: &str =
    "Users may not be finding products easily - consider improving product visibility";

/// Weighted interaction sum capped at `MAX_ENGAGEMENT_SCORE`
pub fn engagement_score(state: &TrackingState) -> u32 {
    let counters = &state.engagement;

    let raw = (state.clicks.len() as u64) * CLICK_WEIGHT
        + (state.scroll_milestones.len() as u64) * SCROLL_MILESTONE_WEIGHT
        + u64::from(counters.product_views) * PRODUCT_VIEW_WEIGHT
        + u64::from(counters.whatsapp_clicks) * WHATSAPP_CLICK_WEIGHT
        + u64::from(counters.form_interactions) * FORM_INTERACTION_WEIGHT
        + if counters.high_engagement {
            HIGH_ENGAGEMENT_BONUS
        } else {
            0
        };

    raw.min(u64::from(MAX_ENGAGEMENT_SCORE)) as u32
}

/// Advisory suggestions for the site owner
pub fn recommendations(state: &TrackingState) -> Vec<String> {
    let mut out = Vec::new();

    if state.engagement.whatsapp_clicks == 0 {
        out.push(RECOMMEND_WHATSAPP.to_string());
    }
    if state.scroll_milestones.len() < 2 {
        out.push(RECOMMEND_LAYOUT.to_string());
    }
    if state.engagement.product_views == 0 {
        out.push(RECOMMEND_PRODUCTS.to_string());
    }

    out
}
