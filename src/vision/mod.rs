//! Order-check analysis: is each expected item actually in the photo?

pub mod client;

pub use client::OpenAiVision;

use async_trait::async_trait;

use crate::config::ExpectedItem;
use crate::error::AnalysisError;
use crate::reading::ItemResult;

/// Judges the captured frame against the expected order items.
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, jpeg: &[u8]) -> Result<Vec<ItemResult>, AnalysisError>;
}

/// Renders the instruction block sent with every photo. Items with tracked
/// ingredients get them listed in parentheses; the response contract asks
/// for ingredient verdicts exactly for those.
pub fn build_instructions(items: &[ExpectedItem]) -> String {
    let mut listing = String::new();
    for item in items {
        if item.ingredients.is_empty() {
            listing.push_str(&format!("- {}\n", item.name));
        } else {
            listing.push_str(&format!("- {} ({})\n", item.name, item.ingredients.join(", ")));
        }
    }
    format!(
        "You are the order-check step of a food kiosk. Each request carries one \
         photo of a prepared order and the list of items that should be in it.\n\
         \n\
         Expected items:\n\
         {listing}\
         \n\
         Reply with a JSON array only: no prose, no code fences. One object per \
         expected item, in the order listed, each with \"name\" (string) and \
         \"present\" (boolean). For items listed with parenthesized ingredients, \
         also include \"ingredients\": an array of {{\"name\", \"present\"}} \
         objects covering exactly those ingredients. Count an ingredient as \
         present only when it is inside its own item, not elsewhere in the \
         photo. If none of the items are visible, still return the full array \
         with every \"present\" set to false."
    )
}

/// Parses the model's reply. Anything but a bare JSON array of item
/// verdicts is an analysis failure; there is no salvage pass.
pub fn parse_items(content: &str) -> Result<Vec<ItemResult>, AnalysisError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(AnalysisError::EmptyResponse);
    }
    Ok(serde_json::from_str(trimmed)?)
}
