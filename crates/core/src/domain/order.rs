use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::store::CollectionKey;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Order subsystem a guest request may be linked to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkedSection {
    Coffee,
    Laundry,
    Restaurant,
}

impl LinkedSection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Coffee => "coffee",
            Self::Laundry => "laundry",
            Self::Restaurant => "restaurant",
        }
    }

    pub fn collection(self) -> CollectionKey {
        match self {
            Self::Coffee => CollectionKey::CoffeeOrders,
            Self::Laundry => CollectionKey::LaundryRequests,
            Self::Restaurant => CollectionKey::RestaurantOrders,
        }
    }

    /// Status the owning subsystem uses for "reception approved, work started".
    pub fn approved_status(self) -> &'static str {
        match self {
            Self::Coffee | Self::Restaurant => "preparing",
            Self::Laundry => "in-progress",
        }
    }

    pub fn rejected_status(self) -> &'static str {
        "cancelled"
    }
}

impl fmt::Display for LinkedSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LinkedSection {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "coffee" => Ok(Self::Coffee),
            "laundry" => Ok(Self::Laundry),
            "restaurant" => Ok(Self::Restaurant),
            other => Err(format!(
                "unknown linked section `{other}` (expected coffee|laundry|restaurant)"
            )),
        }
    }
}

/// A record owned by an order subsystem. Only the reception flags and status are touched
/// here; every other field is carried through untouched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedOrder {
    pub id: OrderId,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_by_reception: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected_by_reception: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LinkedOrder {
    pub fn new(id: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            id: OrderId(id.into()),
            status: status.into(),
            approved_by_reception: None,
            rejected_by_reception: None,
            extra: Map::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    pub fn mark_approved(&mut self, section: LinkedSection) {
        self.status = section.approved_status().to_string();
        self.approved_by_reception = Some(true);
    }

    pub fn mark_rejected(&mut self, section: LinkedSection) {
        self.status = section.rejected_status().to_string();
        self.rejected_by_reception = Some(true);
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{LinkedOrder, LinkedSection};
    use crate::store::CollectionKey;

    #[test]
    fn sections_map_to_their_collections() {
        assert_eq!(LinkedSection::Coffee.collection(), CollectionKey::CoffeeOrders);
        assert_eq!(LinkedSection::Laundry.collection(), CollectionKey::LaundryRequests);
        assert_eq!(LinkedSection::Restaurant.collection(), CollectionKey::RestaurantOrders);
    }

    #[test]
    fn patching_preserves_subsystem_owned_fields() {
        let raw = json!({
            "id": "C9",
            "status": "pending",
            "items": [{"name": "espresso", "qty": 2}],
            "total": 24.5
        });
        let mut order: LinkedOrder = serde_json::from_value(raw).expect("order should decode");

        order.mark_approved(LinkedSection::Coffee);
        let encoded = serde_json::to_value(&order).expect("order should encode");

        assert_eq!(encoded["status"], "preparing");
        assert_eq!(encoded["approvedByReception"], true);
        assert_eq!(encoded["items"][0]["name"], "espresso");
        assert_eq!(encoded["total"], 24.5);
        assert!(encoded.get("rejectedByReception").is_none());
    }

    #[test]
    fn rejection_cancels_in_every_section() {
        for section in [LinkedSection::Coffee, LinkedSection::Laundry, LinkedSection::Restaurant] {
            let mut order = LinkedOrder::new("O-1", "pending");
            order.mark_rejected(section);
            assert_eq!(order.status, "cancelled");
            assert_eq!(order.rejected_by_reception, Some(true));
        }
    }

    #[test]
    fn laundry_uses_in_progress_for_approval() {
        let mut order = LinkedOrder::new("L-3", "received");
        order.mark_approved(LinkedSection::Laundry);
        assert_eq!(order.status, "in-progress");
    }
}
