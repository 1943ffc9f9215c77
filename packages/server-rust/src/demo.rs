//! Sample `Widget` resource served by the demo binary.
//!
//! `sku` is unique across widgets; `description` and `sku` can be cleared
//! with an explicit `null` in a PATCH body.

use common_core::{CreateMessage, Entity, EntityId, EntityMeta, UpdateMessage};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Widget {
    #[serde(flatten)]
    pub meta: EntityMeta,
    pub name: String,
    pub sku: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub quantity: i64,
}

impl Entity for Widget {
    const RESOURCE: &'static str = "Widget";
    const COLLECTION: &'static str = "widgets";
    const UNIQUE_FIELDS: &'static [&'static str] = &["sku"];

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateWidget {
    pub name: String,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub quantity: i64,
}

impl CreateWidget {
    /// A widget with only a name.
    #[must_use]
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            sku: None,
            description: None,
            quantity: 0,
        }
    }
}

impl CreateMessage<Widget> for CreateWidget {
    fn into_entity(self, meta: EntityMeta) -> Widget {
        Widget {
            meta,
            name: self.name,
            sku: self.sku,
            description: self.description,
            quantity: self.quantity,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateWidget {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        default,
        deserialize_with = "common_core::message::present",
        skip_serializing_if = "Option::is_none"
    )]
    pub sku: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "common_core::message::present",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<i64>,
}

impl UpdateMessage for UpdateWidget {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetResponse {
    pub id: EntityId,
    pub created_at: i64,
    pub updated_at: Option<i64>,
    pub name: String,
    pub sku: Option<String>,
    pub description: Option<String>,
    pub quantity: i64,
}

impl From<Widget> for WidgetResponse {
    fn from(widget: Widget) -> Self {
        Self {
            id: widget.meta.id,
            created_at: widget.meta.created_at,
            updated_at: widget.meta.updated_at,
            name: widget.name,
            sku: widget.sku,
            description: widget.description,
            quantity: widget.quantity,
        }
    }
}
