//! Device and configuration metadata.
//!
//! ## Types
//!
//! - [`DeviceMetadata`]: the thing model of a device (properties, functions,
//!   events, tags), each item carrying an `expands` side table
//! - [`ConfigMetadata`]: a configuration schema a protocol exposes per
//!   transport
//! - [`Feature`]: a named capability flag
//! - [`DeviceMetadataCodec`]: (de)serializes [`DeviceMetadata`] documents

pub mod merge;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::error::{ProtocolError, Result};

pub use merge::{merge_expands, ExpandsMerge, ExpandsMergeMode, MergeOption};

/// Expansion side table.
pub type Expands = HashMap<String, Value>;

/// Which part of a device model a metadata item belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceMetadataType {
    Device,
    Property,
    Function,
    Event,
    Tag,
}

/// A property, function, event or tag definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataItem {
    pub id: String,
    pub name: String,
    /// Data type id (e.g., "float", "string", "object")
    #[serde(default)]
    pub value_type: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub expands: Expands,
}

impl MetadataItem {
    pub fn new(id: impl Into<String>, name: impl Into<String>, value_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            value_type: value_type.into(),
            expands: Expands::new(),
        }
    }

    pub fn with_expand(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.expands.insert(key.into(), value.into());
        self
    }
}

/// Thing model of a device or product.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceMetadata {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub properties: Vec<MetadataItem>,
    #[serde(default)]
    pub functions: Vec<MetadataItem>,
    #[serde(default)]
    pub events: Vec<MetadataItem>,
    #[serde(default)]
    pub tags: Vec<MetadataItem>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub expands: Expands,
}

impl DeviceMetadata {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_property(mut self, item: MetadataItem) -> Self {
        self.properties.push(item);
        self
    }

    pub fn with_function(mut self, item: MetadataItem) -> Self {
        self.functions.push(item);
        self
    }

    pub fn with_event(mut self, item: MetadataItem) -> Self {
        self.events.push(item);
        self
    }

    pub fn with_tag(mut self, item: MetadataItem) -> Self {
        self.tags.push(item);
        self
    }

    pub fn property(&self, id: &str) -> Option<&MetadataItem> {
        self.properties.iter().find(|p| p.id == id)
    }

    pub fn items(&self, metadata_type: DeviceMetadataType) -> &[MetadataItem] {
        match metadata_type {
            DeviceMetadataType::Property => &self.properties,
            DeviceMetadataType::Function => &self.functions,
            DeviceMetadataType::Event => &self.events,
            DeviceMetadataType::Tag => &self.tags,
            DeviceMetadataType::Device => &[],
        }
    }

    /// Merge `other` into this document.
    ///
    /// Items are matched by id. With [`MergeOption::IgnoreExists`] existing
    /// items are kept untouched. With [`MergeOption::MergeExpands`] the
    /// incoming item replaces the existing one but inherits the existing
    /// expands under [`merge_expands`]. Otherwise incoming items replace or
    /// append.
    pub fn merge(&mut self, other: &DeviceMetadata, options: &[MergeOption]) {
        merge_items(DeviceMetadataType::Property, &mut self.properties, &other.properties, options);
        merge_items(DeviceMetadataType::Function, &mut self.functions, &other.functions, options);
        merge_items(DeviceMetadataType::Event, &mut self.events, &other.events, options);
        merge_items(DeviceMetadataType::Tag, &mut self.tags, &other.tags, options);
        merge_expands(DeviceMetadataType::Device, &other.expands, &mut self.expands, options);
    }
}

fn merge_items(
    metadata_type: DeviceMetadataType,
    target: &mut Vec<MetadataItem>,
    incoming: &[MetadataItem],
    options: &[MergeOption],
) {
    let ignore_exists = MergeOption::has(options, &MergeOption::IgnoreExists);
    let merge_expands_enabled = MergeOption::has(options, &MergeOption::MergeExpands);

    for item in incoming {
        match target.iter().position(|existing| existing.id == item.id) {
            Some(_) if ignore_exists => {}
            Some(index) if merge_expands_enabled => {
                let mut expands = std::mem::take(&mut target[index].expands);
                merge_expands(metadata_type, &item.expands, &mut expands, options);
                target[index] = MetadataItem {
                    expands,
                    ..item.clone()
                };
            }
            Some(index) => target[index] = item.clone(),
            None => target.push(item.clone()),
        }
    }
}

/// A single configurable property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigProperty {
    pub property: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub value_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
}

impl ConfigProperty {
    pub fn new(property: impl Into<String>, name: impl Into<String>, value_type: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            name: name.into(),
            description: String::new(),
            value_type: value_type.into(),
            default_value: None,
        }
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }
}

/// Configuration schema exposed by a protocol.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMetadata {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub properties: Vec<ConfigProperty>,
}

impl ConfigMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_property(mut self, property: ConfigProperty) -> Self {
        self.properties.push(property);
        self
    }
}

/// Capability flag advertised per transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Feature {
    pub id: String,
    pub name: String,
}

impl Feature {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Supplies extra configuration schemas for individual metadata items,
/// e.g. the register address a Modbus property maps to.
#[async_trait]
pub trait ExpandsConfigMetadataProvider: Send + Sync {
    async fn config_metadata(
        &self,
        metadata_type: DeviceMetadataType,
        metadata_id: &str,
        data_type_id: &str,
    ) -> Vec<ConfigMetadata>;
}

/// Encodes and decodes [`DeviceMetadata`] documents.
pub trait DeviceMetadataCodec: Send + Sync {
    /// Codec identifier (e.g., "neomind")
    fn id(&self) -> &str;

    fn decode(&self, source: &str) -> Result<DeviceMetadata>;

    fn encode(&self, metadata: &DeviceMetadata) -> Result<String>;
}

/// Default JSON metadata codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonMetadataCodec;

impl DeviceMetadataCodec for JsonMetadataCodec {
    fn id(&self) -> &str {
        "neomind"
    }

    fn decode(&self, source: &str) -> Result<DeviceMetadata> {
        serde_json::from_str(source)
            .map_err(|e| ProtocolError::Codec(format!("invalid device metadata: {}", e)))
    }

    fn encode(&self, metadata: &DeviceMetadata) -> Result<String> {
        Ok(serde_json::to_string(metadata)?)
    }
}
