//! Model registry implementing ModelProvider
//!
//! This module provides a concrete implementation of ModelProvider using ModelInfo.

use crate::model_info::{ModelInfo, PropertyInfo, TypeInfo};
use crate::provider::{ModelProvider, ModelProviderError};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;

/// Model registry that implements ModelProvider
#[derive(Clone)]
pub struct ModelRegistry {
    model_info: Arc<RwLock<ModelInfo>>,
}

impl ModelRegistry {
    /// Create a new model registry from ModelInfo
    pub fn new(model_info: ModelInfo) -> Self {
        Self {
            model_info: Arc::new(RwLock::new(model_info)),
        }
    }

    /// Load ModelInfo from XML string
    pub fn from_xml(xml: &str) -> Result<Self, ModelProviderError> {
        let model_info = crate::model_info::parse_xml(xml)
            .map_err(|e| ModelProviderError::ParseError(e.to_string()))?;
        Ok(Self::new(model_info))
    }

    /// Load ModelInfo from JSON string
    pub fn from_json(json: &str) -> Result<Self, ModelProviderError> {
        let model_info = crate::model_info::parse_json(json)
            .map_err(|e| ModelProviderError::ParseError(e.to_string()))?;
        Ok(Self::new(model_info))
    }

    /// Load ModelInfo from XML file at runtime
    pub fn from_xml_file(path: impl AsRef<std::path::Path>) -> Result<Self, ModelProviderError> {
        let xml = std::fs::read_to_string(path)
            .map_err(|e| ModelProviderError::IoError(e.to_string()))?;
        Self::from_xml(&xml)
    }

    /// Load ModelInfo from JSON file at runtime
    pub fn from_json_file(path: impl AsRef<std::path::Path>) -> Result<Self, ModelProviderError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| ModelProviderError::IoError(e.to_string()))?;
        Self::from_json(&json)
    }

    /// Auto-detect and load ModelInfo from file based on extension (.xml or .json)
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ModelProviderError> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some("xml") => Self::from_xml_file(path),
            Some("json") => Self::from_json_file(path),
            Some(ext) => Err(ModelProviderError::ParseError(format!(
                "Unsupported file extension: .{}. Expected .xml or .json",
                ext
            ))),
            None => Err(ModelProviderError::ParseError(
                "No file extension found. Expected .xml or .json".to_string(),
            )),
        }
    }

    /// Get the model name
    pub fn model_name(&self) -> String {
        self.model_info.read().name.clone()
    }

    /// Get the model version
    pub fn model_version(&self) -> String {
        self.model_info.read().version.clone()
    }

    /// Get the model URL
    pub fn model_url(&self) -> String {
        self.model_info.read().url.clone()
    }

    /// Get all retrievable types
    pub fn get_retrievable_types(&self) -> Vec<String> {
        self.model_info
            .read()
            .get_retrievable_types()
            .iter()
            .map(|s| s.to_string())
            .collect()
    }
}

#[async_trait]
impl ModelProvider for ModelRegistry {
    async fn get_type(&self, type_name: &str) -> Result<Option<TypeInfo>, ModelProviderError> {
        let model = self.model_info.read();
        Ok(model.get_type(type_name).cloned())
    }

    async fn get_property_type(
        &self,
        parent: &str,
        property: &str,
    ) -> Result<Option<PropertyInfo>, ModelProviderError> {
        let model = self.model_info.read();
        Ok(model.get_property_type(parent, property).cloned())
    }

    fn is_retrievable(&self, type_name: &str) -> bool {
        let model = self.model_info.read();
        model.is_retrievable(type_name)
    }

    fn get_primary_code_path(&self, type_name: &str) -> Option<String> {
        let model = self.model_info.read();
        model.get_primary_code_path(type_name)
    }
}
