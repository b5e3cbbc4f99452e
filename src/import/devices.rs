//! Manufacturer and product names for binary recordings
//!
//! The binary decoder reports devices as profile enum names (`garmin`,
//! `fr945`) or, for products newer than the profile, as raw numbers. The
//! registry turns those into display names and can be extended from TOML.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::models::Creator;

/// Known manufacturer and product names
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceRegistry {
    /// Manufacturer key -> display name
    #[serde(default)]
    pub manufacturers: HashMap<String, String>,

    /// Manufacturer key -> (product key -> display name)
    #[serde(default)]
    pub products: HashMap<String, HashMap<String, String>>,
}

impl DeviceRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            manufacturers: HashMap::new(),
            products: HashMap::new(),
        }
    }

    /// Create registry with default known devices
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.add_default_manufacturers();
        registry.add_default_products();
        registry
    }

    fn add_default_manufacturers(&mut self) {
        for (key, name) in [
            ("garmin", "Garmin"),
            ("suunto", "Suunto"),
            ("polar", "Polar"),
            ("wahoo_fitness", "Wahoo"),
            ("coros", "COROS"),
            ("stages_cycling", "Stages Cycling"),
            ("4iiiis", "4iiii"),
            ("hammerhead", "Hammerhead"),
            ("zwift", "Zwift"),
            ("development", "Development"),
        ] {
            self.add_manufacturer(key, name);
        }
    }

    fn add_default_products(&mut self) {
        for (product, name) in [
            ("edge520", "Edge 520"),
            ("edge530", "Edge 530"),
            ("edge1030", "Edge 1030"),
            ("edge130", "Edge 130"),
            ("fr935", "Forerunner 935"),
            ("fr945", "Forerunner 945"),
            ("fr255", "Forerunner 255"),
            ("fenix6", "fenix 6"),
            ("fenix7", "fenix 7"),
            ("hrm_pro", "HRM-Pro"),
        ] {
            self.add_product("garmin", product, name);
        }

        for (product, name) in [
            ("16", "ELEMNT BOLT"),
            ("27", "ELEMNT ROAM"),
        ] {
            self.add_product("wahoo_fitness", product, name);
        }

        for (product, name) in [
            ("34", "9"),
            ("35", "9 Baro"),
            ("40", "5"),
        ] {
            self.add_product("suunto", product, name);
        }
    }

    pub fn add_manufacturer(&mut self, key: &str, name: &str) {
        self.manufacturers.insert(normalize(key), name.to_string());
    }

    pub fn add_product(&mut self, manufacturer: &str, product: &str, name: &str) {
        self.products
            .entry(normalize(manufacturer))
            .or_default()
            .insert(normalize(product), name.to_string());
    }

    /// Adds every entry of `other`, replacing names already present
    pub fn extend(&mut self, other: DeviceRegistry) {
        for (key, name) in other.manufacturers {
            self.add_manufacturer(&key, &name);
        }
        for (manufacturer, products) in other.products {
            for (product, name) in products {
                self.add_product(&manufacturer, &product, &name);
            }
        }
    }

    /// Load registry from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).with_context(|| {
            format!("Failed to read device registry file: {}", path.as_ref().display())
        })?;

        let registry: DeviceRegistry =
            toml::from_str(&content).with_context(|| "Failed to parse TOML device registry")?;

        Ok(registry)
    }

    /// Save registry to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)
            .with_context(|| "Failed to serialize device registry to TOML")?;

        fs::write(&path, toml_content).with_context(|| {
            format!("Failed to write device registry file: {}", path.as_ref().display())
        })?;

        Ok(())
    }

    pub fn manufacturer_name(&self, manufacturer: &str) -> Option<&str> {
        self.manufacturers
            .get(&normalize(manufacturer))
            .map(String::as_str)
    }

    pub fn product_name(&self, manufacturer: &str, product: &str) -> Option<&str> {
        self.products
            .get(&normalize(manufacturer))
            .and_then(|products| products.get(&normalize(product)))
            .map(String::as_str)
    }

    /// Display label for a device. Unregistered combinations fall back to
    /// `"<manufacturer> (<product>)"`.
    pub fn label(&self, manufacturer: Option<&str>, product: Option<&str>) -> String {
        let Some(manufacturer) = manufacturer else {
            return product.map(str::to_string).unwrap_or_else(|| "Unknown".to_string());
        };

        let known_manufacturer = self.manufacturer_name(manufacturer);
        match (known_manufacturer, product) {
            (Some(brand), Some(product)) => match self.product_name(manufacturer, product) {
                Some(model) => format!("{} {}", brand, model),
                None => {
                    tracing::warn!(manufacturer, product, "Unregistered product");
                    format!("{} ({})", brand, product)
                }
            },
            (Some(brand), None) => brand.to_string(),
            (None, Some(product)) => {
                tracing::warn!(manufacturer, product, "Unregistered manufacturer");
                format!("{} ({})", manufacturer, product)
            }
            (None, None) => {
                tracing::warn!(manufacturer, "Unregistered manufacturer");
                manufacturer.to_string()
            }
        }
    }

    pub fn creator(
        &self,
        manufacturer: Option<&str>,
        product: Option<&str>,
        serial_number: Option<String>,
        software_version: Option<String>,
    ) -> Creator {
        Creator {
            name: self.label(manufacturer, product),
            sw_info: software_version,
            hw_info: product.map(str::to_string),
            serial_number,
        }
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn normalize(key: &str) -> String {
    key.trim().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_registry_with_defaults() {
        let registry = DeviceRegistry::with_defaults();

        assert_eq!(registry.manufacturer_name("garmin"), Some("Garmin"));
        assert_eq!(registry.manufacturer_name("Wahoo_Fitness"), Some("Wahoo"));
        assert_eq!(registry.product_name("garmin", "fr945"), Some("Forerunner 945"));
        assert_eq!(registry.product_name("garmin", "unknown"), None);
    }

    #[test]
    fn test_labels() {
        let registry = DeviceRegistry::default();

        assert_eq!(registry.label(Some("garmin"), Some("edge530")), "Garmin Edge 530");
        assert_eq!(registry.label(Some("garmin"), Some("4440")), "Garmin (4440)");
        assert_eq!(registry.label(Some("acme"), Some("7")), "acme (7)");
        assert_eq!(registry.label(Some("polar"), None), "Polar");
        assert_eq!(registry.label(None, None), "Unknown");
    }

    #[test]
    fn test_creator_fields() {
        let registry = DeviceRegistry::default();
        let creator = registry.creator(
            Some("suunto"),
            Some("34"),
            Some("123".to_string()),
            Some("2.1".to_string()),
        );

        assert_eq!(creator.name, "Suunto 9");
        assert_eq!(creator.serial_number.as_deref(), Some("123"));
        assert_eq!(creator.sw_info.as_deref(), Some("2.1"));
    }

    #[test]
    fn test_toml_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("devices.toml");

        let mut registry = DeviceRegistry::new();
        registry.add_manufacturer("acme", "ACME");
        registry.add_product("acme", "7", "Roadrunner");
        registry.save_to_file(&path).unwrap();

        let loaded = DeviceRegistry::load_from_file(&path).unwrap();
        assert_eq!(loaded.label(Some("acme"), Some("7")), "ACME Roadrunner");
    }

    #[test]
    fn test_extend_overrides_defaults() {
        let extra: DeviceRegistry = toml::from_str(
            "[manufacturers]\nAcme = \"ACME\"\n\n[products.suunto]\n34 = \"9 Peak\"\n",
        )
        .unwrap();

        let mut registry = DeviceRegistry::with_defaults();
        registry.extend(extra);

        assert_eq!(registry.label(Some("acme"), None), "ACME");
        assert_eq!(registry.label(Some("suunto"), Some("34")), "Suunto 9 Peak");
        assert_eq!(registry.label(Some("garmin"), Some("fr945")), "Garmin Forerunner 945");
    }
}
