//! YAML configuration for building decoders from `.proto` files.
//!
//! ```yaml
//! proto_file: schemas/addressbook.proto
//! include_paths:
//!   - schemas
//! message_type: tutorial.AddressBook
//! fields:
//!   - people.name
//!   - people.phones.number
//! ```

use crate::decoder::PartialDecoder;
use crate::error::{Error, Result};
use proto_schema::ProtoSchema;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Configuration for one partial decoder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialDecoderConfig {
    /// Path to the `.proto` file declaring the message
    pub proto_file: PathBuf,
    /// Import directories; the proto file's directory when empty
    #[serde(default)]
    pub include_paths: Vec<PathBuf>,
    /// Full or unique simple name of the source message
    pub message_type: String,
    /// Selection paths; empty selects every field
    #[serde(default)]
    pub fields: Vec<String>,
}

impl PartialDecoderConfig {
    /// Parse a configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a YAML file.
    ///
    /// Relative `proto_file` and `include_paths` entries are resolved
    /// against the directory holding the configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let mut config = Self::from_yaml(&content)?;

        if let Some(base) = path.parent() {
            config.proto_file = resolve(base, &config.proto_file);
            config.include_paths = config
                .include_paths
                .iter()
                .map(|include| resolve(base, include))
                .collect();
        }
        debug!("Loaded decoder configuration from {}", path.display());
        Ok(config)
    }

    /// Parse the configured `.proto` file.
    pub fn load_schema(&self) -> Result<ProtoSchema> {
        let schema = if self.include_paths.is_empty() {
            ProtoSchema::from_file(&self.proto_file)?
        } else {
            ProtoSchema::from_files(&[&self.proto_file], &self.include_paths)?
        };
        Ok(schema)
    }

    pub fn build_decoder(&self) -> Result<PartialDecoder> {
        let schema = self.load_schema()?;
        self.build_decoder_with(&schema)
    }

    /// Build a decoder against an already loaded schema.
    pub fn build_decoder_with(&self, schema: &ProtoSchema) -> Result<PartialDecoder> {
        let source = schema.get_message(&self.message_type)?;
        PartialDecoder::for_fields(&source, &self.fields)
    }

    fn validate(&self) -> Result<()> {
        if self.message_type.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "message_type must not be empty".to_string(),
            ));
        }
        if self.proto_file.as_os_str().is_empty() {
            return Err(Error::InvalidConfig("proto_file must not be empty".to_string()));
        }
        Ok(())
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protobuf::CodedOutputStream;
    use tempfile::TempDir;

    const INVENTORY_PROTO: &str = r#"
        syntax = "proto3";
        package inventory;

        message Item {
            string sku = 1;
            string description = 2;
            int32 quantity = 3;
        }
    "#;

    #[test]
    fn test_from_yaml_defaults() {
        let config = PartialDecoderConfig::from_yaml(
            r#"
proto_file: item.proto
message_type: Item
"#,
        )
        .expect("Failed to parse config");

        assert_eq!(config.proto_file, PathBuf::from("item.proto"));
        assert!(config.include_paths.is_empty());
        assert!(config.fields.is_empty());
    }

    #[test]
    fn test_empty_message_type_is_rejected() {
        let err = PartialDecoderConfig::from_yaml("proto_file: a.proto\nmessage_type: ''\n")
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn test_missing_key_is_a_yaml_error() {
        let err = PartialDecoderConfig::from_yaml("proto_file: a.proto\n").unwrap_err();
        assert!(matches!(err, Error::Yaml(_)));
    }

    #[test]
    fn test_yaml_round_trip() {
        let config = PartialDecoderConfig {
            proto_file: PathBuf::from("protos/item.proto"),
            include_paths: vec![PathBuf::from("protos")],
            message_type: "inventory.Item".to_string(),
            fields: vec!["sku".to_string(), "quantity".to_string()],
        };
        let yaml = serde_yaml::to_string(&config).expect("Failed to serialize config");
        assert_eq!(PartialDecoderConfig::from_yaml(&yaml).expect("Failed to parse config"), config);
    }

    #[test]
    fn test_from_file_builds_working_decoder() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        fs::create_dir(dir.path().join("protos")).expect("Failed to write test file");
        fs::write(dir.path().join("protos/item.proto"), INVENTORY_PROTO)
            .expect("Failed to write test file");
        let config_path = dir.path().join("decoder.yaml");
        fs::write(
            &config_path,
            r#"
proto_file: protos/item.proto
include_paths:
  - protos
message_type: inventory.Item
fields:
  - sku
  - quantity
"#,
        )
        .expect("Failed to write test file");

        let config = PartialDecoderConfig::from_file(&config_path).expect("Failed to load config");
        assert_eq!(config.proto_file, dir.path().join("protos/item.proto"));
        assert_eq!(config.include_paths, vec![dir.path().join("protos")]);

        let decoder = config.build_decoder().expect("Failed to build decoder");
        assert_eq!(decoder.message_type(), "inventory.Item");

        let mut buf = Vec::new();
        {
            let mut os = CodedOutputStream::vec(&mut buf);
            os.write_string(1, "A-100").unwrap();
            os.write_string(2, "a long description nobody asked for").unwrap();
            os.write_int32(3, 12).unwrap();
            os.flush().unwrap();
        }

        let item = decoder.decode(&buf).expect("Failed to decode");
        assert_eq!(item.field_names(), vec!["quantity", "sku"]);
        assert_eq!(item.get("sku").and_then(|v| v.as_str()), Some("A-100"));
    }

    #[test]
    fn test_unknown_message_type_is_reported() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        fs::write(dir.path().join("item.proto"), INVENTORY_PROTO)
            .expect("Failed to write test file");
        let config = PartialDecoderConfig {
            proto_file: dir.path().join("item.proto"),
            include_paths: Vec::new(),
            message_type: "Widget".to_string(),
            fields: Vec::new(),
        };

        let err = config.build_decoder().unwrap_err();
        assert!(matches!(
            err,
            Error::Schema(proto_schema::Error::MessageTypeNotFound(_))
        ));
    }

    #[test]
    fn test_missing_config_file_is_io_error() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let err = PartialDecoderConfig::from_file(dir.path().join("absent.yaml")).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
