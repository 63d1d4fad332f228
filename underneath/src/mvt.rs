// Copyright 2025 the Underneath Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Mapbox Vector Tile reader backed by `mvt-reader`.

use mvt_reader::Reader;
use mvt_reader::feature::Value;

use crate::decoder::TileReader;
use crate::error::DecodeError;
use crate::feature::{Properties, PropertyValue, RawFeature, RawLayer};

/// Reads protobuf-encoded Mapbox Vector Tiles.
#[derive(Copy, Clone, Debug, Default)]
pub struct MvtReader;

impl TileReader for MvtReader {
    fn read(&self, bytes: &[u8]) -> Result<Vec<RawLayer>, DecodeError> {
        let reader =
            Reader::new(bytes.to_vec()).map_err(|err| DecodeError::Malformed(err.to_string()))?;
        let metadata = reader
            .get_layer_metadata()
            .map_err(|err| DecodeError::Malformed(err.to_string()))?;

        let mut layers = Vec::with_capacity(metadata.len());
        for layer in metadata {
            let features = reader
                .get_features(layer.layer_index)
                .map_err(|err| DecodeError::Layer {
                    layer: layer.name.clone(),
                    message: err.to_string(),
                })?;
            layers.push(RawLayer {
                name: layer.name,
                extent: layer.extent,
                features: features
                    .into_iter()
                    .map(|f| RawFeature {
                        id: f.id,
                        properties: f
                            .properties
                            .map(|props| {
                                props
                                    .into_iter()
                                    .map(|(k, v)| (k, property_value(v)))
                                    .collect::<Properties>()
                            })
                            .unwrap_or_default(),
                        geometry: f.geometry,
                    })
                    .collect(),
            });
        }
        Ok(layers)
    }
}

fn property_value(value: Value) -> PropertyValue {
    match value {
        Value::String(s) => PropertyValue::String(s),
        Value::Float(v) => PropertyValue::Float(f64::from(v)),
        Value::Double(v) => PropertyValue::Float(v),
        Value::Int(v) | Value::SInt(v) => PropertyValue::Int(v),
        Value::UInt(v) => PropertyValue::UInt(v),
        Value::Bool(v) => PropertyValue::Bool(v),
        Value::Null => PropertyValue::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_is_malformed() {
        // Field 1 with wire type 7 does not exist in protobuf.
        let err = MvtReader.read(&[0x0f, 0xff, 0xff]).unwrap_err();
        assert!(matches!(err, DecodeError::Malformed(_) | DecodeError::Layer { .. }));
    }

    #[test]
    fn empty_tile_has_no_layers() {
        let layers = MvtReader.read(&[]).unwrap();
        assert!(layers.is_empty());
    }

    #[test]
    fn values_convert() {
        assert_eq!(property_value(Value::SInt(-4)), PropertyValue::Int(-4));
        assert_eq!(property_value(Value::Float(0.5)), PropertyValue::Float(0.5));
        assert_eq!(property_value(Value::String("x".into())), PropertyValue::from("x"));
    }
}
