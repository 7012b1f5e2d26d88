//! # schema
//!
//! why: describe the time series registered in the catalog so they travel with slot data
//! relations: produced by catalog.rs, stored in snapshot.rs, served by traits::Catalog
//! what: SeriesSchema descriptor, its type/encoding/compression enums, SchemaSet

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Value type of a time series
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DataType {
    Boolean,
    Int32,
    Int64,
    Float,
    Double,
    Text,
}

/// On-disk encoding of a time series
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Encoding {
    Plain,
    Rle,
    Ts2Diff,
    Gorilla,
}

/// Compression applied to a time series' pages
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Compressor {
    Uncompressed,
    Snappy,
    Gzip,
    Lz4,
}

/// Schema of one registered time series
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SeriesSchema {
    /// full series path, e.g. `root.sg1.d1.s1`
    pub path: String,
    pub data_type: DataType,
    pub encoding: Encoding,
    pub compressor: Compressor,
}

impl SeriesSchema {
    pub fn new(
        path: impl Into<String>,
        data_type: DataType,
        encoding: Encoding,
        compressor: Compressor,
    ) -> Self {
        Self {
            path: path.into(),
            data_type,
            encoding,
            compressor,
        }
    }

    /// Plain-encoded, uncompressed series of the given type
    pub fn plain(path: impl Into<String>, data_type: DataType) -> Self {
        Self::new(path, data_type, Encoding::Plain, Compressor::Uncompressed)
    }
}

/// Ordered set of schemas belonging to one slot
pub type SchemaSet = BTreeSet<SeriesSchema>;
