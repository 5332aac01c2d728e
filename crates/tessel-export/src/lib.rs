//! tessel-export: Pure format serializers (sans-IO)
//!
//! Converts colored triangle sets into the compact `.tri` mesh format
//! and reads them back.

pub mod tri;

pub use tri::{
    DecodeError, DecodedMesh, DecodedTriangle, EncodeError, RecordHeader, decode_tri, encode_tri,
    write_tri,
};
