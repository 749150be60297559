//! Clustering backend API types
//!
//! Two layers live here:
//! - Wire shapes exactly as the backend sends them (`*Response` structs)
//! - Decoded domain types (`ClusterId`, `Exemplar`, `FinalLabels`) that the
//!   review session works with
//!
//! Decoding happens once, at the gateway boundary. The session never sees a
//! raw `-1`.

pub mod types;

pub use types::{
    ClosestResponse, ClusterId, Exemplar, ExemplarKind, FarthestResponse, FinalLabels,
    FinalLabelsResponse, UploadResponse, SENTINEL,
};
