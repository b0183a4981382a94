//! Resolution and reconciliation services
//!
//! Leaf-first: cache and ladder feed the geocoder; the geocoder and the
//! boundary set feed the village resolver. Records pass through the
//! sanitizer before the reconciler ever sees them.

pub mod address_cache;
pub mod boundary_aggregator;
pub mod candidate_ladder;
pub mod geocoding_client;
pub mod polygon_matcher;
pub mod record_reconciler;
pub mod record_sanitizer;
pub mod structural_parser;
pub mod village_resolver;

pub use address_cache::AddressCache;
pub use candidate_ladder::{CandidateLadder, LadderConfig};
pub use geocoding_client::{GeocodeProvider, GeocodingClient, NominatimProvider};
pub use polygon_matcher::{BoundarySet, VillageBoundary};
pub use village_resolver::{ResolvedVillage, VillageResolver};
