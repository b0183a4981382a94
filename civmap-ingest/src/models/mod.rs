//! Data models for civmap-ingest

pub mod community_record;

pub use community_record::{
    CommunityRecord, KeyedCollection, KeyedItem, MergedRecord, RecordPatch,
};
