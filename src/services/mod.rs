pub mod cache;
pub mod media;
pub mod object_key;
pub mod staging;
pub mod storage;
pub mod upload_service;
pub mod video_store;
