pub mod executable;
pub mod frame_allocator;
pub mod storage;
