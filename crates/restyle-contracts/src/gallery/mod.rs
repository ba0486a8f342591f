mod manager;
mod store;

pub use manager::GalleryManager;
pub use store::{FileImageStore, ImageStore, MemoryImageStore, StorageError, TABLE_FILE_NAME};
