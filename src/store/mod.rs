//! 存储模块：仓储接口、内存实现、快照落盘与站点生命周期管理
pub mod repository;
pub mod memory;
pub mod snapshot;
pub mod lifecycle;

// 导出核心接口
pub use self::repository::Repository;
pub use self::memory::{InMemoryRepository, RepositorySnapshot};
pub use self::snapshot::SnapshotManager;
pub use self::lifecycle::{Admission, LifecycleStore};
