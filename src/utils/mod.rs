//! 通用工具模块
pub mod url_normalizer;
pub mod version_extractor;

pub use self::url_normalizer::UrlNormalizer;
pub use self::version_extractor::VersionExtractor;
