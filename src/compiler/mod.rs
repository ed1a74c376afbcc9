//! 编译模块：将特征规则编译为可执行的匹配模式
pub mod pattern;
pub mod compiler;

pub use self::pattern::{CompiledPattern, CompiledSignature, CompiledSignatureLibrary, CompiledVersion, Matcher};
pub use self::compiler::{RuleCompiler, BUILTIN_COMPILED_LIB};
