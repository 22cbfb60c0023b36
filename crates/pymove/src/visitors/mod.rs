//! AST visitors used by the scanner.

mod import_discovery;

pub use import_discovery::{DiscoveredImport, ImportDiscoveryVisitor};
