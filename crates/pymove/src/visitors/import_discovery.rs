//! Import discovery visitor that finds every import statement in a Python module together with
//! how deeply it is nested, so callers can decide which ones take part in matching.

use ruff_python_ast::visitor::{Visitor, walk_stmt};
use ruff_python_ast::{ModModule, Stmt};
use ruff_text_size::{Ranged, TextRange};

use crate::import_rewriter::ImportStatement;

/// An import statement discovered during AST traversal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredImport {
    /// Normalized form of the statement
    pub statement: ImportStatement,
    /// Number of enclosing function, class or block scopes, zero in the module body
    pub depth: usize,
    /// Source range of the whole statement
    pub range: TextRange,
}

impl DiscoveredImport {
    /// Directly in the module body
    pub fn is_module_level(&self) -> bool {
        self.depth == 0
    }
}

/// Visitor that discovers all imports in a Python module
#[derive(Debug, Default)]
pub struct ImportDiscoveryVisitor {
    imports: Vec<DiscoveredImport>,
    depth: usize,
}

impl ImportDiscoveryVisitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all discovered imports in source order
    pub fn into_imports(self) -> Vec<DiscoveredImport> {
        self.imports
    }

    fn record(&mut self, stmt: &Stmt) {
        if let Some(statement) = ImportStatement::from_stmt(stmt) {
            self.imports.push(DiscoveredImport {
                statement,
                depth: self.depth,
                range: stmt.range(),
            });
        }
    }

    fn walk_scoped(&mut self, stmt: &Stmt) {
        self.depth += 1;
        walk_stmt(self, stmt);
        self.depth -= 1;
    }

    /// Visit a module and discover all imports
    pub fn visit_module(&mut self, module: &ModModule) {
        for stmt in &module.body {
            self.visit_stmt(stmt);
        }
    }
}

impl<'a> Visitor<'a> for ImportDiscoveryVisitor {
    fn visit_stmt(&mut self, stmt: &'a Stmt) {
        match stmt {
            Stmt::Import(_) | Stmt::ImportFrom(_) => self.record(stmt),
            Stmt::FunctionDef(_)
            | Stmt::ClassDef(_)
            | Stmt::If(_)
            | Stmt::While(_)
            | Stmt::For(_)
            | Stmt::With(_)
            | Stmt::Try(_)
            | Stmt::Match(_) => self.walk_scoped(stmt),
            _ => walk_stmt(self, stmt),
        }
    }
}
