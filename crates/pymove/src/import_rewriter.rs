//! Import matcher and rewriter.
//!
//! Decides, for one import statement and one move plan, whether the statement stays as it is,
//! is rewritten, or is deliberately left alone because rewriting it would mean guessing. The
//! decision is a pure function of the statement and the plan; nothing here touches the
//! filesystem.
//!
//! `from P import N` is ambiguous: `N` may be a submodule of `P` or any symbol defined in `P`.
//! A name is only treated as a module when the plan itself moves `P.N`.
use std::fmt;

use log::trace;
use ruff_python_ast::{self as ast, Identifier, Stmt, StmtImport, StmtImportFrom};
use ruff_text_size::TextRange;

use crate::move_plan::MovePlan;
use crate::resolver::ModulePath;

/// Represents an import statement in a normalized form
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ImportStatement {
    /// Regular import: `import a.b, c as d`
    Import {
        names: Vec<(ModulePath, Option<String>)>,
    },
    /// From import: `from pkg import a, b as c`; `level` counts the leading dots
    FromImport {
        module: Option<ModulePath>,
        names: Vec<(String, Option<String>)>,
        level: u32,
    },
}

impl ImportStatement {
    /// Normalize a parsed statement; `None` for anything that is not an import
    pub fn from_stmt(stmt: &Stmt) -> Option<Self> {
        match stmt {
            Stmt::Import(import_stmt) => {
                let names = import_stmt
                    .names
                    .iter()
                    .map(|alias| {
                        let module = ModulePath::parse(alias.name.as_str())?;
                        Some((module, alias.asname.as_ref().map(|n| n.to_string())))
                    })
                    .collect::<Option<Vec<_>>>()?;
                Some(Self::Import { names })
            }
            Stmt::ImportFrom(import_from) => {
                let module = match &import_from.module {
                    Some(module) => Some(ModulePath::parse(module.as_str())?),
                    None => None,
                };
                let names = import_from
                    .names
                    .iter()
                    .map(|alias| {
                        (
                            alias.name.to_string(),
                            alias.asname.as_ref().map(|n| n.to_string()),
                        )
                    })
                    .collect();
                Some(Self::FromImport {
                    module,
                    names,
                    level: import_from.level,
                })
            }
            _ => None,
        }
    }

    /// Relative imports are never rewritten
    pub fn is_relative(&self) -> bool {
        matches!(self, Self::FromImport { level, .. } if *level > 0)
    }

    /// Create an AST import statement from the normalized representation
    pub fn to_stmt(&self) -> Stmt {
        match self {
            Self::Import { names } => Stmt::Import(StmtImport {
                names: names
                    .iter()
                    .map(|(module, alias)| make_alias(&module.to_string(), alias.as_deref()))
                    .collect(),
                range: TextRange::default(),
            }),
            Self::FromImport {
                module,
                names,
                level,
            } => Stmt::ImportFrom(StmtImportFrom {
                module: module
                    .as_ref()
                    .map(|m| Identifier::new(m.to_string(), TextRange::default())),
                names: names
                    .iter()
                    .map(|(name, alias)| make_alias(name, alias.as_deref()))
                    .collect(),
                level: *level,
                range: TextRange::default(),
            }),
        }
    }
}

fn make_alias(name: &str, asname: Option<&str>) -> ast::Alias {
    ast::Alias {
        name: Identifier::new(name.to_owned(), TextRange::default()),
        asname: asname.map(|a| Identifier::new(a.to_owned(), TextRange::default())),
        range: TextRange::default(),
    }
}

/// Why a matching statement was left unmodified
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Refusal {
    /// Several names would each have to become their own `import` statement
    WouldSplit { module: ModulePath, names: Vec<String> },
    /// Only some of the imported names are moved modules
    PartialMatch {
        module: ModulePath,
        moved: Vec<String>,
        kept: Vec<String>,
    },
    /// The imported modules end up in different packages
    Divergent { module: ModulePath },
}

impl fmt::Display for Refusal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WouldSplit { module, names } => write!(
                f,
                "`from {module} import {}` would have to be split into separate imports",
                names.join(", ")
            ),
            Self::PartialMatch {
                module,
                moved,
                kept,
            } => write!(
                f,
                "`from {module} import ...` mixes moved modules ({}) with other names ({})",
                moved.join(", "),
                kept.join(", ")
            ),
            Self::Divergent { module } => write!(
                f,
                "names imported from {module} move to different packages"
            ),
        }
    }
}

/// Outcome of matching one statement against a plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rewrite {
    /// Nothing in the plan concerns this statement
    Unchanged,
    /// Replacement statement
    Rewritten(ImportStatement),
    /// The statement matched but was left alone
    Refused(Refusal),
}

/// Rewrites import statements according to a move plan
#[derive(Debug, Clone, Copy)]
pub struct ImportRewriter<'a> {
    plan: &'a MovePlan,
}

impl<'a> ImportRewriter<'a> {
    /// Rewriter for one plan
    pub fn new(plan: &'a MovePlan) -> Self {
        Self { plan }
    }

    /// Match `statement` against the plan
    pub fn rewrite(&self, statement: &ImportStatement) -> Rewrite {
        if statement.is_relative() {
            return Rewrite::Unchanged;
        }
        let outcome = match statement {
            ImportStatement::Import { names } => self.rewrite_import(names),
            ImportStatement::FromImport {
                module: Some(module),
                names,
                level: 0,
            } => self.rewrite_import_from(module, names),
            ImportStatement::FromImport { .. } => Rewrite::Unchanged,
        };
        if !matches!(outcome, Rewrite::Unchanged) {
            trace!("{:?} -> {:?}", statement, outcome);
        }
        outcome
    }

    /// `import a.b.c as x`: each target is relocated on its own
    fn rewrite_import(&self, names: &[(ModulePath, Option<String>)]) -> Rewrite {
        let mut changed = false;
        let names = names
            .iter()
            .map(|(module, alias)| match self.plan.relocate(module) {
                Some(relocated) => {
                    changed = true;
                    (relocated, alias.clone())
                }
                None => (module.clone(), alias.clone()),
            })
            .collect();

        if changed {
            Rewrite::Rewritten(ImportStatement::Import { names })
        } else {
            Rewrite::Unchanged
        }
    }

    fn rewrite_import_from(&self, module: &ModulePath, names: &[(String, Option<String>)]) -> Rewrite {
        // The module itself (or an ancestor package) moved: swap the prefix, keep the names.
        if let Some(relocated) = self.plan.relocate(module) {
            return Rewrite::Rewritten(ImportStatement::FromImport {
                module: Some(relocated),
                names: names.to_vec(),
                level: 0,
            });
        }

        // Otherwise look for imported names that the plan proves are moved modules.
        let targets: Vec<Option<&ModulePath>> = names
            .iter()
            .map(|(name, _)| {
                if name == "*" {
                    return None;
                }
                module.child(name).and_then(|full| self.plan.get(&full))
            })
            .collect();

        if targets.iter().all(Option::is_none) {
            return Rewrite::Unchanged;
        }

        if let ([(name, alias)], [Some(new)]) = (names, targets.as_slice()) {
            return Rewrite::Rewritten(relocated_name(new, name, alias.as_deref()));
        }

        if targets.iter().any(Option::is_none) {
            let (moved, kept): (Vec<_>, Vec<_>) = names
                .iter()
                .zip(&targets)
                .partition(|(_, target)| target.is_some());
            return Rewrite::Refused(Refusal::PartialMatch {
                module: module.clone(),
                moved: moved.into_iter().map(|((name, _), _)| name.clone()).collect(),
                kept: kept.into_iter().map(|((name, _), _)| name.clone()).collect(),
            });
        }

        let new_paths: Vec<&ModulePath> = targets.into_iter().flatten().collect();
        let parents: Vec<Option<ModulePath>> = new_paths.iter().map(|new| new.parent()).collect();
        let Some(Some(parent)) = parents.first() else {
            return Rewrite::Refused(Refusal::WouldSplit {
                module: module.clone(),
                names: names.iter().map(|(name, _)| name.clone()).collect(),
            });
        };
        if parents.iter().any(Option::is_none) {
            return Rewrite::Refused(Refusal::WouldSplit {
                module: module.clone(),
                names: names.iter().map(|(name, _)| name.clone()).collect(),
            });
        }
        if parents.iter().any(|p| p.as_ref() != Some(parent)) {
            return Rewrite::Refused(Refusal::Divergent {
                module: module.clone(),
            });
        }

        let names = names
            .iter()
            .zip(new_paths)
            .map(|((name, alias), new)| {
                let local = alias.as_deref().unwrap_or(name);
                (new.name().to_owned(), keep_binding(new.name(), local))
            })
            .collect();
        Rewrite::Rewritten(ImportStatement::FromImport {
            module: Some(parent.clone()),
            names,
            level: 0,
        })
    }
}

/// Statement importing the moved module `new` under the name `from P import name [as alias]`
/// used to bind
fn relocated_name(new: &ModulePath, name: &str, alias: Option<&str>) -> ImportStatement {
    let local = alias.unwrap_or(name);
    match new.parent() {
        Some(parent) => ImportStatement::FromImport {
            module: Some(parent),
            names: vec![(new.name().to_owned(), keep_binding(new.name(), local))],
            level: 0,
        },
        None => ImportStatement::Import {
            names: vec![(new.clone(), keep_binding(new.name(), local))],
        },
    }
}

/// Alias needed so that importing `imported` still binds `local`
fn keep_binding(imported: &str, local: &str) -> Option<String> {
    (imported != local).then(|| local.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::move_plan::MoveEntry;
    use pretty_assertions::assert_eq;
    use ruff_python_parser::parse_module;

    fn module(dotted: &str) -> ModulePath {
        ModulePath::parse(dotted).expect("valid module path")
    }

    fn plan(entries: &[(&str, &str)]) -> MovePlan {
        MovePlan::from_entries(
            entries
                .iter()
                .map(|(old, new)| MoveEntry::new(module(old), module(new))),
        )
        .expect("valid plan")
    }

    fn statement(source: &str) -> ImportStatement {
        let parsed = parse_module(source).expect("Failed to parse test statement");
        ImportStatement::from_stmt(&parsed.syntax().body[0]).expect("import statement")
    }

    /// Rewrite `source` and render the result the way the writer does
    fn rewrite(plan: &MovePlan, source: &str) -> Rewrite {
        ImportRewriter::new(plan).rewrite(&statement(source))
    }

    fn rewritten(plan: &MovePlan, source: &str) -> String {
        match rewrite(plan, source) {
            Rewrite::Rewritten(stmt) => {
                let empty = parse_module("").expect("empty module parses");
                let stylist = ruff_python_codegen::Stylist::from_tokens(empty.tokens(), "");
                ruff_python_codegen::Generator::from(&stylist).stmt(&stmt.to_stmt())
            }
            other => panic!("expected a rewrite of {source:?}, got {other:?}"),
        }
    }

    #[test]
    fn test_plain_import_exact_and_descendant() {
        let plan = plan(&[("pkg", "lib.pkg2"), ("pkg.sub", "lib.pkg2.sub")]);
        assert_eq!(rewritten(&plan, "import pkg.sub"), "import lib.pkg2.sub");
        assert_eq!(rewritten(&plan, "import pkg"), "import lib.pkg2");
        assert_eq!(
            rewritten(&plan, "import pkg.sub.deep as d"),
            "import lib.pkg2.sub.deep as d"
        );
        assert_eq!(rewrite(&plan, "import pkgx"), Rewrite::Unchanged);
    }

    #[test]
    fn test_plain_import_mixed_targets_rewritten_per_target() {
        let plan = plan(&[("module", "subpackage.module")]);
        assert_eq!(
            rewritten(&plan, "import os, module as m, sys"),
            "import os, subpackage.module as m, sys"
        );
    }

    #[test]
    fn test_from_import_module_prefix() {
        let plan = plan(&[("pkg", "lib.pkg2"), ("pkg.sub", "lib.pkg2.sub")]);
        assert_eq!(rewritten(&plan, "from pkg import sub"), "from lib.pkg2 import sub");
        assert_eq!(
            rewritten(&plan, "from pkg.sub import a, b as c"),
            "from lib.pkg2.sub import a, b as c"
        );
        assert_eq!(rewritten(&plan, "from pkg import *"), "from lib.pkg2 import *");
    }

    #[test]
    fn test_from_import_longest_prefix_wins() {
        let plan = plan(&[("pkg", "lib.pkg"), ("pkg.sub", "elsewhere.sub")]);
        assert_eq!(rewritten(&plan, "from pkg.sub.x import y"), "from elsewhere.sub.x import y");
    }

    #[test]
    fn test_from_import_exact_module_match() {
        let plan = plan(&[("module", "subpackage.module")]);
        assert_eq!(
            rewritten(&plan, "from module import thing"),
            "from subpackage.module import thing"
        );
        assert_eq!(rewritten(&plan, "import module"), "import subpackage.module");
    }

    #[test]
    fn test_single_name_becomes_plain_import_when_top_level() {
        let plan = plan(&[("pkg.module", "module")]);
        assert_eq!(rewritten(&plan, "from pkg import module"), "import module");
        assert_eq!(
            rewritten(&plan, "from pkg import module as m"),
            "import module as m"
        );
    }

    #[test]
    fn test_single_name_keeps_local_binding_on_rename() {
        let plan = plan(&[("pkg.module", "renamed")]);
        assert_eq!(rewritten(&plan, "from pkg import module"), "import renamed as module");

        let plan = MovePlan::from_entries([MoveEntry::new(
            module("pkg.module"),
            module("other.helpers"),
        )])
        .expect("valid plan");
        assert_eq!(
            rewritten(&plan, "from pkg import module"),
            "from other import helpers as module"
        );
        assert_eq!(
            rewritten(&plan, "from pkg import module as helpers"),
            "from other import helpers"
        );
    }

    #[test]
    fn test_multi_name_never_split() {
        let plan = plan(&[("pkg.module", "module")]);
        assert!(matches!(
            rewrite(&plan, "from pkg import module, other"),
            Rewrite::Refused(Refusal::PartialMatch { .. })
        ));

        let plan = self::plan(&[("pkg.a", "a"), ("pkg.b", "b")]);
        assert!(matches!(
            rewrite(&plan, "from pkg import a, b"),
            Rewrite::Refused(Refusal::WouldSplit { .. })
        ));
    }

    #[test]
    fn test_multi_name_with_common_new_parent() {
        let plan = plan(&[("pkg.a", "lib.a"), ("pkg.b", "lib.bee")]);
        assert_eq!(
            rewritten(&plan, "from pkg import a, b"),
            "from lib import a, bee as b"
        );

        let plan = self::plan(&[("pkg.a", "lib.a"), ("pkg.b", "other.b")]);
        assert!(matches!(
            rewrite(&plan, "from pkg import a, b"),
            Rewrite::Refused(Refusal::Divergent { .. })
        ));
    }

    #[test]
    fn test_multi_name_with_module_match_only_rewrites_prefix() {
        let plan = plan(&[("pkg", "newtop"), ("pkg.mod", "newtop.mod")]);
        assert_eq!(
            rewritten(&plan, "from pkg import mod, other"),
            "from newtop import mod, other"
        );
    }

    #[test]
    fn test_relative_imports_are_never_rewritten() {
        let plans = [
            plan(&[("pkg", "lib.pkg")]),
            plan(&[("pkg.module", "module")]),
            plan(&[("module", "pkg.module")]),
        ];
        for plan in &plans {
            for source in [
                "from . import module",
                "from .pkg import module",
                "from ..pkg.module import x",
                "from .module import thing",
            ] {
                assert_eq!(rewrite(plan, source), Rewrite::Unchanged, "{source}");
            }
        }
    }

    #[test]
    fn test_rewrite_is_idempotent() {
        let plan = plan(&[
            ("pkg", "lib.pkg2"),
            ("pkg.sub", "lib.pkg2.sub"),
            ("pkg.module", "module"),
        ]);
        for source in [
            "import pkg.sub",
            "from pkg import sub",
            "from pkg.sub import thing as t",
            "import pkg as p, os",
        ] {
            let Rewrite::Rewritten(once) = rewrite(&plan, source) else {
                panic!("{source} should be rewritten");
            };
            assert_eq!(ImportRewriter::new(&plan).rewrite(&once), Rewrite::Unchanged);
        }
    }

    #[test]
    fn test_rewrite_is_idempotent_when_moved_below_old_name() {
        let plan = plan(&[("models", "models.core")]);
        for (source, expected) in [
            ("import models", "import models.core"),
            ("from models import User", "from models.core import User"),
            ("import models.helpers as h", "import models.core.helpers as h"),
        ] {
            assert_eq!(rewritten(&plan, source), expected);
            let Rewrite::Rewritten(once) = rewrite(&plan, source) else {
                panic!("{source} should be rewritten");
            };
            assert_eq!(ImportRewriter::new(&plan).rewrite(&once), Rewrite::Unchanged, "{source}");
        }
        assert_eq!(rewrite(&plan, "from models.core import User"), Rewrite::Unchanged);
    }

    #[test]
    fn test_unrelated_statements_are_unchanged() {
        let plan = plan(&[("pkg.module", "module")]);
        for source in [
            "import os",
            "from pkg import other",
            "from __future__ import annotations",
            "from pkg import *",
        ] {
            assert_eq!(rewrite(&plan, source), Rewrite::Unchanged, "{source}");
        }
    }

    #[test]
    fn test_refusal_message_names_the_statement() {
        let plan = plan(&[("pkg.module", "module")]);
        let Rewrite::Refused(refusal) = rewrite(&plan, "from pkg import module, other") else {
            panic!("expected a refusal");
        };
        assert_eq!(
            refusal.to_string(),
            "`from pkg import ...` mixes moved modules (module) with other names (other)"
        );
    }
}
