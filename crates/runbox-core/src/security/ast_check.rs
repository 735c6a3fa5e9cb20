//! Syntax-tree pass.
//!
//! Parses the script and walks every statement and expression, including
//! nested function and class bodies. A script that fails to parse produces
//! no findings here; the interpreter reports the syntax error at run time.

use super::types::{RuleKind, Violation, line_of};
use crate::config::SandboxConfig;
use rustpython_ast::Visitor;
use rustpython_parser::{Parse, ast};
use std::collections::HashSet;

/// Allow/deny sets consulted by the tree walk
#[derive(Debug, Clone)]
pub struct AstPolicy {
    allowed_imports: HashSet<String>,
    blocked_calls: HashSet<String>,
    blocked_attributes: HashSet<String>,
    blocked_dunders: HashSet<String>,
}

impl AstPolicy {
    pub fn from_config(config: &SandboxConfig) -> Self {
        let set = |items: &[String]| items.iter().cloned().collect::<HashSet<_>>();
        Self {
            allowed_imports: set(&config.allowed_imports),
            blocked_calls: set(&config.blocked_calls),
            blocked_attributes: set(&config.blocked_attributes),
            blocked_dunders: set(&config.blocked_dunders),
        }
    }

    fn import_allowed(&self, module: &str) -> bool {
        let root = module.split('.').next().unwrap_or(module);
        self.allowed_imports.contains(root)
    }

    /// Walk `code`; `Err` carries the parser message when the code does not parse
    pub fn check(&self, code: &str) -> Result<Vec<Violation>, String> {
        let suite = ast::Suite::parse(code, "<sandbox>").map_err(|e| e.to_string())?;
        let mut walker = PolicyWalker {
            policy: self,
            source: code,
            violations: Vec::new(),
        };
        for stmt in suite {
            walker.visit_stmt(stmt);
        }
        Ok(walker.violations)
    }
}

struct PolicyWalker<'a> {
    policy: &'a AstPolicy,
    source: &'a str,
    violations: Vec<Violation>,
}

impl PolicyWalker<'_> {
    fn push(&mut self, rule: RuleKind, message: String, offset: usize) {
        self.violations
            .push(Violation::new(rule, message).at_line(line_of(self.source, offset)));
    }
}

impl Visitor for PolicyWalker<'_> {
    fn visit_stmt_import(&mut self, node: ast::StmtImport) {
        let offset = usize::from(node.range.start());
        for alias in &node.names {
            let module = alias.name.as_str();
            if !self.policy.import_allowed(module) {
                self.push(
                    RuleKind::Import,
                    format!("Import of module '{}' is not allowed", module),
                    offset,
                );
            }
        }
    }

    fn visit_stmt_import_from(&mut self, node: ast::StmtImportFrom) {
        let offset = usize::from(node.range.start());
        let relative = node.level.as_ref().is_some_and(|level| level.to_u32() > 0);
        match node.module.as_ref().map(|m| m.as_str()) {
            _ if relative => self.push(
                RuleKind::Import,
                "Relative imports are not allowed".to_string(),
                offset,
            ),
            Some(module) if !self.policy.import_allowed(module) => self.push(
                RuleKind::Import,
                format!("Import from module '{}' is not allowed", module),
                offset,
            ),
            _ => {}
        }
    }

    fn visit_expr_call(&mut self, node: ast::ExprCall) {
        let offset = usize::from(node.range.start());
        match node.func.as_ref() {
            ast::Expr::Name(name) if self.policy.blocked_calls.contains(name.id.as_str()) => {
                self.push(
                    RuleKind::Call,
                    format!("Call to built-in '{}' is not allowed", name.id.as_str()),
                    offset,
                );
            }
            ast::Expr::Attribute(attr)
                if self.policy.blocked_attributes.contains(attr.attr.as_str()) =>
            {
                self.push(
                    RuleKind::Attribute,
                    format!("Call to method '{}' is not allowed", attr.attr.as_str()),
                    offset,
                );
            }
            _ => {}
        }
        self.generic_visit_expr_call(node);
    }

    fn visit_expr_attribute(&mut self, node: ast::ExprAttribute) {
        if self.policy.blocked_dunders.contains(node.attr.as_str()) {
            self.push(
                RuleKind::Attribute,
                format!("Access to attribute '{}' is not allowed", node.attr.as_str()),
                usize::from(node.range.start()),
            );
        }
        self.generic_visit_expr_attribute(node);
    }
}
