/*
Copyright 2025 Connor Nolan

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/
use std::collections::{HashMap, HashSet};

use super::ast::*;
use crate::errors::WisniaError;

/// Per-function table of local variable names to their declared type,
/// built while walking a function body and consulted by expression
/// resolution to catch use-before-declaration.
struct Scope {
    declared: HashSet<String>,
}

/// The minimum semantic checking the IR lowering pass in [`crate::ir`]
/// assumes has already happened: every name used is declared, `main`
/// exists and takes no parameters, every non-void function returns on
/// its direct control-flow paths, no two functions/classes share a name,
/// and every call site's argument count matches its callee's arity.
pub struct Resolver<'a> {
    program: &'a Program,
    functions: HashMap<&'a str, &'a FnDef>,
}

impl<'a> Resolver<'a> {
    pub fn new(program: &'a Program) -> Self {
        Self { program, functions: HashMap::new() }
    }

    pub fn resolve(mut self) -> Result<(), WisniaError> {
        self.check_no_duplicate_names()?;
        for f in &self.program.functions {
            self.functions.insert(f.name.as_str(), f);
        }
        if !self.functions.contains_key("main") {
            return Err(WisniaError::semantic(0, "program has no 'main' function"));
        }
        if !self.functions["main"].params.is_empty() {
            return Err(WisniaError::semantic(
                self.functions["main"].line,
                "'main' must take no parameters",
            ));
        }
        for f in &self.program.functions {
            self.check_function(f)?;
        }
        Ok(())
    }

    fn check_no_duplicate_names(&self) -> Result<(), WisniaError> {
        let mut seen = HashSet::new();
        for f in &self.program.functions {
            if !seen.insert(f.name.as_str()) {
                return Err(WisniaError::semantic(
                    f.line,
                    format!("function '{}' is already defined", f.name),
                ));
            }
        }
        for c in &self.program.classes {
            if !seen.insert(c.name.as_str()) {
                return Err(WisniaError::semantic(
                    c.line,
                    format!("'{}' is already defined", c.name),
                ));
            }
        }
        Ok(())
    }

    fn check_function(&self, f: &FnDef) -> Result<(), WisniaError> {
        let mut scope = Scope { declared: HashSet::new() };
        for p in &f.params {
            scope.declared.insert(p.name.clone());
        }
        self.check_block(&f.body, &mut scope)?;
        if f.return_type != PrimitiveType::Void && !block_always_returns(&f.body) {
            return Err(WisniaError::semantic(
                f.line,
                format!("function '{}' does not return on all paths", f.name),
            ));
        }
        Ok(())
    }

    fn check_block(&self, stmts: &[Stmt], scope: &mut Scope) -> Result<(), WisniaError> {
        for stmt in stmts {
            self.check_stmt(stmt, scope)?;
        }
        Ok(())
    }

    fn check_stmt(&self, stmt: &Stmt, scope: &mut Scope) -> Result<(), WisniaError> {
        match stmt {
            Stmt::VarDecl { name, init, line, .. } => {
                if let Some(expr) = init {
                    self.check_expr(expr, scope)?;
                }
                if !scope.declared.insert(name.clone()) {
                    return Err(WisniaError::semantic(
                        *line,
                        format!("variable '{name}' is already declared in this scope"),
                    ));
                }
            }
            Stmt::VarAssign { name, value, line } => {
                self.check_expr(value, scope)?;
                self.require_declared(name, *line, scope)?;
            }
            Stmt::ExprStmt(expr) => self.check_expr(expr, scope)?,
            Stmt::Print(args) => {
                for a in args {
                    self.check_expr(a, scope)?;
                }
            }
            Stmt::Read { name, line } => self.require_declared(name, *line, scope)?,
            Stmt::Return { value, .. } => {
                if let Some(expr) = value {
                    self.check_expr(expr, scope)?;
                }
            }
            Stmt::Break | Stmt::Continue => {}
            Stmt::Block(body) => self.check_block(body, scope)?,
            Stmt::If { branches, else_branch } => {
                for (cond, body) in branches {
                    self.check_expr(cond, scope)?;
                    self.check_block(body, scope)?;
                }
                if let Some(body) = else_branch {
                    self.check_block(body, scope)?;
                }
            }
            Stmt::While { condition, body } => {
                self.check_expr(condition, scope)?;
                self.check_block(body, scope)?;
            }
            Stmt::For { init, condition, increment, body } => {
                self.check_stmt(init, scope)?;
                self.check_expr(condition, scope)?;
                self.check_stmt(increment, scope)?;
                self.check_block(body, scope)?;
            }
            Stmt::Foreach { var_name, collection, body, .. } => {
                self.check_expr(collection, scope)?;
                scope.declared.insert(var_name.clone());
                self.check_block(body, scope)?;
            }
        }
        Ok(())
    }

    fn check_expr(&self, expr: &Expr, scope: &Scope) -> Result<(), WisniaError> {
        match expr {
            Expr::IntLiteral(_) | Expr::FloatLiteral(_) | Expr::BoolLiteral(_) | Expr::StringLiteral(_) => {}
            Expr::Var { name, line } => self.require_declared(name, *line, scope)?,
            Expr::Unary { operand, .. } => self.check_expr(operand, scope)?,
            Expr::Binary { lhs, rhs, .. } => {
                self.check_expr(lhs, scope)?;
                self.check_expr(rhs, scope)?;
            }
            Expr::Call { name, args, line } => {
                for a in args {
                    self.check_expr(a, scope)?;
                }
                // A `class::method` qualified name comes from `obj.foo(...)` /
                // `obj->foo(...)` method-call syntax; class method symbol
                // tables aren't resolved here (class codegen is out of
                // scope), so arity checking for these is deferred to IR
                // lowering, which rejects them outright.
                if name.contains("::") {
                    return Ok(());
                }
                match self.functions.get(name.as_str()) {
                    Some(callee) if callee.params.len() == args.len() => {}
                    Some(callee) => {
                        return Err(WisniaError::semantic(
                            *line,
                            format!(
                                "'{name}' expects {} argument(s), got {}",
                                callee.params.len(),
                                args.len()
                            ),
                        ));
                    }
                    None => {
                        return Err(WisniaError::semantic(*line, format!("call to undefined function '{name}'")));
                    }
                }
            }
            Expr::ClassInit { args, .. } => {
                for a in args {
                    self.check_expr(a, scope)?;
                }
            }
        }
        Ok(())
    }

    fn require_declared(&self, name: &str, line: usize, scope: &Scope) -> Result<(), WisniaError> {
        if scope.declared.contains(name) {
            Ok(())
        } else {
            Err(WisniaError::semantic(line, format!("use of undeclared variable '{name}'")))
        }
    }
}

/// Best-effort direct-path return check: a block "always returns" if its
/// last statement is a `return`, or an `if` with an `else` where every
/// branch (including the else) always returns. This is not full dataflow
/// (it does not reason about `while(true)` or unreachable code after a
/// `return`), which matches the reduced scope of this front end.
fn block_always_returns(stmts: &[Stmt]) -> bool {
    match stmts.last() {
        Some(Stmt::Return { .. }) => true,
        Some(Stmt::If { branches, else_branch: Some(else_body) }) => {
            branches.iter().all(|(_, body)| block_always_returns(body)) && block_always_returns(else_body)
        }
        Some(Stmt::Block(body)) => block_always_returns(body),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{lexer::Lexer, parser::parse};

    fn resolve_src(src: &str) -> Result<(), WisniaError> {
        let tokens = Lexer::new(src).tokenize().unwrap();
        let program = parse(tokens).unwrap();
        Resolver::new(&program).resolve()
    }

    #[test]
    fn accepts_well_formed_program() {
        assert!(resolve_src("fn main() { int x = 1; print(x); }").is_ok());
    }

    #[test]
    fn rejects_missing_main() {
        let err = resolve_src("fn helper() { }").unwrap_err();
        assert!(matches!(err, WisniaError::Semantic { .. }));
    }

    #[test]
    fn rejects_undeclared_variable_use() {
        let err = resolve_src("fn main() { print(x); }").unwrap_err();
        assert!(matches!(err, WisniaError::Semantic { .. }));
    }

    #[test]
    fn rejects_duplicate_declaration_in_same_scope() {
        let err = resolve_src("fn main() { int x = 1; int x = 2; }").unwrap_err();
        assert!(matches!(err, WisniaError::Semantic { .. }));
    }

    #[test]
    fn rejects_call_arity_mismatch() {
        let err = resolve_src("fn helper(a: int) { } fn main() { helper(); }").unwrap_err();
        assert!(matches!(err, WisniaError::Semantic { .. }));
    }

    #[test]
    fn rejects_non_void_function_missing_return() {
        let err = resolve_src("fn helper() -> int { int x = 1; } fn main() { }").unwrap_err();
        assert!(matches!(err, WisniaError::Semantic { .. }));
    }

    #[test]
    fn accepts_non_void_function_returning_on_all_if_else_paths() {
        assert!(resolve_src(
            "fn helper() -> int { if (1 == 1) { return 1; } else { return 2; } } fn main() { }"
        )
        .is_ok());
    }
}
