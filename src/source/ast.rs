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
/// The primitive type tags the front end attaches to declarations and
/// literals. Lowering relies on every variable/literal already carrying one
/// of these (no type inference happens during IR lowering itself).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveType {
    Int,
    Float,
    Bool,
    String,
    Void,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Neq,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

/// An owning, tagged-union AST node for expressions. Built directly by the
/// parser with no separate visitor layer: every pass that needs to inspect
/// or rewrite an expression does so with a `match` over this enum.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    IntLiteral(i64),
    FloatLiteral(f64),
    BoolLiteral(bool),
    StringLiteral(String),
    Var { name: String, line: usize },
    Unary { op: UnaryOp, operand: Box<Expr>, line: usize },
    Binary { op: BinaryOp, lhs: Box<Expr>, rhs: Box<Expr>, line: usize },
    Call { name: String, args: Vec<Expr>, line: usize },
    ClassInit { class_name: String, args: Vec<Expr>, line: usize },
}

impl Expr {
    pub fn line(&self) -> usize {
        match self {
            Expr::IntLiteral(_) | Expr::FloatLiteral(_) | Expr::BoolLiteral(_) | Expr::StringLiteral(_) => 0,
            Expr::Var { line, .. }
            | Expr::Unary { line, .. }
            | Expr::Binary { line, .. }
            | Expr::Call { line, .. }
            | Expr::ClassInit { line, .. } => *line,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    VarDecl { name: String, ty: PrimitiveType, init: Option<Expr>, line: usize },
    VarAssign { name: String, value: Expr, line: usize },
    ExprStmt(Expr),
    Print(Vec<Expr>),
    Read { name: String, line: usize },
    Return { value: Option<Expr>, line: usize },
    Break,
    Continue,
    Block(Vec<Stmt>),
    If { branches: Vec<(Expr, Vec<Stmt>)>, else_branch: Option<Vec<Stmt>> },
    While { condition: Expr, body: Vec<Stmt> },
    For {
        init: Box<Stmt>,
        condition: Expr,
        increment: Box<Stmt>,
        body: Vec<Stmt>,
    },
    Foreach { var_name: String, collection: Expr, body: Vec<Stmt>, line: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: PrimitiveType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FnDef {
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: PrimitiveType,
    pub body: Vec<Stmt>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub ty: PrimitiveType,
}

/// A `def <name>(params) { body }` constructor declaration inside a class.
#[derive(Debug, Clone, PartialEq)]
pub struct CtorDef {
    pub params: Vec<Param>,
    pub body: Vec<Stmt>,
    pub line: usize,
}

/// A `rem <name>() { body }` destructor declaration inside a class.
#[derive(Debug, Clone, PartialEq)]
pub struct DtorDef {
    pub body: Vec<Stmt>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDef {
    pub name: String,
    pub fields: Vec<Field>,
    pub methods: Vec<FnDef>,
    pub ctor: Option<CtorDef>,
    pub dtor: Option<DtorDef>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub functions: Vec<FnDef>,
    pub classes: Vec<ClassDef>,
}
