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
use super::ast::*;
use super::lexer::{Token, TokenKind};
use crate::errors::WisniaError;

/// A hand-rolled recursive-descent parser. Each construct gets its own
/// `parse_*` method rather than a PEG grammar, mirroring the structure of
/// the original front end this language's grammar was drawn from.
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

type PResult<T> = Result<T, WisniaError>;

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    pub fn parse_program(mut self) -> PResult<Program> {
        let mut program = Program::default();
        while !self.check(&TokenKind::Eof) {
            if self.check(&TokenKind::Fn) {
                program.functions.push(self.parse_fn_def()?);
            } else if self.check(&TokenKind::Class) {
                program.classes.push(self.parse_class_def()?);
            } else {
                return Err(self.error("expected 'fn' or 'class' at top level"));
            }
        }
        Ok(program)
    }

    // ---- token stream helpers ----

    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn line(&self) -> usize {
        self.peek().line
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.peek().kind) == std::mem::discriminant(kind)
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, kind: &TokenKind) -> PResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error(format!("expected {kind:?}, found {:?}", self.peek().kind)))
        }
    }

    fn expect_ident(&mut self) -> PResult<String> {
        match &self.peek().kind {
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            other => Err(self.error(format!("expected identifier, found {other:?}"))),
        }
    }

    fn error(&self, reason: impl Into<String>) -> WisniaError {
        WisniaError::parser(self.line(), reason.into())
    }

    // ---- types ----

    fn is_type_start(&self) -> bool {
        matches!(
            self.peek().kind,
            TokenKind::TypeInt | TokenKind::TypeFloat | TokenKind::TypeBool | TokenKind::TypeString | TokenKind::TypeVoid
        )
    }

    fn parse_type(&mut self) -> PResult<PrimitiveType> {
        let ty = match &self.peek().kind {
            TokenKind::TypeInt => PrimitiveType::Int,
            TokenKind::TypeFloat => PrimitiveType::Float,
            TokenKind::TypeBool => PrimitiveType::Bool,
            TokenKind::TypeString => PrimitiveType::String,
            TokenKind::TypeVoid => PrimitiveType::Void,
            other => return Err(self.error(format!("expected a type, found {other:?}"))),
        };
        self.advance();
        Ok(ty)
    }

    /// The default value the original front end substitutes for a
    /// declaration with no explicit initializer (`int x;` means `int x = 0;`).
    fn default_value_for(ty: PrimitiveType) -> Expr {
        match ty {
            PrimitiveType::Int => Expr::IntLiteral(0),
            PrimitiveType::Float => Expr::FloatLiteral(0.0),
            PrimitiveType::Bool => Expr::BoolLiteral(false),
            PrimitiveType::String => Expr::StringLiteral(String::new()),
            PrimitiveType::Void => Expr::IntLiteral(0),
        }
    }

    // ---- top-level ----

    /// `<FN_PREAMBLE> "->" <TYPE> <STMT_BLOCK> | <FN_PREAMBLE> <STMT_BLOCK>`
    /// where `<FN_PREAMBLE> ::= "fn" <IDENT> <PARAMS>`.
    fn parse_fn_def(&mut self) -> PResult<FnDef> {
        let line = self.line();
        self.expect(&TokenKind::Fn)?;
        let name = self.expect_ident()?;
        let params = self.parse_params_list()?;
        let return_type = if self.check(&TokenKind::Arrow) {
            self.advance();
            self.parse_type()?
        } else {
            PrimitiveType::Void
        };
        let body = self.parse_block()?;
        Ok(FnDef { name, params, return_type, body, line })
    }

    /// `<PARAM> ::= <IDENT> ":" <TYPE>`
    fn parse_param(&mut self) -> PResult<Param> {
        let name = self.expect_ident()?;
        self.expect(&TokenKind::Colon)?;
        let ty = self.parse_type()?;
        Ok(Param { name, ty })
    }

    fn parse_params_list(&mut self) -> PResult<Vec<Param>> {
        self.expect(&TokenKind::LParen)?;
        let mut params = Vec::new();
        while !self.check(&TokenKind::RParen) {
            params.push(self.parse_param()?);
            if self.check(&TokenKind::RParen) {
                break;
            }
            self.expect(&TokenKind::Comma)?;
        }
        self.expect(&TokenKind::RParen)?;
        Ok(params)
    }

    fn parse_class_def(&mut self) -> PResult<ClassDef> {
        let line = self.line();
        self.expect(&TokenKind::Class)?;
        let name = self.expect_ident()?;
        self.expect(&TokenKind::LBrace)?;
        let mut fields = Vec::new();
        let mut methods = Vec::new();
        let mut ctor = None;
        let mut dtor = None;
        while !self.check(&TokenKind::RBrace) {
            match &self.peek().kind {
                TokenKind::Def => ctor = Some(self.parse_ctor_def()?),
                TokenKind::Rem => dtor = Some(self.parse_dtor_def()?),
                TokenKind::Fn => methods.push(self.parse_fn_def()?),
                _ => {
                    let fname = self.expect_ident()?;
                    self.expect(&TokenKind::Colon)?;
                    let ty = self.parse_type()?;
                    self.expect(&TokenKind::Semicolon)?;
                    fields.push(Field { name: fname, ty });
                }
            }
        }
        self.expect(&TokenKind::RBrace)?;
        Ok(ClassDef { name, fields, methods, ctor, dtor, line })
    }

    /// `<CONSTRUCTOR_DECL> ::= "def" <IDENT> <PARAMS> <STMT_BLOCK>`
    fn parse_ctor_def(&mut self) -> PResult<CtorDef> {
        let line = self.line();
        self.expect(&TokenKind::Def)?;
        self.expect_ident()?; // constructor name, conventionally the class name
        let params = self.parse_params_list()?;
        let body = self.parse_block()?;
        Ok(CtorDef { params, body, line })
    }

    /// `<DESTRUCTOR_DECL> ::= "rem" <IDENT> <STMT_BLOCK>`
    fn parse_dtor_def(&mut self) -> PResult<DtorDef> {
        let line = self.line();
        self.expect(&TokenKind::Rem)?;
        self.expect_ident()?;
        let body = self.parse_block()?;
        Ok(DtorDef { body, line })
    }

    // ---- statements ----

    fn parse_block(&mut self) -> PResult<Vec<Stmt>> {
        self.expect(&TokenKind::LBrace)?;
        let mut stmts = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            stmts.push(self.parse_stmt()?);
        }
        self.expect(&TokenKind::RBrace)?;
        Ok(stmts)
    }

    fn parse_stmt(&mut self) -> PResult<Stmt> {
        if self.is_type_start() {
            return self.parse_var_decl();
        }
        match &self.peek().kind {
            TokenKind::Print => self.parse_print(),
            TokenKind::Read => self.parse_read(),
            TokenKind::Return => self.parse_return(),
            TokenKind::Break => {
                self.advance();
                self.expect(&TokenKind::Semicolon)?;
                Ok(Stmt::Break)
            }
            TokenKind::Continue => {
                self.advance();
                self.expect(&TokenKind::Semicolon)?;
                Ok(Stmt::Continue)
            }
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::For => self.parse_for(),
            TokenKind::Foreach => self.parse_foreach(),
            TokenKind::LBrace => Ok(Stmt::Block(self.parse_block()?)),
            TokenKind::Ident(_) => self.parse_ident_led_stmt(),
            other => Err(self.error(format!("unexpected token in statement position: {other:?}"))),
        }
    }

    /// `<VAR_DECL> ::= <TYPE> <IDENT> | <TYPE> <IDENT> "=" <EXPR> | <TYPE>
    /// <IDENT> "{" <EXPR> "}"`. A declaration with no initializer gets the
    /// type's default value, matching the original front end.
    fn parse_var_decl(&mut self) -> PResult<Stmt> {
        let line = self.line();
        let ty = self.parse_type()?;
        let name = self.expect_ident()?;
        let init = if self.check(&TokenKind::Assign) {
            self.advance();
            Some(self.parse_expr()?)
        } else if self.check(&TokenKind::LBrace) {
            self.advance();
            let value = self.parse_expr()?;
            self.expect(&TokenKind::RBrace)?;
            Some(value)
        } else {
            Some(Self::default_value_for(ty))
        };
        self.expect(&TokenKind::Semicolon)?;
        Ok(Stmt::VarDecl { name, ty, init, line })
    }

    fn parse_print(&mut self) -> PResult<Stmt> {
        self.expect(&TokenKind::Print)?;
        self.expect(&TokenKind::LParen)?;
        let mut args = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                args.push(self.parse_expr()?);
                if self.check(&TokenKind::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen)?;
        self.expect(&TokenKind::Semicolon)?;
        Ok(Stmt::Print(args))
    }

    fn parse_read(&mut self) -> PResult<Stmt> {
        let line = self.line();
        self.expect(&TokenKind::Read)?;
        self.expect(&TokenKind::LParen)?;
        let name = self.expect_ident()?;
        self.expect(&TokenKind::RParen)?;
        self.expect(&TokenKind::Semicolon)?;
        Ok(Stmt::Read { name, line })
    }

    fn parse_return(&mut self) -> PResult<Stmt> {
        let line = self.line();
        self.expect(&TokenKind::Return)?;
        let value = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect(&TokenKind::Semicolon)?;
        Ok(Stmt::Return { value, line })
    }

    fn parse_if(&mut self) -> PResult<Stmt> {
        self.expect(&TokenKind::If)?;
        let mut branches = Vec::new();
        self.expect(&TokenKind::LParen)?;
        let cond = self.parse_expr()?;
        self.expect(&TokenKind::RParen)?;
        branches.push((cond, self.parse_block()?));
        let mut else_branch = None;
        loop {
            if self.check(&TokenKind::Elif) {
                self.advance();
                self.expect(&TokenKind::LParen)?;
                let cond = self.parse_expr()?;
                self.expect(&TokenKind::RParen)?;
                branches.push((cond, self.parse_block()?));
            } else if self.check(&TokenKind::Else) {
                self.advance();
                else_branch = Some(self.parse_block()?);
                break;
            } else {
                break;
            }
        }
        Ok(Stmt::If { branches, else_branch })
    }

    fn parse_while(&mut self) -> PResult<Stmt> {
        self.expect(&TokenKind::While)?;
        self.expect(&TokenKind::LParen)?;
        let condition = self.parse_expr()?;
        self.expect(&TokenKind::RParen)?;
        let body = self.parse_block()?;
        Ok(Stmt::While { condition, body })
    }

    /// `<FOR_LOOP> ::= "for" "(" <VAR_DECL> <EXPR> ";" <VAR_ASSIGN> ")"
    /// <STMT_BLOCK>` — the initializer's own semicolon terminates it, so
    /// only the condition needs an explicit one here.
    fn parse_for(&mut self) -> PResult<Stmt> {
        self.expect(&TokenKind::For)?;
        self.expect(&TokenKind::LParen)?;
        let init = Box::new(self.parse_var_decl()?);
        let condition = self.parse_expr()?;
        self.expect(&TokenKind::Semicolon)?;
        let increment = Box::new(self.parse_ident_led_stmt_no_semicolon()?);
        self.expect(&TokenKind::RParen)?;
        let body = self.parse_block()?;
        Ok(Stmt::For { init, condition, increment, body })
    }

    /// `<FOREACH_LOOP> ::= "for_each" "(" <IDENT> "in" <EXPR> ")" <STMT_BLOCK>`
    fn parse_foreach(&mut self) -> PResult<Stmt> {
        let line = self.line();
        self.expect(&TokenKind::Foreach)?;
        self.expect(&TokenKind::LParen)?;
        let var_name = self.expect_ident()?;
        self.expect(&TokenKind::In)?;
        let collection = self.parse_expr()?;
        self.expect(&TokenKind::RParen)?;
        let body = self.parse_block()?;
        Ok(Stmt::Foreach { var_name, collection, body, line })
    }

    /// Handles `x = expr;` and a bare call/method-call expression
    /// statement, both of which start with an identifier.
    fn parse_ident_led_stmt(&mut self) -> PResult<Stmt> {
        let stmt = self.parse_ident_led_stmt_no_semicolon()?;
        self.expect(&TokenKind::Semicolon)?;
        Ok(stmt)
    }

    fn parse_ident_led_stmt_no_semicolon(&mut self) -> PResult<Stmt> {
        let line = self.line();
        let name = self.expect_ident()?;
        match &self.peek().kind {
            TokenKind::Assign => {
                self.advance();
                let value = self.parse_expr()?;
                Ok(Stmt::VarAssign { name, value, line })
            }
            TokenKind::LParen => {
                let args = self.parse_args_list()?;
                Ok(Stmt::ExprStmt(Expr::Call { name, args, line }))
            }
            TokenKind::Dot | TokenKind::Arrow => {
                let qualified = self.parse_qualified_method_name(name)?;
                let args = self.parse_args_list()?;
                Ok(Stmt::ExprStmt(Expr::Call { name: qualified, args, line }))
            }
            other => Err(self.error(format!("unexpected token after identifier: {other:?}"))),
        }
    }

    /// `obj.foo` or `obj->foo` both denote a call to `foo` on `obj`; the
    /// resolved callee name is the class-qualified `obj::foo`.
    fn parse_qualified_method_name(&mut self, receiver: String) -> PResult<String> {
        self.advance(); // '.' or '->'
        let method = self.expect_ident()?;
        Ok(format!("{receiver}::{method}"))
    }

    fn parse_args_list(&mut self) -> PResult<Vec<Expr>> {
        self.expect(&TokenKind::LParen)?;
        let mut args = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                args.push(self.parse_expr()?);
                if self.check(&TokenKind::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen)?;
        Ok(args)
    }

    // ---- expressions (precedence climbing) ----

    fn parse_expr(&mut self) -> PResult<Expr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_and()?;
        while self.check(&TokenKind::OrOr) {
            let line = self.line();
            self.advance();
            let rhs = self.parse_and()?;
            lhs = Expr::Binary { op: BinaryOp::Or, lhs: Box::new(lhs), rhs: Box::new(rhs), line };
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_equality()?;
        while self.check(&TokenKind::AndAnd) {
            let line = self.line();
            self.advance();
            let rhs = self.parse_equality()?;
            lhs = Expr::Binary { op: BinaryOp::And, lhs: Box::new(lhs), rhs: Box::new(rhs), line };
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_comparison()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Eq => BinaryOp::Eq,
                TokenKind::Neq => BinaryOp::Neq,
                _ => break,
            };
            let line = self.line();
            self.advance();
            let rhs = self.parse_comparison()?;
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs), line };
        }
        Ok(lhs)
    }

    fn parse_comparison(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Lt => BinaryOp::Lt,
                TokenKind::Le => BinaryOp::Le,
                TokenKind::Gt => BinaryOp::Gt,
                TokenKind::Ge => BinaryOp::Ge,
                _ => break,
            };
            let line = self.line();
            self.advance();
            let rhs = self.parse_additive()?;
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs), line };
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            let line = self.line();
            self.advance();
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs), line };
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                _ => break,
            };
            let line = self.line();
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs), line };
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> PResult<Expr> {
        let line = self.line();
        match self.peek().kind {
            TokenKind::Minus => {
                self.advance();
                let operand = self.parse_unary()?;
                Ok(Expr::Unary { op: UnaryOp::Neg, operand: Box::new(operand), line })
            }
            TokenKind::Bang => {
                self.advance();
                let operand = self.parse_unary()?;
                Ok(Expr::Unary { op: UnaryOp::Not, operand: Box::new(operand), line })
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        let line = self.line();
        let expr = match self.peek().kind.clone() {
            TokenKind::Int(value) => {
                self.advance();
                Expr::IntLiteral(value)
            }
            TokenKind::Float(value) => {
                self.advance();
                Expr::FloatLiteral(value)
            }
            TokenKind::Bool(value) => {
                self.advance();
                Expr::BoolLiteral(value)
            }
            TokenKind::Str(value) => {
                self.advance();
                Expr::StringLiteral(value)
            }
            TokenKind::New => {
                self.advance();
                let class_name = self.expect_ident()?;
                let args = self.parse_args_list()?;
                Expr::ClassInit { class_name, args, line }
            }
            TokenKind::Ident(name) => {
                self.advance();
                if self.check(&TokenKind::LParen) {
                    let args = self.parse_args_list()?;
                    Expr::Call { name, args, line }
                } else if self.check(&TokenKind::Dot) || self.check(&TokenKind::Arrow) {
                    let qualified = self.parse_qualified_method_name(name)?;
                    let args = self.parse_args_list()?;
                    Expr::Call { name: qualified, args, line }
                } else {
                    Expr::Var { name, line }
                }
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(&TokenKind::RParen)?;
                inner
            }
            other => return Err(self.error(format!("unexpected token in expression: {other:?}"))),
        };
        Ok(expr)
    }
}

pub fn parse(tokens: Vec<Token>) -> PResult<Program> {
    Parser::new(tokens).parse_program()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::lexer::Lexer;

    fn parse_src(src: &str) -> Program {
        let tokens = Lexer::new(src).tokenize().unwrap();
        parse(tokens).unwrap()
    }

    #[test]
    fn parses_empty_main() {
        let program = parse_src("fn main() { }");
        assert_eq!(program.functions.len(), 1);
        assert_eq!(program.functions[0].name, "main");
        assert!(program.functions[0].body.is_empty());
    }

    #[test]
    fn fn_with_no_params_defaults_to_void_return() {
        let program = parse_src("fn loops() { }");
        let f = &program.functions[0];
        assert!(f.params.is_empty());
        assert_eq!(f.return_type, PrimitiveType::Void);
    }

    #[test]
    fn arrow_return_type_is_parsed() {
        let program = parse_src("fn foo() -> int { return 5; }");
        assert_eq!(program.functions[0].return_type, PrimitiveType::Int);
    }

    #[test]
    fn parses_var_decl_and_print() {
        let program = parse_src("fn main() { int x = 1 + 2; print(x); }");
        let body = &program.functions[0].body;
        assert_eq!(body.len(), 2);
        match &body[0] {
            Stmt::VarDecl { name, ty, init, .. } => {
                assert_eq!(name, "x");
                assert_eq!(*ty, PrimitiveType::Int);
                assert!(init.is_some());
            }
            other => panic!("expected VarDecl, got {other:?}"),
        }
        assert!(matches!(&body[1], Stmt::Print(args) if args.len() == 1));
    }

    #[test]
    fn var_decl_without_initializer_gets_default_value() {
        let program = parse_src("fn main() { int x; }");
        match &program.functions[0].body[0] {
            Stmt::VarDecl { init: Some(Expr::IntLiteral(0)), .. } => {}
            other => panic!("expected default-initialized VarDecl, got {other:?}"),
        }
    }

    #[test]
    fn parses_if_elif_else() {
        let program = parse_src("fn main() { bool a = true; bool b = true; if (a) { } elif (b) { } else { } }");
        match &program.functions[0].body[2] {
            Stmt::If { branches, else_branch } => {
                assert_eq!(branches.len(), 2);
                assert!(else_branch.is_some());
            }
            other => panic!("expected If, got {other:?}"),
        }
    }

    #[test]
    fn respects_arithmetic_precedence() {
        let program = parse_src("fn main() { int x = 1 + 2 * 3; }");
        match &program.functions[0].body[0] {
            Stmt::VarDecl { init: Some(Expr::Binary { op: BinaryOp::Add, rhs, .. }), .. } => {
                assert!(matches!(**rhs, Expr::Binary { op: BinaryOp::Mul, .. }));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn parses_function_call_statement_and_args() {
        let program = parse_src("fn main() { foo(1, 2); }");
        assert!(matches!(
            &program.functions[0].body[0],
            Stmt::ExprStmt(Expr::Call { name, args, .. }) if name == "foo" && args.len() == 2
        ));
    }

    #[test]
    fn for_loop_parses_init_condition_and_increment() {
        let program = parse_src("fn main() { for (int i = 0; i < 5; i = i + 1) { } }");
        match &program.functions[0].body[0] {
            Stmt::For { init, condition, increment, .. } => {
                assert!(matches!(**init, Stmt::VarDecl { .. }));
                assert!(matches!(condition, Expr::Binary { op: BinaryOp::Lt, .. }));
                assert!(matches!(**increment, Stmt::VarAssign { .. }));
            }
            other => panic!("expected For, got {other:?}"),
        }
    }

    #[test]
    fn method_call_parses_as_qualified_function_call() {
        let program = parse_src("fn main() { obj.foo(5, 6); }");
        match &program.functions[0].body[0] {
            Stmt::ExprStmt(Expr::Call { name, args, .. }) => {
                assert_eq!(name, "obj::foo");
                assert_eq!(args.len(), 2);
            }
            other => panic!("expected qualified Call, got {other:?}"),
        }
    }

    #[test]
    fn class_with_ctor_and_dtor_parses() {
        let program = parse_src(
            "class Foo { x: int; def Foo(v: int) { x = v; } rem Foo() { } fn main() { } fn get() -> int { return 1; } }",
        );
        let class = &program.classes[0];
        assert_eq!(class.fields.len(), 1);
        assert!(class.ctor.is_some());
        assert!(class.dtor.is_some());
        assert_eq!(class.methods.len(), 2);
    }

    #[test]
    fn unexpected_top_level_token_is_parser_error() {
        let tokens = Lexer::new("123").tokenize().unwrap();
        let err = parse(tokens).unwrap_err();
        assert!(matches!(err, WisniaError::Parser { .. }));
    }
}
