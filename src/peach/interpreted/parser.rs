use std::fs;
use std::rc::Rc;

use nonempty::NonEmpty;
use num_traits::FromPrimitive;
use tracing::debug;

use crate::peach::common::error::{Diagnostic, ErrorInfo, ParserError, PeachResult};
use crate::peach::common::lexer::{tokenize, Token, TokenType};
use crate::peach::interpreted::ast::{
    Argument, ArgumentList, Atom, BinaryOperator, Block, Declaration, Expression, FunctionExpression, Import, Program,
    Statement, UnaryOperator,
};

/// Parses a whole token stream, failing if any statement failed to parse.
pub fn parse(tokens: Vec<Token>, file: &Rc<str>) -> PeachResult<Program> {
    let output = Parser::new(tokens, file.clone()).parse();
    match NonEmpty::from_vec(output.error_list) {
        Some(errors) => Err(errors),
        None => Ok(output.program),
    }
}

/// Whatever could be parsed, along with every error encountered on the way.
#[derive(Debug)]
pub struct ParseOutput {
    pub program: Program,
    pub error_list: Vec<Diagnostic>,
}

#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, FromPrimitive)]
enum Precedence {
    TopLevel,
    Assignment,
    Or /* || */,
    And /* && */,
    Bitwise /* | & */,
    Equality /* == != <=> */,
    Comparison /* < > <= >= */,
    Term /* + - */,
    Factor /* * / % */,
    Unary /* ! - + */,
    Call /* . () [] */,
    Primary,
}

impl Precedence {
    fn next(&self) -> Option<Self> {
        FromPrimitive::from_u8(*self as u8 + 1)
    }
}

impl From<&TokenType> for Precedence {
    fn from(tt: &TokenType) -> Self {
        match tt {
            TokenType::OrOr => Precedence::Or,
            TokenType::AndAnd => Precedence::And,
            TokenType::Pipe | TokenType::Ampersand => Precedence::Bitwise,
            TokenType::EqualEqual | TokenType::BangEqual | TokenType::Spaceship => Precedence::Equality,
            TokenType::Less | TokenType::LessEqual | TokenType::Greater | TokenType::GreaterEqual =>
                Precedence::Comparison,
            TokenType::Plus | TokenType::Minus => Precedence::Term,
            TokenType::Star | TokenType::Slash | TokenType::Percent => Precedence::Factor,
            _ => Precedence::TopLevel,
        }
    }
}

fn binary_operator(tt: &TokenType) -> Option<BinaryOperator> {
    match tt {
        TokenType::Plus => Some(BinaryOperator::Plus),
        TokenType::Minus => Some(BinaryOperator::Minus),
        TokenType::Star => Some(BinaryOperator::Mult),
        TokenType::Slash => Some(BinaryOperator::Div),
        TokenType::Percent => Some(BinaryOperator::Mod),
        TokenType::Less => Some(BinaryOperator::Less),
        TokenType::LessEqual => Some(BinaryOperator::LessEqual),
        TokenType::Greater => Some(BinaryOperator::Greater),
        TokenType::GreaterEqual => Some(BinaryOperator::GreaterEqual),
        TokenType::EqualEqual => Some(BinaryOperator::EqualEqual),
        TokenType::BangEqual => Some(BinaryOperator::BangEqual),
        TokenType::AndAnd => Some(BinaryOperator::And),
        TokenType::OrOr => Some(BinaryOperator::Or),
        TokenType::Pipe => Some(BinaryOperator::BitOr),
        TokenType::Ampersand => Some(BinaryOperator::BitAnd),
        TokenType::Spaceship => Some(BinaryOperator::Identity),
        _ => None,
    }
}

fn compound_operator(tt: &TokenType) -> Option<BinaryOperator> {
    match tt {
        TokenType::PlusEqual => Some(BinaryOperator::Plus),
        TokenType::MinusEqual => Some(BinaryOperator::Minus),
        TokenType::StarEqual => Some(BinaryOperator::Mult),
        TokenType::SlashEqual => Some(BinaryOperator::Div),
        _ => None,
    }
}

fn parse_number(text: &str) -> Option<Atom> {
    let radix = match text.get(..2) {
        Some("0x") | Some("0X") => Some(16),
        Some("0o") | Some("0O") => Some(8),
        Some("0b") | Some("0B") => Some(2),
        _ => None,
    };
    match radix {
        Some(radix) => i64::from_str_radix(&text[2..], radix).ok().map(Atom::Int),
        None if text.contains('.') => text.parse::<f64>().ok().map(Atom::Float),
        None => text.parse::<i64>().ok().map(Atom::Int),
    }
}

#[derive(Debug)]
pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    file: Rc<str>,
    error_list: Vec<Diagnostic>,
    // Files currently being parsed, outermost first; importing one of them again would never end.
    import_stack: Vec<String>,
}

impl Parser {
    pub fn new(tokens: Vec<Token>, file: Rc<str>) -> Self {
        Parser::with_import_stack(tokens, file, Vec::new())
    }

    fn with_import_stack(tokens: Vec<Token>, file: Rc<str>, mut import_stack: Vec<String>) -> Self {
        import_stack.push(file.to_string());
        Parser { tokens, current: 0, file, error_list: Vec::new(), import_stack }
    }

    pub fn parse(self) -> ParseOutput {
        self.parse_with_imports(&[])
    }

    /// Parses the program, with the given files imported ahead of its own statements.
    pub fn parse_with_imports(mut self, imports: &[String]) -> ParseOutput {
        let mut statements = Vec::new();
        for path in imports {
            match self.import_file(path, ErrorInfo::default()) {
                Ok(s) => statements.push(s),
                Err(e) => self.record(e),
            }
        }
        while !self.is_at_end() {
            let start = self.current;
            match self.statement() {
                Ok(s) => statements.push(s),
                Err(e) => self.recover(e, start),
            }
        }
        ParseOutput { program: Program::new(statements), error_list: self.error_list }
    }

    fn record(&mut self, error: ParserError) {
        self.error_list.push(Diagnostic::from_error(&self.file, &error));
    }

    // A missing `;` is recorded without skipping: the token in its place most likely starts the
    // next statement, which may have errors of its own.
    fn end_statement(&mut self) {
        if let Err(e) = self.consume(TokenType::Semicolon, None) {
            self.record(e);
        }
    }

    fn recover(&mut self, error: ParserError, start: usize) {
        self.record(error);
        self.synchronize();
        if self.current == start && !self.is_at_end() {
            self.advance();
        }
    }

    fn statement(&mut self) -> Result<Statement, ParserError> {
        let token = self.peek_or_eof();
        let info = token.error_info();
        match token.get_type() {
            TokenType::Let => {
                self.advance();
                let declaration = self.declaration(info)?;
                self.end_statement();
                Ok(Statement::Declare(declaration))
            }
            TokenType::Func if matches!(self.peek_n(1).map(Token::get_type), Some(TokenType::Identifier(_))) => {
                self.advance();
                self.function_declaration(info)
            }
            TokenType::If => {
                self.advance();
                self.if_statement(info)
            }
            TokenType::While => {
                self.advance();
                let cond = self.expression()?;
                let body = self.block()?;
                Ok(Statement::While(cond, body, info))
            }
            TokenType::For => {
                self.advance();
                self.for_statement(info)
            }
            TokenType::Return => {
                self.advance();
                let value = if self.check(&TokenType::Semicolon) {
                    Expression::Atomic(Atom::Null, info)
                } else {
                    self.expression()?
                };
                self.end_statement();
                Ok(Statement::Return(value, info))
            }
            TokenType::Import => {
                self.advance();
                let path = match self.advance_or_eof().r#type {
                    TokenType::StringLiteral(path) => path,
                    other => return Err(ParserError::new(format!("Expected import path, got {}", other), info)),
                };
                self.consume(TokenType::Semicolon, None)?;
                self.import_file(&path, info)
            }
            TokenType::Macro => {
                self.advance();
                self.macro_statement(info)
            }
            TokenType::OpenBrace => self.block().map(Statement::Block),
            TokenType::Semicolon => {
                self.advance();
                Ok(Statement::Empty(info))
            }
            _ => {
                let expr = self.expression()?;
                self.end_statement();
                Ok(Statement::Expression(expr))
            }
        }
    }

    // `NAME [: TYPE] [= VALUE]`, without the leading `let` or the trailing `;`.
    fn declaration(&mut self, info: ErrorInfo) -> Result<Declaration, ParserError> {
        let name = self.identifier()?;
        let type_expr = match self.matches_single(TokenType::Colon) {
            Some(_) => Some(self.type_expression()?),
            None => None,
        };
        let value = match self.matches_single(TokenType::Equal) {
            Some(_) => Some(self.expression()?),
            None => None,
        };
        Ok(Declaration { name, type_expr, value, error_info: info })
    }

    fn type_expression(&mut self) -> Result<Expression, ParserError> {
        self.parse_precedence(Precedence::Or)
    }

    fn function_declaration(&mut self, info: ErrorInfo) -> Result<Statement, ParserError> {
        let name = self.identifier()?;
        let function = self.function_rest(info)?;
        Ok(Statement::Declare(Declaration {
            name,
            type_expr: Some(Expression::variable("Func", info)),
            value: Some(Expression::Function(Rc::new(function))),
            error_info: info,
        }))
    }

    // `(ARGS) { BLOCK }`
    fn function_rest(&mut self, info: ErrorInfo) -> Result<FunctionExpression, ParserError> {
        let arguments = self.argument_list()?;
        let body = self.block()?;
        Ok(FunctionExpression { arguments, body, error_info: info })
    }

    fn if_statement(&mut self, info: ErrorInfo) -> Result<Statement, ParserError> {
        let mut branches = vec![(self.expression()?, self.block()?)];
        while self.matches_single(TokenType::Elif).is_some() {
            branches.push((self.expression()?, self.block()?));
        }
        let else_block = match self.matches_single(TokenType::Else) {
            Some(_) => Some(self.block()?),
            None => None,
        };
        Ok(Statement::IfElse { branches, else_block, error_info: info })
    }

    fn for_statement(&mut self, info: ErrorInfo) -> Result<Statement, ParserError> {
        let name_info = self.peek_or_eof().error_info();
        let name = self.identifier()?;
        self.consume(TokenType::In, None)?;
        let iterable = self.expression()?;
        let body = self.block()?;
        let callback = FunctionExpression {
            arguments: ArgumentList { arguments: vec![Argument::untyped(name.clone(), name_info)], splat: None },
            body,
            error_info: info,
        };
        Ok(Statement::For { name, iterable, body: Rc::new(callback), error_info: info })
    }

    fn macro_statement(&mut self, info: ErrorInfo) -> Result<Statement, ParserError> {
        let name = self.identifier()?;
        let mut function = self.function_rest(info)?;
        function.arguments.arguments.insert(0, Argument::untyped("self", info));
        Ok(Statement::Macro { name, function: Rc::new(function), error_info: info })
    }

    fn block(&mut self) -> Result<Block, ParserError> {
        let info = self.consume(TokenType::OpenBrace, None)?;
        let mut statements = Vec::new();
        while !self.is_at_end() && !self.check(&TokenType::CloseBrace) {
            let start = self.current;
            match self.statement() {
                Ok(s) => statements.push(s),
                Err(e) => self.recover(e, start),
            }
        }
        self.consume(TokenType::CloseBrace, None)?;
        Ok(Block { statements, error_info: info })
    }

    fn argument_list(&mut self) -> Result<ArgumentList, ParserError> {
        self.consume(TokenType::OpenParen, None)?;
        let mut result = ArgumentList::default();
        while !self.check(&TokenType::CloseParen) {
            if !result.arguments.is_empty() || result.splat.is_some() {
                self.consume(TokenType::Comma, None)?;
            }
            let info = self.peek_or_eof().error_info();
            if result.splat.is_some() {
                return Err(ParserError::new("A splat argument must be the last argument", info));
            }
            let is_splat = self.matches_single(TokenType::Star).is_some();
            let name = self.identifier()?;
            let type_expr = match self.matches_single(TokenType::Colon) {
                Some(_) => Some(self.type_expression()?),
                None => None,
            };
            let argument = Argument { name, type_expr, error_info: info };
            if is_splat {
                result.splat = Some(argument);
            } else {
                result.arguments.push(argument);
            }
        }
        self.consume(TokenType::CloseParen, None)?;
        Ok(result)
    }

    fn expression(&mut self) -> Result<Expression, ParserError> {
        self.assignment()
    }

    fn assignment(&mut self) -> Result<Expression, ParserError> {
        let target = self.parse_precedence(Precedence::Or)?;
        if self.is_at_end() {
            return Ok(target);
        }
        let next = self.peek().clone();
        let compound = compound_operator(next.get_type());
        if next.get_type() != &TokenType::Equal && compound.is_none() {
            return Ok(target);
        }
        let info = next.error_info();
        match &target {
            Expression::Variable(..) | Expression::Member(..) | Expression::Index(..) => (),
            _ => return Err(ParserError::new("Invalid assignment target", info)),
        }
        self.advance();
        let value = self.assignment()?;
        let value = match compound {
            Some(op) => Expression::Binary(op, Box::new(target.clone()), Box::new(value), info),
            None => value,
        };
        Ok(Expression::Assign(Box::new(target), Box::new(value), info))
    }

    fn parse_precedence(&mut self, precedence: Precedence) -> Result<Expression, ParserError> {
        let mut expr = self.unary()?;
        while !self.is_at_end() {
            let op_precedence = Precedence::from(self.peek().get_type());
            if op_precedence == Precedence::TopLevel || op_precedence < precedence {
                break;
            }
            let token = self.advance().clone();
            let operator = match binary_operator(token.get_type()) {
                Some(op) => op,
                None => return Err(ParserError::new(format!("Unexpected {}", token.get_type()), token.error_info())),
            };
            let right = self.parse_precedence(op_precedence.next().unwrap_or(Precedence::Primary))?;
            expr = Expression::Binary(operator, Box::new(expr), Box::new(right), token.error_info());
        }
        Ok(expr)
    }

    fn unary(&mut self) -> Result<Expression, ParserError> {
        match self.matches(|e| match e {
            TokenType::Minus => Some(UnaryOperator::Minus),
            TokenType::Plus => Some(UnaryOperator::Plus),
            TokenType::Bang => Some(UnaryOperator::Bang),
            _ => None,
        }) {
            Some((operator, info)) => {
                let operand = self.unary()?;
                Ok(Expression::Unary(operator, Box::new(operand), info))
            }
            None => self.call(),
        }
    }

    fn call(&mut self) -> Result<Expression, ParserError> {
        let mut expr = self.primary()?;
        while let Some(token) = self.tokens.get(self.current).cloned() {
            let info = token.error_info();
            expr = match token.get_type() {
                TokenType::Dot => {
                    self.advance();
                    Expression::Member(Box::new(expr), self.identifier()?, info)
                }
                TokenType::OpenParen => {
                    self.advance();
                    let arguments = self.call_arguments()?;
                    Expression::Call(Box::new(expr), arguments, info)
                }
                TokenType::OpenBracket => {
                    self.advance();
                    let index = self.expression()?;
                    self.consume(TokenType::CloseBracket, None)?;
                    Expression::Index(Box::new(expr), Box::new(index), info)
                }
                _ => break,
            };
        }
        Ok(expr)
    }

    // Everything after the opening paren, up to and including the closing one.
    fn call_arguments(&mut self) -> Result<Vec<Expression>, ParserError> {
        let mut arguments = Vec::new();
        while !self.check(&TokenType::CloseParen) {
            if !arguments.is_empty() {
                self.consume(TokenType::Comma, None)?;
            }
            match self.matches_single(TokenType::Star) {
                Some(info) => {
                    let splatted = self.expression()?;
                    arguments.push(Expression::Splat(Box::new(splatted), info));
                    if !self.check(&TokenType::CloseParen) {
                        let info = self.peek_or_eof().error_info();
                        return Err(ParserError::new("A splat argument must be the last argument", info));
                    }
                }
                None => arguments.push(self.expression()?),
            }
        }
        self.consume(TokenType::CloseParen, None)?;
        Ok(arguments)
    }

    fn primary(&mut self) -> Result<Expression, ParserError> {
        let token = self.advance_or_eof();
        let info = token.error_info();
        match token.r#type {
            TokenType::NumberLiteral(text) => parse_number(&text)
                .map(|atom| Expression::Atomic(atom, info))
                .ok_or_else(|| ParserError::new(format!("Invalid numeric literal '{}'", text), info)),
            TokenType::StringLiteral(s) => Ok(Expression::Atomic(Atom::Str(s), info)),
            TokenType::True => Ok(Expression::Atomic(Atom::True, info)),
            TokenType::False => Ok(Expression::Atomic(Atom::False, info)),
            TokenType::Null => Ok(Expression::Atomic(Atom::Null, info)),
            TokenType::Identifier(name) => {
                if self.matches_single(TokenType::Arrow).is_some() {
                    self.lambda(name, info)
                } else {
                    Ok(Expression::Variable(name, info))
                }
            }
            TokenType::OpenParen => {
                let expr = self.expression()?;
                self.consume(TokenType::CloseParen, None)?;
                match expr {
                    Expression::Variable(name, name_info) if self.matches_single(TokenType::Arrow).is_some() =>
                        self.lambda(name, name_info),
                    expr => Ok(expr),
                }
            }
            TokenType::OpenBracket => {
                let mut elements = Vec::new();
                while !self.check(&TokenType::CloseBracket) {
                    if !elements.is_empty() {
                        self.consume(TokenType::Comma, None)?;
                    }
                    elements.push(self.expression()?);
                }
                self.consume(TokenType::CloseBracket, None)?;
                Ok(Expression::Array(elements, info))
            }
            TokenType::OpenBrace => {
                let mut members = Vec::new();
                while !self.check(&TokenType::CloseBrace) {
                    let member_info = self.peek_or_eof().error_info();
                    members.push(self.declaration(member_info)?);
                    self.consume(TokenType::Semicolon, None)?;
                }
                self.consume(TokenType::CloseBrace, None)?;
                Ok(Expression::Object(members, info))
            }
            TokenType::Func => self.function_rest(info).map(|f| Expression::Function(Rc::new(f))),
            TokenType::Mixin => self.mixin(info),
            other => Err(ParserError::new(format!("Expected expression, got {}", other), info)),
        }
    }

    // `x -> expr` (or `(x) -> expr`) is a one argument function returning `expr`.
    fn lambda(&mut self, name: String, info: ErrorInfo) -> Result<Expression, ParserError> {
        let body = self.expression()?;
        let body_info = body.error_info();
        Ok(Expression::Function(Rc::new(FunctionExpression {
            arguments: ArgumentList { arguments: vec![Argument::untyped(name, info)], splat: None },
            body: Block { statements: vec![Statement::Return(body, body_info)], error_info: body_info },
            error_info: info,
        })))
    }

    // The tokens between the braces are captured as is, for later re-scanning.
    fn mixin(&mut self, info: ErrorInfo) -> Result<Expression, ParserError> {
        self.consume(TokenType::OpenBrace, None)?;
        let mut depth = 1;
        let mut captured = Vec::new();
        loop {
            if self.is_at_end() {
                return Err(ParserError::new("Unterminated mixin", info));
            }
            let token = self.advance().clone();
            match token.get_type() {
                TokenType::OpenBrace => depth += 1,
                TokenType::CloseBrace => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                _ => (),
            }
            captured.push(token);
        }
        Ok(Expression::Mixin(captured, info))
    }

    /// Scans and parses `path`, returning its statements as a single import node.
    pub fn import_file(&mut self, path: &str, info: ErrorInfo) -> Result<Statement, ParserError> {
        if self.import_stack.iter().any(|p| p == path) {
            return Err(ParserError::new(format!("Circular import of '{}'", path), info));
        }
        let source = fs::read_to_string(path)
            .map_err(|e| ParserError::new(format!("Could not open '{}': {}", path, e), info))?;
        debug!(path, importer = %self.file, "importing");
        let file: Rc<str> = Rc::from(path);
        let nested = Parser::with_import_stack(tokenize(&source), file.clone(), self.import_stack.clone());
        let output = nested.parse();
        self.error_list.extend(output.error_list);
        Ok(Statement::Import(Import {
            path: path.to_owned(),
            file,
            statements: output.program.statements,
            error_info: info,
        }))
    }

    fn identifier(&mut self) -> Result<String, ParserError> {
        let token = self.advance_or_eof();
        let info = token.error_info();
        match token.r#type {
            TokenType::Identifier(name) => Ok(name),
            other => Err(ParserError::new(format!("Expected identifier, got {}", other), info)),
        }
    }

    fn check(&self, expected: &TokenType) -> bool {
        !self.is_at_end() && self.peek().get_type() == expected
    }

    fn matches_single(&mut self, expected: TokenType) -> Option<ErrorInfo> {
        if self.check(&expected) {
            Some(self.advance().error_info())
        } else {
            None
        }
    }

    fn matches<F, A>(&mut self, func: F) -> Option<(A, ErrorInfo)>
        where F: Fn(&TokenType) -> Option<A>
    {
        if self.is_at_end() {
            return None;
        }
        let result = func(self.peek().get_type()).map(|e| (e, self.peek().error_info()));
        if result.is_some() {
            self.advance();
        }
        result
    }

    fn consume(&mut self, expected: TokenType, msg: Option<String>) -> Result<ErrorInfo, ParserError> {
        let expected_msg = msg.unwrap_or_else(|| expected.to_string());
        if self.is_at_end() {
            Err(ParserError::new(
                format!("Expected {}, but encountered end of file", expected_msg),
                self.eof_info(),
            ))
        } else if self.peek().get_type() != &expected {
            let p = self.peek();
            Err(ParserError::new(format!("Expected {}, but encountered {}", expected_msg, p.get_type()), p.error_info()))
        } else {
            Ok(self.advance().error_info())
        }
    }

    fn advance(&mut self) -> &Token {
        assert!(!self.is_at_end());
        self.current += 1;
        self.previous()
    }

    // Like advance, but yields a synthetic end-of-file token instead of running off the end.
    fn advance_or_eof(&mut self) -> Token {
        if self.is_at_end() {
            Token::new(self.eof_info().row, self.eof_info().col, TokenType::Eof)
        } else {
            self.advance().clone()
        }
    }

    fn peek_or_eof(&self) -> Token {
        if self.is_at_end() {
            Token::new(self.eof_info().row, self.eof_info().col, TokenType::Eof)
        } else {
            self.peek().clone()
        }
    }

    fn eof_info(&self) -> ErrorInfo {
        self.tokens.last().map(Token::error_info).unwrap_or_else(|| ErrorInfo::new(1, 1))
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.tokens.len()
    }
    fn previous(&self) -> &Token {
        &self.tokens[self.current - 1]
    }
    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }
    fn peek_n(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.current + n)
    }

    // Skips to the next statement boundary: just past a `;`, or right before a closing brace or a
    // statement keyword.
    fn synchronize(&mut self) {
        while !self.is_at_end() {
            match self.peek().get_type() {
                TokenType::Semicolon => {
                    self.advance();
                    return;
                }
                TokenType::CloseBrace | TokenType::Let | TokenType::Func | TokenType::If | TokenType::While
                | TokenType::For | TokenType::Return | TokenType::Import | TokenType::Macro => return,
                _ => {
                    self.advance();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions_sorted::assert_eq_sorted;

    use crate::assert_msg_contains;
    use crate::peach::common::error::ErrorKind;
    use crate::peach::common::tests::unsafe_tokenize;
    use crate::peach::interpreted::tests::unsafe_parse;

    use super::*;

    fn at(row: usize, col: usize) -> ErrorInfo { ErrorInfo::new(row, col) }

    fn parse_errors(program: Vec<&str>) -> Vec<Diagnostic> {
        Parser::new(unsafe_tokenize(program), Rc::from("test.peach")).parse().error_list
    }

    fn single_expression(line: &str) -> Expression {
        match unsafe_parse(vec![line]).statements.as_slice() {
            [Statement::Expression(e)] => e.clone(),
            other => panic!("Expected a single expression statement, got {:?}", other),
        }
    }

    #[test]
    fn declaration_with_type_and_value() {
        assert_eq_sorted!(
            unsafe_parse(vec!["let x: Int = 5;"]).statements,
            vec![Statement::Declare(Declaration {
                name: "x".to_owned(),
                type_expr: Some(Expression::variable("Int", at(1, 8))),
                value: Some(Expression::int(5, at(1, 14))),
                error_info: at(1, 1),
            })],
        );
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        assert_eq_sorted!(
            single_expression("1 + 2 * 3;"),
            Expression::Binary(
                BinaryOperator::Plus,
                Box::new(Expression::int(1, at(1, 1))),
                Box::new(Expression::Binary(
                    BinaryOperator::Mult,
                    Box::new(Expression::int(2, at(1, 5))),
                    Box::new(Expression::int(3, at(1, 9))),
                    at(1, 7),
                )),
                at(1, 3),
            ),
        );
    }

    #[test]
    fn binary_operators_are_left_associative() {
        assert_eq_sorted!(
            single_expression("a - b - c;"),
            Expression::Binary(
                BinaryOperator::Minus,
                Box::new(Expression::Binary(
                    BinaryOperator::Minus,
                    Box::new(Expression::variable("a", at(1, 1))),
                    Box::new(Expression::variable("b", at(1, 5))),
                    at(1, 3),
                )),
                Box::new(Expression::variable("c", at(1, 9))),
                at(1, 7),
            ),
        );
    }

    #[test]
    fn postfix_chains_apply_left_to_right() {
        assert_eq_sorted!(
            single_expression("a.b(c)[0].d;"),
            Expression::member(
                Expression::Index(
                    Box::new(Expression::Call(
                        Box::new(Expression::member(Expression::variable("a", at(1, 1)), "b", at(1, 2))),
                        vec![Expression::variable("c", at(1, 5))],
                        at(1, 4),
                    )),
                    Box::new(Expression::int(0, at(1, 8))),
                    at(1, 7),
                ),
                "d",
                at(1, 10),
            ),
        );
    }

    #[test]
    fn compound_assignment_desugars() {
        assert_eq_sorted!(
            single_expression("x += 1;"),
            Expression::Assign(
                Box::new(Expression::variable("x", at(1, 1))),
                Box::new(Expression::Binary(
                    BinaryOperator::Plus,
                    Box::new(Expression::variable("x", at(1, 1))),
                    Box::new(Expression::int(1, at(1, 6))),
                    at(1, 3),
                )),
                at(1, 3),
            ),
        );
    }

    #[test]
    fn lambda_sugar() {
        match single_expression("x -> x * 2;") {
            Expression::Function(f) => {
                assert_eq!(f.arguments.arguments.len(), 1);
                assert_eq!(f.arguments.arguments[0].name, "x");
                assert!(matches!(f.body.statements.as_slice(), [Statement::Return(Expression::Binary(..), _)]));
            }
            other => panic!("Expected a function, got {:?}", other),
        }
    }

    #[test]
    fn parenthesized_lambda_sugar() {
        match single_expression("(x) -> x * 2;") {
            Expression::Function(f) => {
                assert_eq!(f.arguments.arguments, vec![Argument::untyped("x", at(1, 2))]);
                assert!(matches!(f.body.statements.as_slice(), [Statement::Return(Expression::Binary(..), _)]));
            }
            other => panic!("Expected a function, got {:?}", other),
        }
        assert_eq!(single_expression("(x);"), Expression::variable("x", at(1, 2)));
    }

    #[test]
    fn radix_and_float_literals() {
        assert_eq!(single_expression("0x1F;"), Expression::int(31, at(1, 1)));
        assert_eq!(single_expression("0b101;"), Expression::int(5, at(1, 1)));
        assert_eq!(single_expression("2.5;"), Expression::Atomic(Atom::Float(2.5), at(1, 1)));
    }

    #[test]
    fn malformed_number_is_a_syntax_error() {
        let errors = parse_errors(vec!["let x = 12abc;"]);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ErrorKind::Syntax);
        assert_msg_contains!(errors, "Invalid numeric literal");
    }

    #[test]
    fn function_declaration_is_typed_let() {
        match unsafe_parse(vec!["func f(a, b: Int) { return a; }"]).statements.as_slice() {
            [Statement::Declare(Declaration { name, type_expr: Some(Expression::Variable(t, _)), value: Some(Expression::Function(f)), .. })] => {
                assert_eq!(name, "f");
                assert_eq!(t, "Func");
                assert_eq!(f.arguments.arguments.len(), 2);
                assert!(f.arguments.arguments[1].type_expr.is_some());
            }
            other => panic!("Unexpected {:?}", other),
        }
    }

    #[test]
    fn splat_arguments() {
        match unsafe_parse(vec!["func f(a, *rest) { }"]).statements.as_slice() {
            [Statement::Declare(Declaration { value: Some(Expression::Function(f)), .. })] => {
                assert_eq!(f.arguments.arguments.len(), 1);
                assert_eq!(f.arguments.splat.as_ref().map(|s| s.name.as_str()), Some("rest"));
            }
            other => panic!("Unexpected {:?}", other),
        }
        assert!(matches!(
            single_expression("f(1, *xs);"),
            Expression::Call(_, args, _) if matches!(args.as_slice(), [_, Expression::Splat(..)])
        ));
    }

    #[test]
    fn splat_must_be_last() {
        assert_msg_contains!(parse_errors(vec!["func f(*rest, a) { }"]), "must be the last argument");
        assert_msg_contains!(parse_errors(vec!["f(*xs, 1);"]), "must be the last argument");
    }

    #[test]
    fn for_statement_wraps_body_in_a_callback() {
        match unsafe_parse(vec!["for x in [1, 2] { print(x); }"]).statements.as_slice() {
            [Statement::For { name, iterable: Expression::Array(elements, _), body, .. }] => {
                assert_eq!(name, "x");
                assert_eq!(elements.len(), 2);
                assert_eq!(body.arguments.arguments[0].name, "x");
                assert_eq!(body.body.statements.len(), 1);
            }
            other => panic!("Unexpected {:?}", other),
        }
    }

    #[test]
    fn macro_gets_an_implicit_self() {
        match unsafe_parse(vec!["macro m(a) { return a; }"]).statements.as_slice() {
            [Statement::Macro { name, function, .. }] => {
                assert_eq!(name, "m");
                let names: Vec<&str> = function.arguments.arguments.iter().map(|a| a.name.as_str()).collect();
                assert_eq!(names, vec!["self", "a"]);
            }
            other => panic!("Unexpected {:?}", other),
        }
    }

    #[test]
    fn mixin_captures_raw_tokens() {
        match single_expression("mixin { let y = { a; }; };") {
            Expression::Mixin(tokens, _) => {
                let types: Vec<TokenType> = tokens.into_iter().map(|t| t.r#type).collect();
                assert_eq!(types, vec![
                    TokenType::Let,
                    TokenType::identifier("y"),
                    TokenType::Equal,
                    TokenType::OpenBrace,
                    TokenType::identifier("a"),
                    TokenType::Semicolon,
                    TokenType::CloseBrace,
                    TokenType::Semicolon,
                ]);
            }
            other => panic!("Expected a mixin, got {:?}", other),
        }
    }

    #[test]
    fn if_elif_else() {
        match unsafe_parse(vec!["if a { 1; } elif b { 2; } else { 3; }"]).statements.as_slice() {
            [Statement::IfElse { branches, else_block: Some(_), .. }] => assert_eq!(branches.len(), 2),
            other => panic!("Unexpected {:?}", other),
        }
    }

    #[test]
    fn object_literal_members() {
        match unsafe_parse(vec!["let o = { x: Int; y = 2; };"]).statements.as_slice() {
            [Statement::Declare(Declaration { value: Some(Expression::Object(members, _)), .. })] => {
                assert_eq!(members.len(), 2);
                assert!(members[0].type_expr.is_some() && members[0].value.is_none());
                assert!(members[1].type_expr.is_none() && members[1].value.is_some());
            }
            other => panic!("Expected an object, got {:?}", other),
        }
    }

    #[test]
    fn reports_every_missing_semicolon() {
        let errors = parse_errors(vec!["let a = 1", "let b = 2", "let c = 3;"]);
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].info, at(2, 1));
        assert_eq!(errors[1].info, at(3, 1));
        assert!(errors.iter().all(|e| e.kind == ErrorKind::Syntax));

        let errors = parse_errors(vec!["print(1)", "print(2)", "print(3);"]);
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].info, at(2, 1));
        assert_eq!(errors[1].info, at(3, 1));
    }

    #[test]
    fn missing_names_point_at_the_offending_token() {
        let errors = parse_errors(vec!["let 5 = 1;"]);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].info, at(1, 5));
        assert_msg_contains!(errors, "Expected identifier");
    }

    #[test]
    fn statements_after_a_missing_semicolon_are_kept() {
        let output = Parser::new(unsafe_tokenize(vec!["print(1)", "return 2", "let x = 3;"]), Rc::from("test.peach")).parse();
        assert_eq!(output.error_list.len(), 2);
        assert_eq!(output.program.statements.len(), 3);
    }

    #[test]
    fn recovers_inside_blocks() {
        let output = Parser::new(
            unsafe_tokenize(vec!["while x {", "  let = 3;", "  y;", "}", "let ok = 1;"]),
            Rc::from("test.peach"),
        ).parse();
        assert_eq!(output.error_list.len(), 1);
        assert_eq!(output.program.statements.len(), 2);
    }

    #[test]
    fn invalid_assignment_target() {
        assert_msg_contains!(parse_errors(vec!["1 = 2;"]), "Invalid assignment target");
    }

    #[test]
    fn stray_closing_brace_does_not_stall() {
        let errors = parse_errors(vec!["}", "let a = 1;"]);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn missing_import_is_a_syntax_error() {
        let errors = parse_errors(vec!["import \"definitely/not/here.peach\";"]);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ErrorKind::Syntax);
        assert_msg_contains!(errors, "Could not open");
    }
}
