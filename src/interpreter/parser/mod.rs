//! PEST-based parser for the supported ECMAScript subset
//!
//! Produces the same ESTree-shaped [`Node`] trees that deserialize from an
//! external parser's JSON, with `loc` filled in for every node.

use pest::iterators::{Pair, Pairs};
use pest::Parser;
use pest_derive::Parser;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use thiserror::Error;

use super::types::ast::{
    AssignmentOperator, BinaryOperator, LiteralValue, LogicalOperator, MethodKind, NodeKind,
    Position, PropertyKind, SourceLocation, TemplateValue, UnaryOperator, UpdateOperator,
    VariableKind,
};
use super::types::Node;

#[cfg(test)]
mod tests;

/* ===================== PEST Parser ===================== */

#[derive(Parser)]
#[grammar = "interpreter/parser/grammar.pest"]
struct ScriptParser;

/* ===================== Error Types ===================== */

/// Syntax error with its 1-based line and 0-based column
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("SyntaxError: {description} ({line}:{column})")]
pub struct ParseError {
    pub line: usize,
    pub column: usize,
    pub description: String,
}

impl ParseError {
    fn at(pair: &Pair<'_, Rule>, description: impl Into<String>) -> Self {
        let (line, column) = pair.as_span().start_pos().line_col();
        ParseError {
            line,
            column: column.saturating_sub(1),
            description: description.into(),
        }
    }

    fn malformed(rule: Rule) -> Self {
        ParseError {
            line: 0,
            column: 0,
            description: format!("Malformed {:?}", rule),
        }
    }
}

impl From<pest::error::Error<Rule>> for ParseError {
    fn from(err: pest::error::Error<Rule>) -> Self {
        let (line, column) = match err.line_col {
            pest::error::LineColLocation::Pos((line, column)) => (line, column),
            pest::error::LineColLocation::Span((line, column), _) => (line, column),
        };
        ParseError {
            line,
            column: column.saturating_sub(1),
            description: err.variant.message().into_owned(),
        }
    }
}

pub type ParseResult<T> = Result<T, ParseError>;

/* ===================== Public API ===================== */

/// Parses script source into a `Program` node
pub fn parse(source: &str) -> ParseResult<Rc<Node>> {
    let mut pairs = ScriptParser::parse(Rule::program, source)?;
    let program = pairs.next().ok_or(ParseError::malformed(Rule::program))?;
    build_program(program)
}

/// Parses the source text of a single function into its function node
///
/// The text is parsed as a parenthesized expression, so declarations and
/// expressions (including arrows) are both accepted.
pub fn parse_function(source: &str) -> ParseResult<Rc<Node>> {
    let program = parse(&format!("({})", source))?;
    let NodeKind::Program { body } = &program.kind else {
        return Err(ParseError::malformed(Rule::program));
    };
    let expression = match body.as_slice() {
        [statement] => match &statement.kind {
            NodeKind::ExpressionStatement { expression } => expression.clone(),
            _ => return Err(ParseError::malformed(Rule::expression_statement)),
        },
        _ => {
            return Err(ParseError {
                line: 1,
                column: 0,
                description: "Expected a single function".to_string(),
            })
        }
    };
    match expression.kind {
        NodeKind::FunctionExpression { .. } | NodeKind::ArrowFunctionExpression { .. } => {
            Ok(expression)
        }
        _ => Err(ParseError {
            line: 1,
            column: 0,
            description: format!("Expected a function, found {}", expression.type_name()),
        }),
    }
}

/// Memoizes parsed trees by source text
#[derive(Default)]
pub struct ParseCache {
    trees: RefCell<HashMap<String, Rc<Node>>>,
}

impl ParseCache {
    pub fn new() -> Self {
        ParseCache::default()
    }

    pub fn parse(&self, source: &str) -> ParseResult<Rc<Node>> {
        if let Some(tree) = self.trees.borrow().get(source) {
            return Ok(tree.clone());
        }
        let tree = parse(source)?;
        self.trees
            .borrow_mut()
            .insert(source.to_string(), tree.clone());
        Ok(tree)
    }

    pub fn len(&self) -> usize {
        self.trees.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.trees.borrow_mut().clear();
    }
}

/* ===================== Pair Helpers ===================== */

fn is_keyword(rule: Rule) -> bool {
    matches!(
        rule,
        Rule::kw_break
            | Rule::kw_catch
            | Rule::kw_class
            | Rule::kw_continue
            | Rule::kw_debugger
            | Rule::kw_else
            | Rule::kw_extends
            | Rule::kw_finally
            | Rule::kw_for
            | Rule::kw_function
            | Rule::kw_if
            | Rule::kw_in
            | Rule::kw_new
            | Rule::kw_of
            | Rule::kw_return
            | Rule::kw_throw
            | Rule::kw_try
            | Rule::kw_while
            | Rule::EOI
    )
}

/// Inner pairs of a rule with keyword tokens skipped
struct Children<'i> {
    rule: Rule,
    pairs: Pairs<'i, Rule>,
}

impl<'i> Children<'i> {
    fn of(pair: Pair<'i, Rule>) -> Self {
        Children {
            rule: pair.as_rule(),
            pairs: pair.into_inner(),
        }
    }

    fn peek_rule(&mut self) -> Option<Rule> {
        while let Some(pair) = self.pairs.peek() {
            if !is_keyword(pair.as_rule()) {
                return Some(pair.as_rule());
            }
            self.pairs.next();
        }
        None
    }

    fn next_if(&mut self, rule: Rule) -> Option<Pair<'i, Rule>> {
        if self.peek_rule() == Some(rule) {
            self.pairs.next()
        } else {
            None
        }
    }

    fn expect(&mut self) -> ParseResult<Pair<'i, Rule>> {
        let rule = self.rule;
        self.next().ok_or(ParseError::malformed(rule))
    }
}

impl<'i> Iterator for Children<'i> {
    type Item = Pair<'i, Rule>;

    fn next(&mut self) -> Option<Self::Item> {
        self.pairs.by_ref().find(|pair| !is_keyword(pair.as_rule()))
    }
}

fn location(pair: &Pair<'_, Rule>) -> SourceLocation {
    let span = pair.as_span();
    let (start_line, start_column) = span.start_pos().line_col();
    let (end_line, end_column) = span.end_pos().line_col();
    SourceLocation {
        start: Position {
            line: start_line,
            column: start_column.saturating_sub(1),
        },
        end: Position {
            line: end_line,
            column: end_column.saturating_sub(1),
        },
    }
}

fn node(kind: NodeKind, loc: SourceLocation) -> Rc<Node> {
    Rc::new(Node::with_loc(kind, loc))
}

/// Location from the start of `first` to the end of `last`
fn spanning(first: &Node, last: SourceLocation) -> SourceLocation {
    match first.loc {
        Some(loc) => SourceLocation {
            start: loc.start,
            end: last.end,
        },
        None => last,
    }
}

/* ===================== Statements ===================== */

fn build_program(pair: Pair<'_, Rule>) -> ParseResult<Rc<Node>> {
    let loc = location(&pair);
    let body = Children::of(pair)
        .map(build_statement)
        .collect::<ParseResult<Vec<_>>>()?;
    Ok(node(NodeKind::Program { body }, loc))
}

fn build_statement(pair: Pair<'_, Rule>) -> ParseResult<Rc<Node>> {
    let loc = location(&pair);
    let rule = pair.as_rule();
    let kind = match rule {
        Rule::block => return build_block(pair),
        Rule::variable_declaration => return build_variable_declaration(pair),
        Rule::function_declaration => return build_function(pair, true),
        Rule::class_declaration => return build_class(pair),
        Rule::empty_statement => NodeKind::EmptyStatement,
        Rule::debugger_statement => NodeKind::DebuggerStatement,
        Rule::expression_statement => NodeKind::ExpressionStatement {
            expression: build_expression(Children::of(pair).expect()?)?,
        },
        Rule::if_statement => {
            let mut children = Children::of(pair);
            NodeKind::IfStatement {
                test: build_expression(children.expect()?)?,
                consequent: build_statement(children.expect()?)?,
                alternate: children.next().map(build_statement).transpose()?,
            }
        }
        Rule::while_statement => {
            let mut children = Children::of(pair);
            NodeKind::WhileStatement {
                test: build_expression(children.expect()?)?,
                body: build_statement(children.expect()?)?,
            }
        }
        Rule::for_in_statement | Rule::for_of_statement => {
            let mut children = Children::of(pair);
            let left = build_for_left(children.expect()?)?;
            let right = build_expression(children.expect()?)?;
            let body = build_statement(children.expect()?)?;
            if rule == Rule::for_in_statement {
                NodeKind::ForInStatement { left, right, body }
            } else {
                NodeKind::ForOfStatement { left, right, body }
            }
        }
        Rule::for_statement => {
            let mut children = Children::of(pair);
            let init = children
                .next_if(Rule::for_init)
                .map(|init| {
                    let inner = Children::of(init).expect()?;
                    match inner.as_rule() {
                        Rule::variable_declaration => build_variable_declaration(inner),
                        _ => build_expression(inner),
                    }
                })
                .transpose()?;
            let test = children
                .next_if(Rule::for_test)
                .map(|test| build_expression(Children::of(test).expect()?))
                .transpose()?;
            let update = children
                .next_if(Rule::for_update)
                .map(|update| build_expression(Children::of(update).expect()?))
                .transpose()?;
            NodeKind::ForStatement {
                init,
                test,
                update,
                body: build_statement(children.expect()?)?,
            }
        }
        Rule::return_statement => NodeKind::ReturnStatement {
            argument: Children::of(pair).next().map(build_expression).transpose()?,
        },
        Rule::throw_statement => NodeKind::ThrowStatement {
            argument: build_expression(Children::of(pair).expect()?)?,
        },
        Rule::break_statement => NodeKind::BreakStatement {
            label: Children::of(pair).next().map(|label| identifier(&label)),
        },
        Rule::continue_statement => NodeKind::ContinueStatement {
            label: Children::of(pair).next().map(|label| identifier(&label)),
        },
        Rule::try_statement => {
            let statement = pair.clone();
            let mut children = Children::of(pair);
            let block = build_block(children.expect()?)?;
            let handler = children
                .next_if(Rule::catch_clause)
                .map(build_catch_clause)
                .transpose()?;
            let finalizer = children
                .next_if(Rule::finally_clause)
                .map(|finally| build_block(Children::of(finally).expect()?))
                .transpose()?;
            if handler.is_none() && finalizer.is_none() {
                return Err(ParseError::at(&statement, "Missing catch or finally after try"));
            }
            NodeKind::TryStatement {
                block,
                handler,
                finalizer,
            }
        }
        _ => {
            return Err(ParseError::at(
                &pair,
                format!("Unexpected statement rule: {:?}", rule),
            ))
        }
    };
    Ok(node(kind, loc))
}

fn build_block(pair: Pair<'_, Rule>) -> ParseResult<Rc<Node>> {
    let loc = location(&pair);
    let body = Children::of(pair)
        .map(build_statement)
        .collect::<ParseResult<Vec<_>>>()?;
    Ok(node(NodeKind::BlockStatement { body }, loc))
}

fn build_variable_kind(pair: &Pair<'_, Rule>) -> ParseResult<VariableKind> {
    match pair.as_str() {
        "var" => Ok(VariableKind::Var),
        "let" => Ok(VariableKind::Let),
        "const" => Ok(VariableKind::Const),
        other => Err(ParseError::at(
            pair,
            format!("Expected 'var', 'let' or 'const', got: {}", other),
        )),
    }
}

fn build_variable_declaration(pair: Pair<'_, Rule>) -> ParseResult<Rc<Node>> {
    let loc = location(&pair);
    let mut children = Children::of(pair);
    let kind = build_variable_kind(&children.expect()?)?;
    let declarations = children
        .map(|declarator| {
            let loc = location(&declarator);
            let mut parts = Children::of(declarator);
            let id = build_binding(parts.expect()?)?;
            let init = parts.next().map(build_expression).transpose()?;
            Ok(node(NodeKind::VariableDeclarator { id, init }, loc))
        })
        .collect::<ParseResult<Vec<_>>>()?;
    Ok(node(NodeKind::VariableDeclaration { declarations, kind }, loc))
}

/// Left side of a for-in/for-of head: a bare declaration or an assignable expression
fn build_for_left(pair: Pair<'_, Rule>) -> ParseResult<Rc<Node>> {
    if pair.as_rule() != Rule::for_declaration {
        let target = build_expression(pair.clone())?;
        return assignable(target, &pair);
    }
    let loc = location(&pair);
    let mut children = Children::of(pair);
    let kind = build_variable_kind(&children.expect()?)?;
    let id = build_binding(children.expect()?)?;
    let declarator = node(NodeKind::VariableDeclarator { id, init: None }, loc);
    Ok(node(
        NodeKind::VariableDeclaration {
            declarations: vec![declarator],
            kind,
        },
        loc,
    ))
}

fn build_catch_clause(pair: Pair<'_, Rule>) -> ParseResult<Rc<Node>> {
    let loc = location(&pair);
    let mut children = Children::of(pair);
    let param = match children.peek_rule() {
        Some(Rule::block) => None,
        _ => Some(build_binding(children.expect()?)?),
    };
    let body = build_block(children.expect()?)?;
    Ok(node(NodeKind::CatchClause { param, body }, loc))
}

/* ===================== Functions & Classes ===================== */

/// Builds a function declaration or expression
fn build_function(pair: Pair<'_, Rule>, declaration: bool) -> ParseResult<Rc<Node>> {
    let loc = location(&pair);
    let mut children = Children::of(pair);
    let is_async = children.next_if(Rule::async_marker).is_some();
    let generator = children.next_if(Rule::generator_marker).is_some();
    let id = children.next_if(Rule::identifier).map(|id| identifier(&id));
    let params = build_optional_parameters(&mut children)?;
    let body = build_block(children.expect()?)?;
    let kind = if declaration {
        NodeKind::FunctionDeclaration {
            id,
            params,
            body,
            generator,
            is_async,
        }
    } else {
        NodeKind::FunctionExpression {
            id,
            params,
            body,
            generator,
            is_async,
        }
    };
    Ok(node(kind, loc))
}

fn build_optional_parameters(children: &mut Children<'_>) -> ParseResult<Vec<Rc<Node>>> {
    match children.next_if(Rule::parameters) {
        Some(parameters) => Children::of(parameters)
            .map(build_binding_element)
            .collect(),
        None => Ok(Vec::new()),
    }
}

fn build_arrow_function(pair: Pair<'_, Rule>) -> ParseResult<Rc<Node>> {
    let loc = location(&pair);
    let mut children = Children::of(pair);
    let is_async = children.next_if(Rule::async_marker).is_some();

    let mut head = Children::of(children.expect()?);
    let params = match head.peek_rule() {
        Some(Rule::identifier) => vec![identifier(&head.expect()?)],
        _ => build_optional_parameters(&mut head)?,
    };

    let body_pair = children.expect()?;
    let expression = body_pair.as_rule() != Rule::block;
    let body = if expression {
        build_expression(body_pair)?
    } else {
        build_block(body_pair)?
    };
    Ok(node(
        NodeKind::ArrowFunctionExpression {
            params,
            body,
            expression,
            is_async,
        },
        loc,
    ))
}

fn build_class(pair: Pair<'_, Rule>) -> ParseResult<Rc<Node>> {
    let loc = location(&pair);
    let mut children = Children::of(pair);
    let id = Some(identifier(&children.expect()?));
    let super_class = children
        .next_if(Rule::class_heritage)
        .map(|heritage| build_expression(Children::of(heritage).expect()?))
        .transpose()?;

    let body_pair = children.expect()?;
    let body_loc = location(&body_pair);
    let members = Children::of(body_pair)
        .map(build_class_member)
        .collect::<ParseResult<Vec<_>>>()?;

    Ok(node(
        NodeKind::ClassDeclaration {
            id,
            super_class,
            body: node(NodeKind::ClassBody { body: members }, body_loc),
        },
        loc,
    ))
}

fn build_class_member(pair: Pair<'_, Rule>) -> ParseResult<Rc<Node>> {
    let loc = location(&pair);
    let mut children = Children::of(pair);
    let is_static = children.next_if(Rule::static_marker).is_some();
    let (key, computed) = build_property_key(children.expect()?)?;
    let params = build_optional_parameters(&mut children)?;
    let body = build_block(children.expect()?)?;

    let is_constructor = !is_static
        && !computed
        && match &key.kind {
            NodeKind::Identifier { name } => name == "constructor",
            NodeKind::Literal {
                value: Some(LiteralValue::String(name)),
                ..
            } => name == "constructor",
            _ => false,
        };
    let value = node(
        NodeKind::FunctionExpression {
            id: None,
            params,
            body,
            generator: false,
            is_async: false,
        },
        loc,
    );
    Ok(node(
        NodeKind::MethodDefinition {
            key,
            value,
            kind: if is_constructor {
                MethodKind::Constructor
            } else {
                MethodKind::Method
            },
            computed,
            is_static,
        },
        loc,
    ))
}

/* ===================== Patterns ===================== */

fn identifier(pair: &Pair<'_, Rule>) -> Rc<Node> {
    node(
        NodeKind::Identifier {
            name: pair.as_str().to_string(),
        },
        location(pair),
    )
}

/// Binding target: an identifier or an object pattern
fn build_binding(pair: Pair<'_, Rule>) -> ParseResult<Rc<Node>> {
    match pair.as_rule() {
        Rule::identifier => Ok(identifier(&pair)),
        Rule::object_pattern => {
            let loc = location(&pair);
            let properties = Children::of(pair)
                .map(build_pattern_property)
                .collect::<ParseResult<Vec<_>>>()?;
            Ok(node(NodeKind::ObjectPattern { properties }, loc))
        }
        rule => Err(ParseError::at(
            &pair,
            format!("Unexpected binding rule: {:?}", rule),
        )),
    }
}

/// Binding target with an optional `= default`
fn build_binding_element(pair: Pair<'_, Rule>) -> ParseResult<Rc<Node>> {
    let loc = location(&pair);
    let mut children = Children::of(pair);
    let target = build_binding(children.expect()?)?;
    with_default(target, children.next(), loc)
}

fn with_default(
    target: Rc<Node>,
    default: Option<Pair<'_, Rule>>,
    loc: SourceLocation,
) -> ParseResult<Rc<Node>> {
    match default {
        Some(default) => Ok(node(
            NodeKind::AssignmentPattern {
                left: target,
                right: build_expression(default)?,
            },
            loc,
        )),
        None => Ok(target),
    }
}

fn build_pattern_property(pair: Pair<'_, Rule>) -> ParseResult<Rc<Node>> {
    let loc = location(&pair);
    let mut children = Children::of(pair);
    let first = children.expect()?;

    let (key, value, computed, shorthand) = if first.as_rule() == Rule::property_key {
        let (key, computed) = build_property_key(first)?;
        let value = build_binding_element(children.expect()?)?;
        (key, value, computed, false)
    } else {
        let key = identifier(&first);
        let value = with_default(key.clone(), children.next(), loc)?;
        (key, value, false, true)
    };

    Ok(node(
        NodeKind::Property {
            key,
            value,
            kind: PropertyKind::Init,
            computed,
            shorthand,
            method: false,
        },
        loc,
    ))
}

/* ===================== Expressions ===================== */

fn build_expression(pair: Pair<'_, Rule>) -> ParseResult<Rc<Node>> {
    let loc = location(&pair);
    let rule = pair.as_rule();
    match rule {
        Rule::expression => {
            let expressions = Children::of(pair)
                .map(build_expression)
                .collect::<ParseResult<Vec<_>>>()?;
            match <[Rc<Node>; 1]>::try_from(expressions) {
                Ok([single]) => Ok(single),
                Err(expressions) => Ok(node(NodeKind::SequenceExpression { expressions }, loc)),
            }
        }
        Rule::assignment => build_assignment(pair),
        Rule::arrow_function => build_arrow_function(pair),
        Rule::conditional => {
            let mut children = Children::of(pair);
            let test = build_expression(children.expect()?)?;
            let Some(consequent) = children.next() else {
                return Ok(test);
            };
            Ok(node(
                NodeKind::ConditionalExpression {
                    test,
                    consequent: build_expression(consequent)?,
                    alternate: build_expression(children.expect()?)?,
                },
                loc,
            ))
        }
        Rule::logical_or
        | Rule::logical_and
        | Rule::bitwise_or
        | Rule::bitwise_xor
        | Rule::bitwise_and
        | Rule::equality
        | Rule::relational
        | Rule::shift
        | Rule::additive
        | Rule::multiplicative
        | Rule::exponent => build_operator_chain(pair),
        Rule::unary => build_unary(pair),
        Rule::postfix => {
            let mut children = Children::of(pair);
            let argument = build_expression(children.expect()?)?;
            let Some(operator) = children.next() else {
                return Ok(argument);
            };
            let argument = assignable(argument, &operator)?;
            Ok(node(
                NodeKind::UpdateExpression {
                    operator: update_operator(&operator)?,
                    argument,
                    prefix: false,
                },
                loc,
            ))
        }
        Rule::member_chain | Rule::new_target => build_member_chain(pair),
        Rule::new_expression => {
            let mut children = Children::of(pair);
            let callee = build_expression(children.expect()?)?;
            let arguments = match children.next() {
                Some(arguments) => build_arguments(arguments)?,
                None => Vec::new(),
            };
            Ok(node(NodeKind::NewExpression { callee, arguments }, loc))
        }
        Rule::function_expression => build_function(pair, false),
        Rule::parenthesized => build_expression(Children::of(pair).expect()?),
        Rule::this_expression => Ok(node(NodeKind::ThisExpression, loc)),
        Rule::identifier => Ok(identifier(&pair)),
        Rule::null_literal => Ok(literal(None, &pair)),
        Rule::boolean_literal => Ok(literal(
            Some(LiteralValue::Boolean(pair.as_str() == "true")),
            &pair,
        )),
        Rule::number_literal => Ok(literal(Some(LiteralValue::Number(number(&pair)?)), &pair)),
        Rule::string_literal => {
            let content = Children::of(pair.clone())
                .next()
                .map(|content| unescape(content.as_str()))
                .unwrap_or_default();
            Ok(literal(Some(LiteralValue::String(content)), &pair))
        }
        Rule::template_literal => build_template(pair),
        Rule::array_literal => {
            let elements = Children::of(pair)
                .map(|element| match element.as_rule() {
                    Rule::array_hole => Ok(None),
                    _ => build_expression(element).map(Some),
                })
                .collect::<ParseResult<Vec<_>>>()?;
            Ok(node(NodeKind::ArrayExpression { elements }, loc))
        }
        Rule::object_literal => {
            let properties = Children::of(pair)
                .map(build_object_property)
                .collect::<ParseResult<Vec<_>>>()?;
            Ok(node(NodeKind::ObjectExpression { properties }, loc))
        }
        _ => Err(ParseError::at(
            &pair,
            format!("Unexpected expression rule: {:?}", rule),
        )),
    }
}

fn build_assignment(pair: Pair<'_, Rule>) -> ParseResult<Rc<Node>> {
    let loc = location(&pair);
    let mut children = Children::of(pair);
    let left = build_expression(children.expect()?)?;
    let Some(operator) = children.next() else {
        return Ok(left);
    };
    let left = assignable(left, &operator)?;
    let symbol = operator.as_str();
    let operator_kind = AssignmentOperator::from_symbol(symbol)
        .ok_or_else(|| ParseError::at(&operator, format!("Unknown operator '{}'", symbol)))?;
    Ok(node(
        NodeKind::AssignmentExpression {
            operator: operator_kind,
            left,
            right: build_expression(children.expect()?)?,
        },
        loc,
    ))
}

/// Rejects targets that cannot be assigned to
fn assignable(target: Rc<Node>, at: &Pair<'_, Rule>) -> ParseResult<Rc<Node>> {
    match target.kind {
        NodeKind::Identifier { .. } | NodeKind::MemberExpression { .. } => Ok(target),
        _ => Err(ParseError::at(
            at,
            format!("Invalid assignment target: {}", target.type_name()),
        )),
    }
}

/// Left-associative binary/logical chain; `**` is right-associative by grammar
fn build_operator_chain(pair: Pair<'_, Rule>) -> ParseResult<Rc<Node>> {
    let mut children = Children::of(pair);
    let mut left = build_expression(children.expect()?)?;
    while let Some(operator) = children.next() {
        let right = build_expression(children.expect()?)?;
        let symbol = operator.as_str();
        let kind = if let Some(operator) = LogicalOperator::from_symbol(symbol) {
            NodeKind::LogicalExpression {
                operator,
                left: left.clone(),
                right: right.clone(),
            }
        } else if let Some(operator) = BinaryOperator::from_symbol(symbol) {
            NodeKind::BinaryExpression {
                operator,
                left: left.clone(),
                right: right.clone(),
            }
        } else {
            return Err(ParseError::at(
                &operator,
                format!("Unknown operator '{}'", symbol),
            ));
        };
        let loc = match right.loc {
            Some(end) => spanning(&left, end),
            None => location(&operator),
        };
        left = node(kind, loc);
    }
    Ok(left)
}

fn build_unary(pair: Pair<'_, Rule>) -> ParseResult<Rc<Node>> {
    let children: Vec<_> = Children::of(pair.clone()).collect();
    let Some((operand, operators)) = children.split_last() else {
        return Err(ParseError::malformed(Rule::unary));
    };
    let mut argument = build_expression(operand.clone())?;
    for operator in operators.iter().rev() {
        let loc = SourceLocation {
            start: location(operator).start,
            end: argument.loc.unwrap_or_else(|| location(&pair)).end,
        };
        let symbol = operator.as_str();
        let kind = match symbol {
            "++" | "--" => NodeKind::UpdateExpression {
                operator: update_operator(operator)?,
                argument: assignable(argument, operator)?,
                prefix: true,
            },
            _ => NodeKind::UnaryExpression {
                operator: UnaryOperator::from_symbol(symbol).ok_or_else(|| {
                    ParseError::at(operator, format!("Unknown operator '{}'", symbol))
                })?,
                argument,
                prefix: true,
            },
        };
        argument = node(kind, loc);
    }
    Ok(argument)
}

fn update_operator(pair: &Pair<'_, Rule>) -> ParseResult<UpdateOperator> {
    UpdateOperator::from_symbol(pair.as_str())
        .ok_or_else(|| ParseError::at(pair, format!("Unknown operator '{}'", pair.as_str())))
}

/// Primary expression followed by calls and member accesses
fn build_member_chain(pair: Pair<'_, Rule>) -> ParseResult<Rc<Node>> {
    let mut children = Children::of(pair);
    let mut expression = build_expression(children.expect()?)?;
    for suffix in children {
        let loc = spanning(&expression, location(&suffix));
        let kind = match suffix.as_rule() {
            Rule::call_arguments => NodeKind::CallExpression {
                callee: expression,
                arguments: build_arguments(suffix)?,
            },
            Rule::static_member => NodeKind::MemberExpression {
                object: expression,
                property: identifier(&Children::of(suffix).expect()?),
                computed: false,
            },
            Rule::computed_member => NodeKind::MemberExpression {
                object: expression,
                property: build_expression(Children::of(suffix).expect()?)?,
                computed: true,
            },
            rule => {
                return Err(ParseError::at(
                    &suffix,
                    format!("Unexpected member rule: {:?}", rule),
                ))
            }
        };
        expression = node(kind, loc);
    }
    Ok(expression)
}

fn build_arguments(pair: Pair<'_, Rule>) -> ParseResult<Vec<Rc<Node>>> {
    Children::of(pair).map(build_expression).collect()
}

/// Property key and whether it is computed
fn build_property_key(pair: Pair<'_, Rule>) -> ParseResult<(Rc<Node>, bool)> {
    let key = Children::of(pair).expect()?;
    match key.as_rule() {
        Rule::computed_key => Ok((build_expression(Children::of(key).expect()?)?, true)),
        Rule::property_name => Ok((identifier(&key), false)),
        _ => Ok((build_expression(key)?, false)),
    }
}

fn build_object_property(pair: Pair<'_, Rule>) -> ParseResult<Rc<Node>> {
    let loc = location(&pair);
    let rule = pair.as_rule();
    let mut children = Children::of(pair.clone());

    let (key, value, computed, shorthand, method) = match rule {
        Rule::init_property => {
            let (key, computed) = build_property_key(children.expect()?)?;
            (key, build_expression(children.expect()?)?, computed, false, false)
        }
        Rule::method_property => {
            let (key, computed) = build_property_key(children.expect()?)?;
            let params = build_optional_parameters(&mut children)?;
            let body = build_block(children.expect()?)?;
            let value = node(
                NodeKind::FunctionExpression {
                    id: None,
                    params,
                    body,
                    generator: false,
                    is_async: false,
                },
                loc,
            );
            (key, value, computed, false, true)
        }
        Rule::shorthand_property => {
            let key = identifier(&children.expect()?);
            (key.clone(), key, false, true, false)
        }
        _ => {
            return Err(ParseError::at(
                &pair,
                format!("Unexpected property rule: {:?}", rule),
            ))
        }
    };

    Ok(node(
        NodeKind::Property {
            key,
            value,
            kind: PropertyKind::Init,
            computed,
            shorthand,
            method,
        },
        loc,
    ))
}

/* ===================== Literals ===================== */

fn literal(value: Option<LiteralValue>, pair: &Pair<'_, Rule>) -> Rc<Node> {
    node(
        NodeKind::Literal {
            value,
            raw: Some(pair.as_str().to_string()),
            regex: None,
        },
        location(pair),
    )
}

fn number(pair: &Pair<'_, Rule>) -> ParseResult<f64> {
    let text = pair.as_str();
    let parsed = match text.get(..2) {
        Some("0x") | Some("0X") => u64::from_str_radix(&text[2..], 16).map(|n| n as f64).ok(),
        _ => text.parse::<f64>().ok(),
    };
    parsed.ok_or_else(|| ParseError::at(pair, format!("Invalid number '{}'", text)))
}

fn build_template(pair: Pair<'_, Rule>) -> ParseResult<Rc<Node>> {
    let loc = location(&pair);
    let mut quasis = Vec::new();
    let mut expressions = Vec::new();
    let mut pending: Option<Pair<'_, Rule>> = None;

    for part in Children::of(pair) {
        match part.as_rule() {
            Rule::template_chars => pending = Some(part),
            _ => {
                quasis.push(template_element(pending.take().as_ref(), false));
                expressions.push(build_expression(Children::of(part).expect()?)?);
            }
        }
    }
    quasis.push(template_element(pending.as_ref(), true));

    Ok(node(NodeKind::TemplateLiteral { quasis, expressions }, loc))
}

fn template_element(chars: Option<&Pair<'_, Rule>>, tail: bool) -> Rc<Node> {
    let raw = chars.map(|chars| chars.as_str()).unwrap_or_default();
    let kind = NodeKind::TemplateElement {
        value: TemplateValue {
            cooked: Some(unescape(raw)),
            raw: raw.to_string(),
        },
        tail,
    };
    match chars {
        Some(chars) => node(kind, location(chars)),
        None => Rc::new(Node::new(kind)),
    }
}

/// Resolves escape sequences in string and template text
fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{c}'),
            Some('v') => out.push('\u{b}'),
            Some('0') => out.push('\0'),
            Some('x') => {
                let digits: String = chars.by_ref().take(2).collect();
                out.push(code_point(&digits));
            }
            Some('u') => {
                let digits: String = if chars.peek() == Some(&'{') {
                    chars.next();
                    chars.by_ref().take_while(|c| *c != '}').collect()
                } else {
                    chars.by_ref().take(4).collect()
                };
                out.push(code_point(&digits));
            }
            // Line continuation
            Some('\n') => {}
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

fn code_point(hex: &str) -> char {
    u32::from_str_radix(hex, 16)
        .ok()
        .and_then(char::from_u32)
        .unwrap_or(char::REPLACEMENT_CHARACTER)
}
