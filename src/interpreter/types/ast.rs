//! Abstract Syntax Tree node types
//!
//! Nodes follow the ESTree shape: every node carries a `type` discriminator and
//! construct-specific children. Trees are immutable once built and are shared
//! between evaluations through `Rc<Node>`, so one parsed program can be evaluated
//! against any number of environments.
//!
//! The same types deserialize straight from ESTree JSON produced by an external
//! parser. Unknown `type` tags are rejected at that point, never during evaluation.

use serde::{Deserialize, Serialize};
use std::rc::Rc;

/* ===================== Source Locations ===================== */

/// Line/column pair (lines are 1-based, columns 0-based, as in ESTree)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub start: Position,
    pub end: Position,
}

/* ===================== Node ===================== */

/// AST node: a tagged construct plus an optional source location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    #[serde(flatten)]
    pub kind: NodeKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loc: Option<SourceLocation>,
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Node { kind, loc: None }
    }

    pub fn with_loc(kind: NodeKind, loc: SourceLocation) -> Self {
        Node {
            kind,
            loc: Some(loc),
        }
    }

    /// ESTree `type` tag of this node
    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }

    /// Name of an `Identifier` node, `None` for anything else
    pub fn identifier_name(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Identifier { name } => Some(name),
            _ => None,
        }
    }
}

/// Node payload, discriminated by the ESTree `type` tag
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum NodeKind {
    /* ----- Program & statements ----- */
    Program {
        body: Vec<Rc<Node>>,
    },
    BlockStatement {
        body: Vec<Rc<Node>>,
    },
    ExpressionStatement {
        expression: Rc<Node>,
    },
    EmptyStatement,
    DebuggerStatement,
    VariableDeclaration {
        declarations: Vec<Rc<Node>>,
        kind: VariableKind,
    },
    VariableDeclarator {
        id: Rc<Node>,
        #[serde(default)]
        init: Option<Rc<Node>>,
    },
    IfStatement {
        test: Rc<Node>,
        consequent: Rc<Node>,
        #[serde(default)]
        alternate: Option<Rc<Node>>,
    },
    WhileStatement {
        test: Rc<Node>,
        body: Rc<Node>,
    },
    ForStatement {
        #[serde(default)]
        init: Option<Rc<Node>>,
        #[serde(default)]
        test: Option<Rc<Node>>,
        #[serde(default)]
        update: Option<Rc<Node>>,
        body: Rc<Node>,
    },
    ForInStatement {
        left: Rc<Node>,
        right: Rc<Node>,
        body: Rc<Node>,
    },
    ForOfStatement {
        left: Rc<Node>,
        right: Rc<Node>,
        body: Rc<Node>,
    },
    FunctionDeclaration {
        #[serde(default)]
        id: Option<Rc<Node>>,
        params: Vec<Rc<Node>>,
        body: Rc<Node>,
        #[serde(default)]
        generator: bool,
        #[serde(default, rename = "async")]
        is_async: bool,
    },
    ReturnStatement {
        #[serde(default)]
        argument: Option<Rc<Node>>,
    },
    ThrowStatement {
        argument: Rc<Node>,
    },
    TryStatement {
        block: Rc<Node>,
        #[serde(default)]
        handler: Option<Rc<Node>>,
        #[serde(default)]
        finalizer: Option<Rc<Node>>,
    },
    CatchClause {
        #[serde(default)]
        param: Option<Rc<Node>>,
        body: Rc<Node>,
    },
    BreakStatement {
        #[serde(default)]
        label: Option<Rc<Node>>,
    },
    ContinueStatement {
        #[serde(default)]
        label: Option<Rc<Node>>,
    },
    ClassDeclaration {
        #[serde(default)]
        id: Option<Rc<Node>>,
        #[serde(default, rename = "superClass")]
        super_class: Option<Rc<Node>>,
        body: Rc<Node>,
    },
    ClassBody {
        body: Vec<Rc<Node>>,
    },
    MethodDefinition {
        key: Rc<Node>,
        value: Rc<Node>,
        kind: MethodKind,
        #[serde(default)]
        computed: bool,
        #[serde(default, rename = "static")]
        is_static: bool,
    },

    /* ----- Expressions ----- */
    Identifier {
        name: String,
    },
    Literal {
        #[serde(default)]
        value: Option<LiteralValue>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        raw: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        regex: Option<RegexLiteral>,
    },
    ThisExpression,
    ArrayExpression {
        elements: Vec<Option<Rc<Node>>>,
    },
    ObjectExpression {
        properties: Vec<Rc<Node>>,
    },
    Property {
        key: Rc<Node>,
        value: Rc<Node>,
        #[serde(default)]
        kind: PropertyKind,
        #[serde(default)]
        computed: bool,
        #[serde(default)]
        shorthand: bool,
        #[serde(default)]
        method: bool,
    },
    FunctionExpression {
        #[serde(default)]
        id: Option<Rc<Node>>,
        params: Vec<Rc<Node>>,
        body: Rc<Node>,
        #[serde(default)]
        generator: bool,
        #[serde(default, rename = "async")]
        is_async: bool,
    },
    ArrowFunctionExpression {
        params: Vec<Rc<Node>>,
        body: Rc<Node>,
        #[serde(default)]
        expression: bool,
        #[serde(default, rename = "async")]
        is_async: bool,
    },
    MemberExpression {
        object: Rc<Node>,
        property: Rc<Node>,
        #[serde(default)]
        computed: bool,
    },
    CallExpression {
        callee: Rc<Node>,
        arguments: Vec<Rc<Node>>,
    },
    NewExpression {
        callee: Rc<Node>,
        #[serde(default)]
        arguments: Vec<Rc<Node>>,
    },
    AssignmentExpression {
        operator: AssignmentOperator,
        left: Rc<Node>,
        right: Rc<Node>,
    },
    UpdateExpression {
        operator: UpdateOperator,
        argument: Rc<Node>,
        prefix: bool,
    },
    UnaryExpression {
        operator: UnaryOperator,
        argument: Rc<Node>,
        #[serde(default = "default_true")]
        prefix: bool,
    },
    BinaryExpression {
        operator: BinaryOperator,
        left: Rc<Node>,
        right: Rc<Node>,
    },
    LogicalExpression {
        operator: LogicalOperator,
        left: Rc<Node>,
        right: Rc<Node>,
    },
    ConditionalExpression {
        test: Rc<Node>,
        consequent: Rc<Node>,
        alternate: Rc<Node>,
    },
    SequenceExpression {
        expressions: Vec<Rc<Node>>,
    },
    TemplateLiteral {
        quasis: Vec<Rc<Node>>,
        expressions: Vec<Rc<Node>>,
    },
    TemplateElement {
        value: TemplateValue,
        #[serde(default)]
        tail: bool,
    },

    /* ----- Patterns ----- */
    ObjectPattern {
        properties: Vec<Rc<Node>>,
    },
    AssignmentPattern {
        left: Rc<Node>,
        right: Rc<Node>,
    },
}

fn default_true() -> bool {
    true
}

impl NodeKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            NodeKind::Program { .. } => "Program",
            NodeKind::BlockStatement { .. } => "BlockStatement",
            NodeKind::ExpressionStatement { .. } => "ExpressionStatement",
            NodeKind::EmptyStatement => "EmptyStatement",
            NodeKind::DebuggerStatement => "DebuggerStatement",
            NodeKind::VariableDeclaration { .. } => "VariableDeclaration",
            NodeKind::VariableDeclarator { .. } => "VariableDeclarator",
            NodeKind::IfStatement { .. } => "IfStatement",
            NodeKind::WhileStatement { .. } => "WhileStatement",
            NodeKind::ForStatement { .. } => "ForStatement",
            NodeKind::ForInStatement { .. } => "ForInStatement",
            NodeKind::ForOfStatement { .. } => "ForOfStatement",
            NodeKind::FunctionDeclaration { .. } => "FunctionDeclaration",
            NodeKind::ReturnStatement { .. } => "ReturnStatement",
            NodeKind::ThrowStatement { .. } => "ThrowStatement",
            NodeKind::TryStatement { .. } => "TryStatement",
            NodeKind::CatchClause { .. } => "CatchClause",
            NodeKind::BreakStatement { .. } => "BreakStatement",
            NodeKind::ContinueStatement { .. } => "ContinueStatement",
            NodeKind::ClassDeclaration { .. } => "ClassDeclaration",
            NodeKind::ClassBody { .. } => "ClassBody",
            NodeKind::MethodDefinition { .. } => "MethodDefinition",
            NodeKind::Identifier { .. } => "Identifier",
            NodeKind::Literal { .. } => "Literal",
            NodeKind::ThisExpression => "ThisExpression",
            NodeKind::ArrayExpression { .. } => "ArrayExpression",
            NodeKind::ObjectExpression { .. } => "ObjectExpression",
            NodeKind::Property { .. } => "Property",
            NodeKind::FunctionExpression { .. } => "FunctionExpression",
            NodeKind::ArrowFunctionExpression { .. } => "ArrowFunctionExpression",
            NodeKind::MemberExpression { .. } => "MemberExpression",
            NodeKind::CallExpression { .. } => "CallExpression",
            NodeKind::NewExpression { .. } => "NewExpression",
            NodeKind::AssignmentExpression { .. } => "AssignmentExpression",
            NodeKind::UpdateExpression { .. } => "UpdateExpression",
            NodeKind::UnaryExpression { .. } => "UnaryExpression",
            NodeKind::BinaryExpression { .. } => "BinaryExpression",
            NodeKind::LogicalExpression { .. } => "LogicalExpression",
            NodeKind::ConditionalExpression { .. } => "ConditionalExpression",
            NodeKind::SequenceExpression { .. } => "SequenceExpression",
            NodeKind::TemplateLiteral { .. } => "TemplateLiteral",
            NodeKind::TemplateElement { .. } => "TemplateElement",
            NodeKind::ObjectPattern { .. } => "ObjectPattern",
            NodeKind::AssignmentPattern { .. } => "AssignmentPattern",
        }
    }
}

/* ===================== Leaf Payloads ===================== */

/// Literal payload; `null` literals deserialize to `None`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LiteralValue {
    Boolean(bool),
    Number(f64),
    String(String),
    /// Anything else an external parser may emit (regular expressions, bigints)
    Unsupported(serde_json::Value),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegexLiteral {
    pub pattern: String,
    #[serde(default)]
    pub flags: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateValue {
    #[serde(default)]
    pub cooked: Option<String>,
    pub raw: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableKind {
    Var,
    Let,
    Const,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MethodKind {
    Constructor,
    Method,
    Get,
    Set,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyKind {
    #[default]
    Init,
    Get,
    Set,
}

/* ===================== Operators ===================== */

/// Declares an operator enum whose serde form is the operator's source symbol
macro_rules! operator_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $symbol:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $symbol)]
                $variant,
            )+
        }

        impl $name {
            pub fn from_symbol(symbol: &str) -> Option<Self> {
                match symbol {
                    $($symbol => Some($name::$variant),)+
                    _ => None,
                }
            }

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $symbol,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

operator_enum!(BinaryOperator {
    Add => "+",
    Sub => "-",
    Mul => "*",
    Div => "/",
    Rem => "%",
    Exp => "**",
    Eq => "==",
    NotEq => "!=",
    StrictEq => "===",
    StrictNotEq => "!==",
    Lt => "<",
    LtEq => "<=",
    Gt => ">",
    GtEq => ">=",
    BitAnd => "&",
    BitOr => "|",
    BitXor => "^",
    Shl => "<<",
    Shr => ">>",
    UShr => ">>>",
    In => "in",
    InstanceOf => "instanceof",
});

operator_enum!(LogicalOperator {
    And => "&&",
    Or => "||",
    Nullish => "??",
});

operator_enum!(UnaryOperator {
    Neg => "-",
    Plus => "+",
    Not => "!",
    BitNot => "~",
    TypeOf => "typeof",
    Void => "void",
    Delete => "delete",
});

operator_enum!(UpdateOperator {
    Increment => "++",
    Decrement => "--",
});

operator_enum!(
    /// Assignment operators; compound forms map onto a binary operator
    AssignmentOperator {
        Assign => "=",
        AddAssign => "+=",
        SubAssign => "-=",
        MulAssign => "*=",
        DivAssign => "/=",
        RemAssign => "%=",
        ExpAssign => "**=",
        ShlAssign => "<<=",
        ShrAssign => ">>=",
        UShrAssign => ">>>=",
        BitAndAssign => "&=",
        BitOrAssign => "|=",
        BitXorAssign => "^=",
    }
);

impl AssignmentOperator {
    /// Binary operator applied by a compound assignment, `None` for plain `=`
    pub fn binary(&self) -> Option<BinaryOperator> {
        match self {
            AssignmentOperator::Assign => None,
            AssignmentOperator::AddAssign => Some(BinaryOperator::Add),
            AssignmentOperator::SubAssign => Some(BinaryOperator::Sub),
            AssignmentOperator::MulAssign => Some(BinaryOperator::Mul),
            AssignmentOperator::DivAssign => Some(BinaryOperator::Div),
            AssignmentOperator::RemAssign => Some(BinaryOperator::Rem),
            AssignmentOperator::ExpAssign => Some(BinaryOperator::Exp),
            AssignmentOperator::ShlAssign => Some(BinaryOperator::Shl),
            AssignmentOperator::ShrAssign => Some(BinaryOperator::Shr),
            AssignmentOperator::UShrAssign => Some(BinaryOperator::UShr),
            AssignmentOperator::BitAndAssign => Some(BinaryOperator::BitAnd),
            AssignmentOperator::BitOrAssign => Some(BinaryOperator::BitOr),
            AssignmentOperator::BitXorAssign => Some(BinaryOperator::BitXor),
        }
    }
}
