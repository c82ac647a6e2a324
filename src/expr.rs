use crate::token::Token;

/// Stable identity for variable-referencing nodes.  The parser hands these
/// out from a process-wide counter; the interpreter keys its side table of
/// binding distances by them, so resolving the same tree twice produces the
/// same table.
pub type ExprId = usize;

#[derive(Debug)]
pub enum Expr {
    /// Number, string, `true`, `false`, or `nil` literal; the payload rides
    /// on the token.
    Literal(Token),

    /// Parenthesized expression.
    Grouping(Box<Expr>),

    Unary {
        operator: Token,
        right: Box<Expr>,
    },

    Binary {
        left: Box<Expr>,
        operator: Token,
        right: Box<Expr>,
    },

    /// `and` / `or`.  Kept apart from `Binary` because evaluation
    /// short-circuits and yields the deciding operand itself.
    Logical {
        left: Box<Expr>,
        operator: Token,
        right: Box<Expr>,
    },

    Variable {
        id: ExprId,
        name: Token,
    },

    Assign {
        id: ExprId,
        name: Token,
        value: Box<Expr>,
    },

    Call {
        callee: Box<Expr>,
        /// Closing parenthesis, kept for runtime error locations.
        paren: Token,
        arguments: Vec<Expr>,
    },
}
