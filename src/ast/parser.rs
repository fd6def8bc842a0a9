use crate::ast::{ASTNode, Operator, ParseError, UnaryOperator};
use log::debug;
use pest::error::{Error as PestError, InputLocation};
use pest::iterators::{Pair, Pairs};
use pest::Parser;
use pest_derive::Parser;

#[derive(Parser)]
#[grammar = "ast/expression.pest"]
pub struct ExpressionParser;

/// Bounds on untrusted input. Length and nesting are checked before the
/// grammar runs; tree depth while the tree is built, so evaluation never
/// recurses deeper than `max_ast_depth`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserLimits {
    pub max_expression_len: usize,
    pub max_nesting_depth: usize,
    pub max_ast_depth: usize,
}

impl Default for ParserLimits {
    fn default() -> Self {
        Self {
            max_expression_len: 4096,
            max_nesting_depth: 64,
            max_ast_depth: 256,
        }
    }
}

impl ExpressionParser {
    pub fn parse_expression(input: &str) -> Result<ASTNode, ParseError> {
        Self::parse_with_limits(input, &ParserLimits::default())
    }

    pub fn parse_with_limits(input: &str, limits: &ParserLimits) -> Result<ASTNode, ParseError> {
        debug!("Parsing expression: {}", input);
        if input.trim().is_empty() {
            return Err(ParseError::new(0, "empty expression"));
        }
        if input.len() > limits.max_expression_len {
            return Err(ParseError::new(
                limits.max_expression_len,
                format!(
                    "expression is longer than {} bytes",
                    limits.max_expression_len
                ),
            ));
        }
        check_nesting(input, limits.max_nesting_depth)?;

        let parse_result = ExpressionParser::parse(Rule::expression, input)
            .map_err(from_pest_error)?
            .next()
            .ok_or_else(|| ParseError::new(0, "empty expression"))?;

        let mut pairs = parse_result.into_inner();
        let builder = TreeBuilder {
            max_depth: limits.max_ast_depth,
        };
        let (ast, depth) = builder.build_expr(next_pair(&mut pairs, "expression")?)?;
        debug!("Parse result (depth {}): {:?}", depth, ast);
        Ok(ast)
    }
}

/// A node together with the depth of the tree below it.
type Built = (ASTNode, usize);

/// Walks pest pairs into an `ASTNode`. Operator chains are flat in the pest
/// output but nest in the tree, so depth is checked on every new node.
struct TreeBuilder {
    max_depth: usize,
}

impl TreeBuilder {
    fn check_depth(&self, depth: usize, position: usize) -> Result<usize, ParseError> {
        if depth > self.max_depth {
            return Err(ParseError::new(
                position,
                format!("expression tree is deeper than {} levels", self.max_depth),
            ));
        }
        Ok(depth)
    }

    fn build_expr(&self, pair: Pair<Rule>) -> Result<Built, ParseError> {
        let mut pairs = pair.into_inner();
        let (mut node, mut depth) = self.build_term(next_pair(&mut pairs, "term")?)?;

        while let Some(operator_pair) = pairs.next() {
            let position = operator_pair.as_span().start();
            let operator = match operator_pair.as_rule() {
                Rule::PLUS => Operator::Add,
                Rule::MINUS => Operator::Subtract,
                _ => return Err(unexpected(&operator_pair)),
            };

            let (right, right_depth) = self.build_term(next_pair(&mut pairs, "term")?)?;
            depth = self.check_depth(1 + depth.max(right_depth), position)?;
            node = ASTNode::BinaryOperation {
                left: Box::new(node),
                operator,
                right: Box::new(right),
            };
        }

        Ok((node, depth))
    }

    fn build_term(&self, pair: Pair<Rule>) -> Result<Built, ParseError> {
        let mut pairs = pair.into_inner();
        let (mut node, mut depth) = self.build_factor(next_pair(&mut pairs, "factor")?)?;

        while let Some(operator_pair) = pairs.next() {
            let position = operator_pair.as_span().start();
            let operator = match operator_pair.as_rule() {
                Rule::STAR => Operator::Multiply,
                Rule::SLASH => Operator::Divide,
                _ => return Err(unexpected(&operator_pair)),
            };

            let (right, right_depth) = self.build_factor(next_pair(&mut pairs, "factor")?)?;
            depth = self.check_depth(1 + depth.max(right_depth), position)?;
            node = ASTNode::BinaryOperation {
                left: Box::new(node),
                operator,
                right: Box::new(right),
            };
        }

        Ok((node, depth))
    }

    /// `a ** b ** c` groups as `a ** (b ** c)`.
    fn build_factor(&self, pair: Pair<Rule>) -> Result<Built, ParseError> {
        let mut operands = Vec::new();
        for operand in pair.into_inner() {
            match operand.as_rule() {
                Rule::POW => continue,
                Rule::unary => {
                    let position = operand.as_span().start();
                    operands.push((self.build_unary(operand)?, position));
                }
                _ => return Err(unexpected(&operand)),
            }
        }

        let mut operands = operands.into_iter().rev();
        let ((mut node, mut depth), _) = operands
            .next()
            .ok_or_else(|| ParseError::new(0, "expected operand"))?;
        for ((base, base_depth), position) in operands {
            depth = self.check_depth(1 + depth.max(base_depth), position)?;
            node = ASTNode::BinaryOperation {
                left: Box::new(base),
                operator: Operator::Power,
                right: Box::new(node),
            };
        }

        Ok((node, depth))
    }

    fn build_unary(&self, pair: Pair<Rule>) -> Result<Built, ParseError> {
        let mut pairs = pair.into_inner();
        let first = next_pair(&mut pairs, "operand")?;
        match first.as_rule() {
            Rule::MINUS | Rule::PLUS => {
                let position = first.as_span().start();
                let operator = UnaryOperator::try_from(first.as_str())
                    .map_err(|message| ParseError::new(position, message))?;
                let (operand, depth) = self.build_unary(next_pair(&mut pairs, "operand")?)?;
                let depth = self.check_depth(1 + depth, position)?;
                Ok((
                    ASTNode::UnaryOperation {
                        operator,
                        operand: Box::new(operand),
                    },
                    depth,
                ))
            }
            _ => self.build_atom(first),
        }
    }

    fn build_atom(&self, pair: Pair<Rule>) -> Result<Built, ParseError> {
        let position = pair.as_span().start();
        match pair.as_rule() {
            Rule::number => pair
                .as_str()
                .parse::<f64>()
                .map(|value| (ASTNode::Number(value), 1))
                .map_err(|_| malformed_number(position, pair.as_str())),
            Rule::malformed_number => Err(malformed_number(position, pair.as_str())),
            Rule::identifier => Ok((ASTNode::Identifier(build_identifier(pair)?), 1)),
            Rule::group => {
                let mut inner = pair.into_inner();
                let (expr, depth) = self.build_expr(next_pair(&mut inner, "expression")?)?;
                let depth = self.check_depth(1 + depth, position)?;
                Ok((ASTNode::Group(Box::new(expr)), depth))
            }
            Rule::function_call => self.build_function_call(pair),
            _ => {
                debug!("Unexpected rule in atom: {:?}", pair);
                Err(unexpected(&pair))
            }
        }
    }

    fn build_function_call(&self, pair: Pair<Rule>) -> Result<Built, ParseError> {
        let position = pair.as_span().start();
        let mut inner = pair.into_inner();
        let name = build_identifier(next_pair(&mut inner, "function name")?)?;

        let mut args = Vec::new();
        let mut depth = 0;
        for arg in inner {
            let (arg, arg_depth) = self.build_expr(arg)?;
            depth = depth.max(arg_depth);
            args.push(arg);
        }

        let depth = self.check_depth(1 + depth, position)?;
        Ok((ASTNode::FunctionCall { name, args }, depth))
    }
}

/// `math.sin` and `sin` name the same thing; only the last segment is kept.
fn build_identifier(pair: Pair<Rule>) -> Result<String, ParseError> {
    let start = pair.as_span().start();
    pair.into_inner()
        .find(|segment| segment.as_rule() == Rule::name)
        .map(|segment| segment.as_str().to_string())
        .ok_or_else(|| ParseError::new(start, "expected identifier"))
}

fn next_pair<'i>(pairs: &mut Pairs<'i, Rule>, what: &str) -> Result<Pair<'i, Rule>, ParseError> {
    pairs
        .next()
        .ok_or_else(|| ParseError::new(0, format!("expected {}", what)))
}

fn unexpected(pair: &Pair<Rule>) -> ParseError {
    ParseError::new(
        pair.as_span().start(),
        format!("unexpected token '{}'", pair.as_str()),
    )
}

fn malformed_number(position: usize, text: &str) -> ParseError {
    ParseError::new(position, format!("malformed number literal '{}'", text))
}

fn rule_label(rule: &Rule) -> String {
    match rule {
        Rule::EOI => "end of input",
        Rule::number | Rule::malformed_number => "number",
        Rule::identifier | Rule::name | Rule::namespace => "identifier",
        Rule::function_call => "function call",
        Rule::group => "'('",
        Rule::PLUS => "'+'",
        Rule::MINUS => "'-'",
        Rule::STAR => "'*'",
        Rule::SLASH => "'/'",
        Rule::POW => "'**'",
        Rule::expression | Rule::expr | Rule::term | Rule::factor | Rule::unary => "expression",
        _ => "token",
    }
    .to_string()
}

fn from_pest_error(err: PestError<Rule>) -> ParseError {
    let err = err.renamed_rules(rule_label);
    let position = match err.location {
        InputLocation::Pos(pos) => pos,
        InputLocation::Span((start, _)) => start,
    };
    ParseError::new(position, err.variant.message())
}

/// Rejects unbalanced parentheses and nesting beyond `max_depth` without
/// recursing. Nesting counts open parentheses plus the current run of
/// prefix signs (`- - -x`).
fn check_nesting(input: &str, max_depth: usize) -> Result<(), ParseError> {
    let mut open = Vec::new();
    let mut sign_run = 0usize;
    // whether the previous significant byte ends an operand
    let mut after_operand = false;

    for (position, byte) in input.bytes().enumerate() {
        match byte {
            b' ' | b'\t' | b'\r' | b'\n' => continue,
            b'(' => {
                open.push(position);
                sign_run = 0;
                after_operand = false;
            }
            b')' => {
                if open.pop().is_none() {
                    return Err(ParseError::new(position, "unmatched ')'"));
                }
                sign_run = 0;
                after_operand = true;
            }
            b'+' | b'-' if !after_operand => sign_run += 1,
            b'+' | b'-' | b'*' | b'/' | b',' => {
                sign_run = 0;
                after_operand = false;
            }
            _ => {
                sign_run = 0;
                after_operand = true;
            }
        }

        if open.len() + sign_run > max_depth {
            return Err(ParseError::new(
                position,
                format!("expression nests deeper than {} levels", max_depth),
            ));
        }
    }

    match open.last() {
        Some(&position) => Err(ParseError::new(position, "unclosed '('")),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ASTNode, Operator, UnaryOperator};

    fn ident(name: &str) -> Box<ASTNode> {
        Box::new(ASTNode::Identifier(name.to_string()))
    }

    fn num(value: f64) -> Box<ASTNode> {
        Box::new(ASTNode::Number(value))
    }

    #[test]
    fn test_simple_binary_expression() {
        let ast = ExpressionParser::parse_expression("a + 2").unwrap();
        let expected_ast = ASTNode::BinaryOperation {
            left: ident("a"),
            operator: Operator::Add,
            right: num(2.0),
        };
        assert_eq!(ast, expected_ast);
    }

    #[test]
    fn test_precedence() {
        let ast = ExpressionParser::parse_expression("a + b * x").unwrap();
        let expected_ast = ASTNode::BinaryOperation {
            left: ident("a"),
            operator: Operator::Add,
            right: Box::new(ASTNode::BinaryOperation {
                left: ident("b"),
                operator: Operator::Multiply,
                right: ident("x"),
            }),
        };
        assert_eq!(ast, expected_ast);
    }

    #[test]
    fn test_left_associative_subtraction() {
        let ast = ExpressionParser::parse_expression("x - 1 - 2").unwrap();
        let expected_ast = ASTNode::BinaryOperation {
            left: Box::new(ASTNode::BinaryOperation {
                left: ident("x"),
                operator: Operator::Subtract,
                right: num(1.0),
            }),
            operator: Operator::Subtract,
            right: num(2.0),
        };
        assert_eq!(ast, expected_ast);
    }

    #[test]
    fn test_power_is_right_associative() {
        let ast = ExpressionParser::parse_expression("2 ** 3 ** x").unwrap();
        let expected_ast = ASTNode::BinaryOperation {
            left: num(2.0),
            operator: Operator::Power,
            right: Box::new(ASTNode::BinaryOperation {
                left: num(3.0),
                operator: Operator::Power,
                right: ident("x"),
            }),
        };
        assert_eq!(ast, expected_ast);
    }

    #[test]
    fn test_unary_binds_tighter_than_power() {
        let ast = ExpressionParser::parse_expression("-x ** 2").unwrap();
        let expected_ast = ASTNode::BinaryOperation {
            left: Box::new(ASTNode::UnaryOperation {
                operator: UnaryOperator::Negate,
                operand: ident("x"),
            }),
            operator: Operator::Power,
            right: num(2.0),
        };
        assert_eq!(ast, expected_ast);

        let ast = ExpressionParser::parse_expression("2 ** -1").unwrap();
        assert!(matches!(
            ast,
            ASTNode::BinaryOperation {
                operator: Operator::Power,
                ..
            }
        ));
    }

    #[test]
    fn test_function_call() {
        let ast = ExpressionParser::parse_expression("pow(x, 2)").unwrap();
        let expected_ast = ASTNode::FunctionCall {
            name: "pow".to_string(),
            args: vec![ASTNode::Identifier("x".to_string()), ASTNode::Number(2.0)],
        };
        assert_eq!(ast, expected_ast);
    }

    #[test]
    fn test_math_namespace_is_transparent() {
        let qualified = ExpressionParser::parse_expression("math.sin(x) * math.pi").unwrap();
        let bare = ExpressionParser::parse_expression("sin(x) * pi").unwrap();
        assert_eq!(qualified, bare);

        assert!(ExpressionParser::parse_expression("os.system(x)").is_err());
    }

    #[test]
    fn test_grouped_expression() {
        let ast = ExpressionParser::parse_expression("(x + 1) * 2").unwrap();
        let expected_ast = ASTNode::BinaryOperation {
            left: Box::new(ASTNode::Group(Box::new(ASTNode::BinaryOperation {
                left: ident("x"),
                operator: Operator::Add,
                right: num(1.0),
            }))),
            operator: Operator::Multiply,
            right: num(2.0),
        };
        assert_eq!(ast, expected_ast);
    }

    #[test]
    fn test_number_forms() {
        for (input, value) in [("3", 3.0), ("2.5", 2.5), (".5", 0.5), ("1.", 1.0), ("1e3", 1000.0), ("2.5E-1", 0.25)] {
            assert_eq!(
                ExpressionParser::parse_expression(input).unwrap(),
                ASTNode::Number(value),
                "{}",
                input
            );
        }
    }

    #[test]
    fn test_reparse_is_structurally_equal() {
        let input = "a * x**2 + b * x + c";
        assert_eq!(
            ExpressionParser::parse_expression(input).unwrap(),
            ExpressionParser::parse_expression(input).unwrap()
        );
    }

    #[test]
    fn test_empty_expression() {
        let err = ExpressionParser::parse_expression("   ").unwrap_err();
        assert_eq!(err.position, 0);
        assert_eq!(err.message, "empty expression");
    }

    #[test]
    fn test_dangling_operator() {
        let err = ExpressionParser::parse_expression("x +").unwrap_err();
        assert_eq!(err.position, 3);
    }

    #[test]
    fn test_trailing_tokens() {
        let err = ExpressionParser::parse_expression("x 2").unwrap_err();
        assert_eq!(err.position, 2);
    }

    #[test]
    fn test_unbalanced_parentheses() {
        let err = ExpressionParser::parse_expression("(x + 1").unwrap_err();
        assert_eq!(err.position, 0);
        assert_eq!(err.message, "unclosed '('");

        let err = ExpressionParser::parse_expression("x + 1)").unwrap_err();
        assert_eq!(err.position, 5);
        assert_eq!(err.message, "unmatched ')'");
    }

    #[test]
    fn test_malformed_numbers() {
        for input in ["1.5.2", "2x", "1e", "x + 3abc"] {
            let err = ExpressionParser::parse_expression(input).unwrap_err();
            assert!(
                err.message.starts_with("malformed number literal"),
                "{}: {}",
                input,
                err
            );
        }
    }

    #[test]
    fn test_unsupported_characters() {
        assert!(ExpressionParser::parse_expression("x @ 2").is_err());
        assert!(ExpressionParser::parse_expression("x % 2").is_err());
        assert!(ExpressionParser::parse_expression("x ^ 2").is_err());
        assert!(ExpressionParser::parse_expression("__import__('os')").is_err());
    }

    #[test]
    fn test_zero_argument_call_is_rejected() {
        assert!(ExpressionParser::parse_expression("pi()").is_err());
        assert!(ExpressionParser::parse_expression("pow(x,)").is_err());
    }

    #[test]
    fn test_excess_whitespace() {
        let ast = ExpressionParser::parse_expression("  (  x   +  10 )\n *\t2  ").unwrap();
        assert_eq!(ast, ExpressionParser::parse_expression("(x+10)*2").unwrap());
    }

    #[test]
    fn test_nesting_limit() {
        let limits = ParserLimits {
            max_nesting_depth: 8,
            ..ParserLimits::default()
        };
        let deep = format!("{}x{}", "(".repeat(9), ")".repeat(9));
        let err = ExpressionParser::parse_with_limits(&deep, &limits).unwrap_err();
        assert_eq!(err.position, 8);

        let signs = format!("{}x", "-".repeat(9));
        assert!(ExpressionParser::parse_with_limits(&signs, &limits).is_err());

        let shallow = format!("{}x{}", "(".repeat(8), ")".repeat(8));
        assert!(ExpressionParser::parse_with_limits(&shallow, &limits).is_ok());

        // binary minus does not count towards nesting
        let flat = vec!["x"; 40].join(" - ");
        assert!(ExpressionParser::parse_with_limits(&flat, &limits).is_ok());
    }

    #[test]
    fn test_length_limit() {
        let limits = ParserLimits {
            max_expression_len: 16,
            ..ParserLimits::default()
        };
        let long = vec!["x"; 20].join("+");
        let err = ExpressionParser::parse_with_limits(&long, &limits).unwrap_err();
        assert_eq!(err.position, 16);
    }

    #[test]
    fn test_large_expression() {
        let input = (0..50)
            .map(|i| format!("p{} * x ** {}", i, i))
            .collect::<Vec<_>>()
            .join(" + ");
        let ast = ExpressionParser::parse_expression(&input).unwrap();
        assert_eq!(ast.identifiers().len(), 51);
    }

    #[test]
    fn test_long_chain_is_refused_by_depth() {
        // 2048 operands is 4095 bytes, inside the default length limit
        let chain = vec!["x"; 2048].join("+");
        assert_eq!(chain.len(), 4095);
        let err = ExpressionParser::parse_expression(&chain).unwrap_err();
        assert!(err.message.contains("deeper than 256"), "{}", err);

        let power = vec!["x"; 1000].join("**");
        assert!(ExpressionParser::parse_expression(&power).is_err());

        let product = vec!["x"; 1000].join("*");
        assert!(ExpressionParser::parse_expression(&product).is_err());
    }

    #[test]
    fn test_depth_limit_boundary() {
        let limits = ParserLimits {
            max_ast_depth: 10,
            ..ParserLimits::default()
        };
        // n operands fold into a tree of depth n
        let fits = vec!["x"; 10].join(" + ");
        let ast = ExpressionParser::parse_with_limits(&fits, &limits).unwrap();
        assert_eq!(ast.depth(), 10);

        let too_deep = vec!["x"; 11].join(" + ");
        let err = ExpressionParser::parse_with_limits(&too_deep, &limits).unwrap_err();
        assert_eq!(err.message, "expression tree is deeper than 10 levels");

        let nested_calls = format!("{}x{}", "sin(".repeat(10), ")".repeat(10));
        assert!(ExpressionParser::parse_with_limits(&nested_calls, &limits).is_err());
    }
}
