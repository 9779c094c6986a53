//! CalcEngine - Expression evaluator for synthetic variables
//!
//! Single-pass recursive descent over the token stream; no syntax tree is
//! kept. Grammar, lowest precedence first:
//!
//! ```text
//! comparison := additive [ ( > | < | >= | <= | == | != ) additive ]
//! additive   := term { ( + | - ) term }
//! term       := factor { ( * | / ) factor }
//! factor     := ( + | - ) factor | number | "(" comparison ")"
//!             | identifier "(" [ arg { "," arg } ] ")" | identifier
//! ```
//!
//! Arguments that a function does not need (the untaken branch of `if`, the
//! tail of a decided `and`/`or`) are parsed with evaluation switched off:
//! syntax, function names, arity and window codes are checked, but no
//! variable lookup, arithmetic or store query happens.

use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::debug;

use crate::config::EngineConfig;
use crate::context::ExecutionContext;
use crate::decimal::{self, truth};
use crate::error::{CalcError, Result};
use crate::registry::{
    check_arity, Arg, ArgKind, ArgSource, Category, FunctionInfo, FunctionRegistry, Implementation,
    LazyFn, NumericFn, StatisticalFn,
};
use crate::stat_functions::Series;
use crate::store::TelemetryStore;
use crate::token::{tokenize, Token, TokenKind};
use crate::window::TimeWindow;

/// Names referenced by an expression, reported by [`CalcEngine::validate`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpressionInfo {
    /// Bare identifiers resolved against the variable bindings
    pub variables: BTreeSet<String>,
    /// Canonical names of called functions
    pub functions: BTreeSet<String>,
}

/// CalcEngine - evaluates expressions against variable bindings
///
/// The engine is stateless between calls. Cloning is cheap and clones share
/// the store and the function registry.
///
/// # Example
/// ```ignore
/// let engine = CalcEngine::new(Arc::new(MemoryTelemetryStore::new()));
/// let mut vars = HashMap::new();
/// vars.insert("voltage".to_string(), Decimal::from(220));
/// assert_eq!(engine.evaluate("(voltage - 210) > 5", &vars, None)?, Decimal::ONE);
/// ```
pub struct CalcEngine<S: TelemetryStore + ?Sized> {
    store: Arc<S>,
    registry: Arc<FunctionRegistry>,
    config: EngineConfig,
}

impl<S: TelemetryStore + ?Sized> Clone for CalcEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            registry: Arc::clone(&self.registry),
            config: self.config.clone(),
        }
    }
}

impl<S: TelemetryStore + ?Sized> CalcEngine<S> {
    /// Engine with the builtin registry and default configuration
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            registry: FunctionRegistry::global(),
            config: EngineConfig::default(),
        }
    }

    /// Engine with the builtin registry and a validated configuration
    pub fn with_config(store: Arc<S>, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            registry: FunctionRegistry::global(),
            config,
        })
    }

    /// Use a custom function catalog
    pub fn with_registry(mut self, registry: Arc<FunctionRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<FunctionRegistry> {
        &self.registry
    }

    /// Evaluate an expression
    ///
    /// `context` is required only when the expression calls a statistical
    /// function.
    pub fn evaluate(
        &self,
        expression: &str,
        variables: &HashMap<String, Decimal>,
        context: Option<&ExecutionContext>,
    ) -> Result<Decimal> {
        let result = self
            .run(expression, variables, context, true)
            .map(|(value, _)| value);
        if let Err(e) = &result {
            debug!(expression, error = %e, "Expression evaluation failed");
        }
        result
    }

    /// Check an expression without evaluating anything
    ///
    /// Catches syntax errors, unknown functions, arity mismatches and bad
    /// window codes. Variables are not required to be bound.
    pub fn validate(&self, expression: &str) -> Result<ExpressionInfo> {
        let no_bindings = HashMap::new();
        self.run(expression, &no_bindings, None, false)
            .map(|(_, info)| info)
    }

    /// Function metadata grouped by category
    pub fn list_functions(&self) -> BTreeMap<Category, Vec<FunctionInfo>> {
        self.registry.list_by_category()
    }

    fn run(
        &self,
        expression: &str,
        variables: &HashMap<String, Decimal>,
        context: Option<&ExecutionContext>,
        live: bool,
    ) -> Result<(Decimal, ExpressionInfo)> {
        if expression.len() > self.config.max_expression_length {
            return Err(CalcError::parse(format!(
                "expression is {} bytes long, the limit is {}",
                expression.len(),
                self.config.max_expression_length
            )));
        }
        if expression.trim().is_empty() {
            return Err(CalcError::parse("empty expression"));
        }

        let mut evaluator = Evaluator {
            tokens: tokenize(expression)?,
            pos: 0,
            variables,
            context,
            store: self.store.as_ref(),
            registry: self.registry.as_ref(),
            precision: self.config.precision,
            max_depth: self.config.max_depth,
            depth: 0,
            live,
            info: ExpressionInfo::default(),
        };
        let value = evaluator.comparison()?;
        evaluator.expect_end()?;
        Ok((value, evaluator.info))
    }
}

/// State of one evaluation call
struct Evaluator<'a, S: TelemetryStore + ?Sized> {
    tokens: Vec<Token>,
    pos: usize,
    variables: &'a HashMap<String, Decimal>,
    context: Option<&'a ExecutionContext>,
    store: &'a S,
    registry: &'a FunctionRegistry,
    precision: u32,
    max_depth: usize,
    depth: usize,
    /// When false, parse only
    live: bool,
    info: ExpressionInfo,
}

impl<'a, S: TelemetryStore + ?Sized> Evaluator<'a, S> {
    // === Token cursor ===

    fn peek(&self) -> &Token {
        // tokenize always ends with Eof
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: TokenKind) -> Result<()> {
        let token = self.advance();
        if token.kind == expected {
            Ok(())
        } else {
            Err(CalcError::parse(format!(
                "expected {} but found {} at position {}",
                expected, token.kind, token.pos
            )))
        }
    }

    fn expect_end(&self) -> Result<()> {
        let token = self.peek();
        match token.kind {
            TokenKind::Eof => Ok(()),
            TokenKind::RParen => Err(CalcError::parse(format!(
                "unbalanced ')' at position {}",
                token.pos
            ))),
            _ => Err(CalcError::parse(format!(
                "unexpected {} at position {}",
                token.kind, token.pos
            ))),
        }
    }

    // === Grammar ===

    fn comparison(&mut self) -> Result<Decimal> {
        let lhs = self.additive()?;
        let op = self.peek_kind().clone();
        if !is_comparison(&op) {
            return Ok(lhs);
        }
        self.advance();
        let rhs = self.additive()?;

        let next = self.peek();
        if is_comparison(&next.kind) {
            return Err(CalcError::parse(format!(
                "comparisons cannot be chained ({} at position {})",
                next.kind, next.pos
            )));
        }
        if !self.live {
            return Ok(Decimal::ZERO);
        }

        Ok(truth(match op {
            TokenKind::Gt => lhs > rhs,
            TokenKind::Lt => lhs < rhs,
            TokenKind::Ge => lhs >= rhs,
            TokenKind::Le => lhs <= rhs,
            TokenKind::Eq => lhs == rhs,
            _ => lhs != rhs,
        }))
    }

    fn additive(&mut self) -> Result<Decimal> {
        let mut value = self.term()?;
        loop {
            let op = self.peek_kind().clone();
            if !matches!(op, TokenKind::Plus | TokenKind::Minus) {
                return Ok(value);
            }
            self.advance();
            let rhs = self.term()?;
            if self.live {
                value = match op {
                    TokenKind::Plus => decimal::add(value, rhs)?,
                    _ => decimal::sub(value, rhs)?,
                };
            }
        }
    }

    fn term(&mut self) -> Result<Decimal> {
        let mut value = self.factor()?;
        loop {
            let op = self.peek_kind().clone();
            if !matches!(op, TokenKind::Star | TokenKind::Slash) {
                return Ok(value);
            }
            self.advance();
            let rhs = self.factor()?;
            if self.live {
                value = match op {
                    TokenKind::Star => decimal::mul(value, rhs)?,
                    _ => decimal::div(value, rhs, self.precision)?,
                };
            }
        }
    }

    fn factor(&mut self) -> Result<Decimal> {
        self.depth += 1;
        let result = if self.depth > self.max_depth {
            Err(CalcError::parse(format!(
                "expression nesting exceeds the maximum depth of {}",
                self.max_depth
            )))
        } else {
            self.primary()
        };
        self.depth -= 1;
        result
    }

    fn primary(&mut self) -> Result<Decimal> {
        let token = self.advance();
        match token.kind {
            TokenKind::Plus => self.factor(),
            TokenKind::Minus => {
                let value = self.factor()?;
                Ok(if self.live { -value } else { Decimal::ZERO })
            },
            TokenKind::Number(value) => Ok(if self.live { value } else { Decimal::ZERO }),
            TokenKind::LParen => {
                let value = self.comparison()?;
                match self.peek_kind() {
                    TokenKind::RParen => {
                        self.advance();
                        Ok(value)
                    },
                    _ => Err(CalcError::parse(format!(
                        "unbalanced '(' at position {}",
                        token.pos
                    ))),
                }
            },
            // Only an identifier directly followed by '(' is a call
            TokenKind::Ident(name) => {
                if *self.peek_kind() == TokenKind::LParen {
                    self.call(&name, token.pos)
                } else {
                    self.variable(name)
                }
            },
            TokenKind::Str(literal) => Err(CalcError::parse(format!(
                "string \"{}\" at position {} is only allowed as a statistical function argument",
                literal, token.pos
            ))),
            other => Err(CalcError::parse(format!(
                "unexpected {} at position {}",
                other, token.pos
            ))),
        }
    }

    fn variable(&mut self, name: String) -> Result<Decimal> {
        if let Some(value) = self.variables.get(&name) {
            let value = *value;
            self.info.variables.insert(name);
            return Ok(if self.live { value } else { Decimal::ZERO });
        }
        if self.registry.contains(&name) {
            return Err(CalcError::parse(format!(
                "'{}' is a function; call it as {}(...)",
                name, name
            )));
        }
        if self.live {
            return Err(CalcError::unknown_identifier(name));
        }
        self.info.variables.insert(name);
        Ok(Decimal::ZERO)
    }

    // === Function calls ===

    fn call(&mut self, name: &str, pos: usize) -> Result<Decimal> {
        let registry = self.registry;
        let entry = registry
            .lookup(name)
            .ok_or_else(|| CalcError::unknown_function(name))?;
        self.info.functions.insert(entry.name.clone());

        self.expect(TokenKind::LParen)?;
        let count = self.count_arguments(&entry.name, pos)?;
        check_arity(entry, count)?;

        match entry.implementation {
            Implementation::Numeric { func, .. } => self.call_numeric(func, count),
            Implementation::Lazy { func, .. } => self.call_lazy(func, count),
            Implementation::Statistical { signature, func } => {
                self.call_statistical(&entry.name, signature, func)
            },
        }
    }

    /// Count the top-level arguments between the current '(' and its match.
    /// An empty slot before, between or after commas is a parse error.
    fn count_arguments(&self, name: &str, pos: usize) -> Result<usize> {
        let mut nesting = 0usize;
        let mut count = 0usize;
        let mut expecting_argument = true;
        let empty_argument = || {
            CalcError::parse(format!(
                "empty argument in call to {} at position {}",
                name, pos
            ))
        };
        for token in &self.tokens[self.pos..] {
            if nesting == 0 {
                match token.kind {
                    TokenKind::RParen if expecting_argument && count > 0 => {
                        return Err(empty_argument())
                    },
                    TokenKind::RParen => return Ok(count),
                    TokenKind::Comma if expecting_argument => return Err(empty_argument()),
                    TokenKind::Comma => {
                        expecting_argument = true;
                        continue;
                    },
                    TokenKind::Eof => break,
                    _ => {},
                }
            }
            match token.kind {
                TokenKind::LParen => nesting += 1,
                TokenKind::RParen => nesting -= 1,
                TokenKind::Eof => break,
                _ => {},
            }
            if expecting_argument {
                count += 1;
                expecting_argument = false;
            }
        }
        Err(CalcError::parse(format!(
            "unbalanced '(' in call to {} at position {}",
            name, pos
        )))
    }

    fn separator(&mut self, index: usize) -> Result<()> {
        if index > 0 {
            self.expect(TokenKind::Comma)?;
        }
        Ok(())
    }

    fn call_numeric(&mut self, func: NumericFn, count: usize) -> Result<Decimal> {
        let mut args = Vec::with_capacity(count);
        for index in 0..count {
            self.separator(index)?;
            args.push(self.comparison()?);
        }
        self.expect(TokenKind::RParen)?;

        if self.live {
            func(&args)
        } else {
            Ok(Decimal::ZERO)
        }
    }

    fn call_lazy(&mut self, func: LazyFn, count: usize) -> Result<Decimal> {
        let value = if self.live {
            let mut args = LazyArgs {
                evaluator: &mut *self,
                total: count,
                consumed: 0,
            };
            let value = func(&mut args)?;
            while args.remaining() > 0 {
                args.skip_next()?;
            }
            value
        } else {
            for index in 0..count {
                self.separator(index)?;
                self.comparison()?;
            }
            Decimal::ZERO
        };
        self.expect(TokenKind::RParen)?;
        Ok(value)
    }

    fn call_statistical(
        &mut self,
        name: &str,
        signature: &[ArgKind],
        func: StatisticalFn,
    ) -> Result<Decimal> {
        let mut args = Vec::with_capacity(signature.len());
        for (index, kind) in signature.iter().enumerate() {
            self.separator(index)?;
            args.push(match kind {
                ArgKind::Literal => Arg::Literal(self.literal(name, index)?),
                ArgKind::Number => Arg::Number(self.comparison()?),
            });
        }
        self.expect(TokenKind::RParen)?;

        let mut literals = args.iter().filter_map(Arg::as_literal);
        let (variable, window) = match (literals.next(), literals.next()) {
            (Some(variable), Some(window)) => (variable, TimeWindow::from_code(window)?),
            _ => {
                return Err(CalcError::parse(format!(
                    "{}: expected a variable name and a time window",
                    name
                )))
            },
        };
        let numbers: Vec<Decimal> = args.iter().filter_map(Arg::as_number).collect();
        if !self.live {
            return Ok(Decimal::ZERO);
        }

        let context = self
            .context
            .ok_or_else(|| CalcError::missing_context(name))?;
        let end = context.reference_timestamp();
        let start = window.window_start(end);
        let samples = self
            .store
            .fetch_window(context.device_id(), variable, start, end)?;
        debug!(
            device = context.device_id(),
            variable,
            window = %window,
            samples = samples.len(),
            "Fetched window for {}",
            name
        );

        func(&Series::new(&samples, window, self.precision), &numbers)
    }

    fn literal(&mut self, name: &str, index: usize) -> Result<String> {
        let token = self.advance();
        match token.kind {
            TokenKind::Str(value) => Ok(value),
            other => Err(CalcError::parse(format!(
                "{}: argument {} must be a quoted string, found {} at position {}",
                name,
                index + 1,
                other,
                token.pos
            ))),
        }
    }
}

fn is_comparison(kind: &TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Gt
            | TokenKind::Lt
            | TokenKind::Ge
            | TokenKind::Le
            | TokenKind::Eq
            | TokenKind::Ne
    )
}

/// Arguments of a lazy call, parsed on demand from the live token stream
struct LazyArgs<'e, 'a, S: TelemetryStore + ?Sized> {
    evaluator: &'e mut Evaluator<'a, S>,
    total: usize,
    consumed: usize,
}

impl<S: TelemetryStore + ?Sized> LazyArgs<'_, '_, S> {
    fn begin_next(&mut self) -> Result<()> {
        if self.consumed >= self.total {
            return Err(CalcError::arity("argument list", self.total, self.consumed + 1));
        }
        self.evaluator.separator(self.consumed)?;
        self.consumed += 1;
        Ok(())
    }
}

impl<S: TelemetryStore + ?Sized> ArgSource for LazyArgs<'_, '_, S> {
    fn remaining(&self) -> usize {
        self.total - self.consumed
    }

    fn next_value(&mut self) -> Result<Decimal> {
        self.begin_next()?;
        self.evaluator.comparison()
    }

    fn skip_next(&mut self) -> Result<()> {
        self.begin_next()?;
        let live = std::mem::replace(&mut self.evaluator.live, false);
        let result = self.evaluator.comparison();
        self.evaluator.live = live;
        result.map(|_| ())
    }
}
