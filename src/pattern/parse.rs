//! Grammar for the pattern language.
//!
//! ```text
//! pattern        := cond-list
//! cond-list      := and-group ('|' cond-list)?
//! and-group      := atom+                          -- implicit AND
//! atom           := '(' cond-list ')'
//!                 | '!' atom
//!                 | '?' func-matcher
//!                 | '~' short-matcher
//!                 | bare-string
//! func-matcher   := '=' var-name
//!                 | 'for' var-name ':' cond-list
//!                 | (var-name ':')? name ('(' args ')')?
//! ```
//!
//! Arguments to a `?function`-style matcher are parsed according to the
//! matcher's declared arity: since arbitrary strings without
//! metacharacters are legal condition values, the argument type cannot be
//! inferred from the text alone.

use crate::catalog::{Catalog, DepType, Priority};
use crate::pattern::error::{CompileError, ErrorKind};
use crate::pattern::matcher::{ActionKind, Matcher, StrMatcher};
use crate::pattern::scan::Cursor;

/// Context for a `parse_pattern` call.
///
/// `terminators` are caller-supplied stop strings, for embedding a pattern
/// inside a larger lexical context. `catalog` is only consulted to
/// recognize localized priority names; `None` restricts `?priority` to the
/// canonical English names.
#[derive(Clone, Copy)]
pub struct ParseOptions<'a> {
    pub terminators: &'a [&'a str],
    /// A bare string searches descriptions as well as names.
    pub search_descriptions: bool,
    /// Log compile errors and return `Ok(None)` instead of `Err`.
    pub flag_errors: bool,
    /// Reject input left over after the pattern.
    pub require_full_parse: bool,
    pub catalog: Option<&'a dyn Catalog>,
}

impl<'a> ParseOptions<'a> {
    pub fn new() -> ParseOptions<'a> {
        ParseOptions {
            terminators: &[],
            search_descriptions: false,
            flag_errors: false,
            require_full_parse: true,
            catalog: None,
        }
    }
}

impl Default for ParseOptions<'_> {
    fn default() -> Self {
        ParseOptions::new()
    }
}

/// Compile a pattern string into a matcher tree.
///
/// Blank input yields `Ok(None)` (no matcher), not an error. With
/// `flag_errors` set, compile errors are logged and swallowed to
/// `Ok(None)`; otherwise they are returned.
pub fn parse_pattern(input: &str, options: &ParseOptions) -> Result<Option<Matcher>, CompileError> {
    let mut cur = Cursor::new(input);

    while cur.peek().is_some_and(char::is_whitespace) && !cur.at_terminator(options.terminators) {
        cur.bump();
    }
    if cur.at_end() {
        return Ok(None);
    }

    let result = parse_full(&mut cur, options);
    match result {
        Ok(matcher) => Ok(Some(matcher)),
        Err(err) if options.flag_errors => {
            tracing::error!(kind = ?err.kind, position = err.position, "{}", err.message);
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

fn parse_full(cur: &mut Cursor, options: &ParseOptions) -> Result<Matcher, CompileError> {
    let matcher = parse_condition_list(
        cur,
        options.terminators,
        options,
        true,
        &NameContext::default(),
    )?;
    cur.skip_whitespace();
    if options.require_full_parse && !cur.at_end() {
        return Err(CompileError::new(
            ErrorKind::TrailingGarbage,
            cur.pos(),
            format!("Unexpected '{}'", cur.peek().unwrap()),
        ));
    }
    Ok(matcher)
}

/// The compile-time environment: variable names, bottom of the stack
/// first, so a name's position is its De-Bruijn index. Lookup scans from
/// the top so rebinding a name shadows the outer binding.
#[derive(Clone, Default)]
struct NameContext {
    names: Vec<String>,
}

impl NameContext {
    fn lookup(&self, name: &str) -> Option<usize> {
        self.names.iter().rposition(|n| n == name)
    }

    fn bind(&self, name: String) -> NameContext {
        let mut extended = self.clone();
        extended.names.push(name);
        extended
    }
}

fn parse_condition_list(
    cur: &mut Cursor,
    terminators: &[&str],
    opts: &ParseOptions,
    wide_context: bool,
    env: &NameContext,
) -> Result<Matcher, CompileError> {
    let group = parse_and_group(cur, terminators, opts, wide_context, env)?;
    cur.skip_whitespace();

    if !cur.at_end() && cur.peek() != Some(')') && !cur.at_terminator(terminators) {
        if cur.peek() == Some('|') {
            cur.bump();
            let rest = parse_condition_list(cur, terminators, opts, wide_context, env)?;
            return Ok(Matcher::Or(Box::new(group), Box::new(rest)));
        }
        return Err(CompileError::new(
            ErrorKind::BadSyntax,
            cur.pos(),
            "Badly formed expression",
        ));
    }

    Ok(group)
}

fn parse_and_group(
    cur: &mut Cursor,
    terminators: &[&str],
    opts: &ParseOptions,
    wide_context: bool,
    env: &NameContext,
) -> Result<Matcher, CompileError> {
    let mut group: Option<Matcher> = None;
    cur.skip_whitespace();

    while !cur.at_end()
        && cur.peek() != Some('|')
        && cur.peek() != Some(')')
        && !cur.at_terminator(terminators)
    {
        let atom = parse_atom(cur, terminators, opts, wide_context, env)?;
        group = Some(match group {
            None => atom,
            Some(left) => Matcher::And(Box::new(left), Box::new(atom)),
        });
        cur.skip_whitespace();
    }

    group.ok_or_else(|| {
        CompileError::new(
            ErrorKind::EmptyExpression,
            cur.pos(),
            "Unexpected empty expression",
        )
    })
}

fn parse_atom(
    cur: &mut Cursor,
    terminators: &[&str],
    opts: &ParseOptions,
    wide_context: bool,
    env: &NameContext,
) -> Result<Matcher, CompileError> {
    cur.skip_whitespace();

    if cur.at_end()
        || cur.peek() == Some('|')
        || cur.peek() == Some(')')
        || cur.at_terminator(terminators)
    {
        return Err(CompileError::new(
            ErrorKind::EmptyExpression,
            cur.pos(),
            "Can't search for \"\"",
        ));
    }

    match cur.peek().unwrap() {
        '!' => {
            cur.bump();
            let inner = parse_atom(cur, terminators, opts, wide_context, env)?;
            Ok(Matcher::Not(Box::new(inner)))
        }
        '(' => {
            // Recur into the list; the extra terminators are treated
            // normally until the closing paren.
            cur.bump();
            let list = parse_condition_list(cur, &[], opts, wide_context, env)?;
            if cur.peek() == Some(')') {
                cur.bump();
                Ok(list)
            } else {
                Err(CompileError::new(
                    ErrorKind::UnmatchedParen,
                    cur.pos(),
                    "Unmatched '('",
                ))
            }
        }
        '?' => {
            cur.bump();
            parse_function_tail(cur, terminators, opts, wide_context, env)
        }
        '~' => {
            cur.bump();
            parse_short_form(cur, terminators, opts, env)
        }
        _ => {
            let pos = cur.pos();
            let substr = cur.parse_substr(terminators, true)?;
            bare_string_matcher(&substr, pos, opts)
        }
    }
}

/// A bare string matches the package name; with `search_descriptions` it
/// matches the description as well.
fn bare_string_matcher(
    substr: &str,
    pos: usize,
    opts: &ParseOptions,
) -> Result<Matcher, CompileError> {
    let name = Matcher::Name(str_matcher(substr, pos)?);
    if opts.search_descriptions {
        let desc = Matcher::Description(str_matcher(substr, pos)?);
        Ok(Matcher::Or(Box::new(name), Box::new(desc)))
    } else {
        Ok(name)
    }
}

fn str_matcher(pattern: &str, pos: usize) -> Result<StrMatcher, CompileError> {
    StrMatcher::new(pattern).map_err(|e| {
        CompileError::new(
            ErrorKind::BadRegex,
            pos,
            format!("Regex compilation error: {e}"),
        )
    })
}

// ---------- Function-style matchers ----------

fn parse_function_tail(
    cur: &mut Cursor,
    terminators: &[&str],
    opts: &ParseOptions,
    wide_context: bool,
    env: &NameContext,
) -> Result<Matcher, CompileError> {
    if cur.peek() == Some('=') {
        cur.bump();
        cur.skip_whitespace();
        let pos = cur.pos();
        let variable = scan_variable_name(cur, terminators);
        if variable.is_empty() {
            return Err(CompileError::new(
                ErrorKind::BadSyntax,
                pos,
                "Unexpected end of pattern following ?= (expected a variable name)",
            ));
        }
        return Ok(Matcher::Equal(lookup_variable(&variable, env, pos)?));
    }

    // The name runs to the next metacharacter or whitespace; a ':' inside
    // it splits off a bound-variable prefix.
    cur.skip_whitespace();
    let name_pos = cur.pos();
    let mut raw_name = String::new();
    let mut name = String::new();
    let mut bound_variable = String::new();

    while let Some(c) = cur.peek() {
        if matches!(c, '(' | '!' | '|' | ')' | '?' | '~')
            || c.is_whitespace()
            || cur.at_terminator(terminators)
        {
            break;
        }
        if c == ':' {
            if !bound_variable.is_empty() {
                return Err(CompileError::new(
                    ErrorKind::DuplicateBinding,
                    cur.pos(),
                    format!("Unexpected ':' following \"?{bound_variable}:{raw_name}\""),
                ));
            }
            bound_variable = raw_name.to_lowercase();
            raw_name.clear();
            name.clear();
        } else {
            raw_name.push(c);
            name.push(c.to_ascii_lowercase());
        }
        cur.bump();
    }

    let matcher = parse_matcher_args(&name, name_pos, cur, terminators, opts, wide_context, env)?;

    if bound_variable.is_empty() {
        Ok(matcher)
    } else {
        Ok(Matcher::Bind {
            pattern: Box::new(matcher),
            variable: lookup_variable(&bound_variable, env, name_pos)?,
        })
    }
}

fn scan_variable_name(cur: &mut Cursor, terminators: &[&str]) -> String {
    let mut name = String::new();
    while let Some(c) = cur.peek() {
        if matches!(c, '(' | '!' | '|' | ')' | '?' | '~' | ':')
            || c.is_whitespace()
            || cur.at_terminator(terminators)
        {
            break;
        }
        name.push(c);
        cur.bump();
    }
    name
}

/// Variables are case-insensitive and stored lower-cased.
fn lookup_variable(name: &str, env: &NameContext, pos: usize) -> Result<usize, CompileError> {
    env.lookup(&name.to_lowercase()).ok_or_else(|| {
        CompileError::new(
            ErrorKind::UnknownVariable,
            pos,
            format!("Unknown variable \"{name}\""),
        )
    })
}

fn parse_matcher_args(
    name: &str,
    name_pos: usize,
    cur: &mut Cursor,
    terminators: &[&str],
    opts: &ParseOptions,
    wide_context: bool,
    env: &NameContext,
) -> Result<Matcher, CompileError> {
    if let Some(dep) = parse_dep_style(name, name_pos, cur, terminators, opts, env)? {
        return Ok(dep);
    }

    match name {
        "action" => {
            let pos = cur.pos();
            make_action_matcher(&parse_string_args(cur)?, pos)
        }
        "all-versions" => {
            require_wide_context(wide_context, name, name_pos)?;
            let inner = parse_matcher_paren_args(cur, terminators, opts, false, env)?;
            Ok(Matcher::AllVersions(Box::new(inner)))
        }
        "and" => {
            let (a, b) = parse_binary_args(cur, terminators, opts, wide_context, env)?;
            Ok(Matcher::And(Box::new(a), Box::new(b)))
        }
        "any-version" => {
            require_wide_context(wide_context, name, name_pos)?;
            let inner = parse_matcher_paren_args(cur, terminators, opts, false, env)?;
            Ok(Matcher::AnyVersion(Box::new(inner)))
        }
        "archive" => {
            let pos = cur.pos();
            Ok(Matcher::Archive(str_matcher(&parse_string_args(cur)?, pos)?))
        }
        "automatic" => Ok(Matcher::Automatic),
        "bind" => {
            cur.skip_whitespace();
            cur.expect('(')?;
            let var_pos = cur.pos();
            let variable = cur.parse_substr(&[")", ","], true)?;
            let index = lookup_variable(&variable, env, var_pos)?;
            cur.expect(',')?;
            cur.skip_whitespace();
            let body = parse_condition_list(cur, &[")"], opts, wide_context, env)?;
            cur.skip_whitespace();
            cur.expect(')')?;
            Ok(Matcher::Bind {
                pattern: Box::new(body),
                variable: index,
            })
        }
        "broken" => Ok(Matcher::Broken),
        "config-files" => Ok(Matcher::ConfigFiles),
        "description" => {
            let pos = cur.pos();
            Ok(Matcher::Description(str_matcher(
                &parse_string_args(cur)?,
                pos,
            )?))
        }
        "essential" => Ok(Matcher::Essential),
        "false" => Ok(Matcher::False),
        "for" => parse_for_tail(cur, terminators, opts, wide_context, env),
        "garbage" => Ok(Matcher::Garbage),
        "installed" => Ok(Matcher::Installed),
        "maintainer" => {
            let pos = cur.pos();
            Ok(Matcher::Maintainer(str_matcher(
                &parse_string_args(cur)?,
                pos,
            )?))
        }
        "name" => {
            let pos = cur.pos();
            Ok(Matcher::Name(str_matcher(&parse_string_args(cur)?, pos)?))
        }
        "narrow" => {
            let (filter, pattern) = parse_binary_args(cur, terminators, opts, false, env)?;
            Ok(Matcher::Narrow {
                filter: Box::new(filter),
                pattern: Box::new(pattern),
            })
        }
        "new" => Ok(Matcher::New),
        "not" => {
            let inner = parse_matcher_paren_args(cur, terminators, opts, wide_context, env)?;
            Ok(Matcher::Not(Box::new(inner)))
        }
        "obsolete" => Ok(Matcher::Obsolete),
        "or" => {
            let (a, b) = parse_binary_args(cur, terminators, opts, wide_context, env)?;
            Ok(Matcher::Or(Box::new(a), Box::new(b)))
        }
        "origin" => {
            let pos = cur.pos();
            Ok(Matcher::Origin(str_matcher(&parse_string_args(cur)?, pos)?))
        }
        "priority" => {
            let pos = cur.pos();
            Ok(Matcher::Priority(parse_priority(
                &parse_string_args(cur)?,
                opts,
                pos,
            )?))
        }
        "provides" => {
            let inner = parse_matcher_paren_args(cur, terminators, opts, false, env)?;
            Ok(Matcher::Provides(Box::new(inner)))
        }
        "section" => {
            let pos = cur.pos();
            Ok(Matcher::Section(str_matcher(&parse_string_args(cur)?, pos)?))
        }
        "source-package" => {
            let pos = cur.pos();
            Ok(Matcher::SourcePackage(str_matcher(
                &parse_string_args(cur)?,
                pos,
            )?))
        }
        "source-version" => {
            let pos = cur.pos();
            Ok(Matcher::SourceVersion(str_matcher(
                &parse_string_args(cur)?,
                pos,
            )?))
        }
        "tag" => {
            let pos = cur.pos();
            Ok(Matcher::Tag(str_matcher(&parse_string_args(cur)?, pos)?))
        }
        "task" => {
            let pos = cur.pos();
            Ok(Matcher::Task(str_matcher(&parse_string_args(cur)?, pos)?))
        }
        "true" => Ok(Matcher::True),
        "upgradable" => Ok(Matcher::Upgradable),
        "user-tag" => {
            let pos = cur.pos();
            Ok(Matcher::UserTag(str_matcher(&parse_string_args(cur)?, pos)?))
        }
        "version" => {
            let pos = cur.pos();
            version_matcher(&parse_string_args(cur)?, pos)
        }
        "virtual" => Ok(Matcher::Virtual),
        "widen" => {
            let inner = parse_matcher_paren_args(cur, terminators, opts, true, env)?;
            Ok(Matcher::Widen(Box::new(inner)))
        }
        _ => Err(CompileError::new(
            ErrorKind::UnknownMatcher,
            name_pos,
            format!("Unknown matcher type: \"{name}\""),
        )),
    }
}

/// Handle `?TYPE(term)`, `?broken-TYPE`, `?broken-TYPE(term)`,
/// `?reverse-TYPE(term)`, the doubly-prefixed forms, and
/// `?reverse-provides(term)`. Returns `None` when the name carries no
/// dependency prefix or type, so the caller can try the plain matchers.
fn parse_dep_style(
    name: &str,
    name_pos: usize,
    cur: &mut Cursor,
    terminators: &[&str],
    opts: &ParseOptions,
    env: &NameContext,
) -> Result<Option<Matcher>, CompileError> {
    let mut broken = false;
    let mut reverse = false;
    let mut suffix = name;

    if let Some(rest) = suffix.strip_prefix("broken-") {
        broken = true;
        suffix = rest;
        if let Some(rest) = suffix.strip_prefix("reverse-") {
            reverse = true;
            suffix = rest;
        }
    } else if let Some(rest) = suffix.strip_prefix("reverse-") {
        reverse = true;
        suffix = rest;
        if let Some(rest) = suffix.strip_prefix("broken-") {
            broken = true;
            suffix = rest;
        }
    }

    cur.skip_whitespace();

    let Some(dep_type) = DepType::parse(suffix) else {
        if reverse && suffix == "provides" {
            // Provides edges carry no install state, so there is nothing
            // for the broken flag to select on.
            if broken {
                tracing::warn!("ignoring the broken flag on reverse-provides");
            }
            let inner = parse_matcher_paren_args(cur, terminators, opts, false, env)?;
            return Ok(Some(Matcher::ReverseProvides(Box::new(inner))));
        }
        if broken || reverse {
            return Err(CompileError::new(
                ErrorKind::UnknownDepType,
                name_pos,
                format!("Unknown dependency type: {suffix}"),
            ));
        }
        return Ok(None);
    };

    if reverse {
        let inner = parse_matcher_paren_args(cur, terminators, opts, false, env)?;
        return Ok(Some(Matcher::RevDepends {
            dep_type,
            pattern: Box::new(inner),
            broken_only: broken,
        }));
    }

    if broken {
        // `?broken-TYPE` with no argument selects by brokenness alone.
        return match parse_optional_matcher_args(cur, terminators, opts, env)? {
            Some(inner) => Ok(Some(Matcher::Depends {
                dep_type,
                pattern: Box::new(inner),
                broken_only: true,
            })),
            None => Ok(Some(Matcher::BrokenDep(dep_type))),
        };
    }

    let inner = parse_matcher_paren_args(cur, terminators, opts, false, env)?;
    Ok(Some(Matcher::Depends {
        dep_type,
        pattern: Box::new(inner),
        broken_only: false,
    }))
}

fn require_wide_context(
    wide_context: bool,
    name: &str,
    pos: usize,
) -> Result<(), CompileError> {
    if wide_context {
        Ok(())
    } else {
        Err(CompileError::new(
            ErrorKind::NotWideContext,
            pos,
            format!(
                "The ?{name} matcher must be used in a \"wide\" context \
                 (a top-level context, or a context enclosed by ?widen)"
            ),
        ))
    }
}

/// `?for <variable>: CONDITION-LIST`, with `?for` already consumed.
fn parse_for_tail(
    cur: &mut Cursor,
    terminators: &[&str],
    opts: &ParseOptions,
    wide_context: bool,
    env: &NameContext,
) -> Result<Matcher, CompileError> {
    cur.skip_whitespace();
    let variable = scan_variable_name(cur, terminators);
    cur.skip_whitespace();

    match cur.peek() {
        None => {
            return Err(CompileError::new(
                ErrorKind::BadSyntax,
                cur.pos(),
                format!(
                    "Unexpected end of pattern following ?for {variable} \
                     (expected \":\" followed by a search term)"
                ),
            ));
        }
        Some(c) if c != ':' => {
            return Err(CompileError::new(
                ErrorKind::BadSyntax,
                cur.pos(),
                format!(
                    "Unexpected '{c}' following ?for {variable} \
                     (expected \":\" followed by a search term)"
                ),
            ));
        }
        Some(_) => {
            cur.bump();
        }
    }
    cur.skip_whitespace();

    // The name binds at the index the value will occupy on the stack,
    // counted from the bottom.
    let extended = env.bind(variable.to_lowercase());
    let body = parse_condition_list(cur, terminators, opts, wide_context, &extended)?;
    Ok(Matcher::Explicit(Box::new(body)))
}

// ---------- Short-form matchers ----------

fn parse_short_form(
    cur: &mut Cursor,
    terminators: &[&str],
    opts: &ParseOptions,
    env: &NameContext,
) -> Result<Matcher, CompileError> {
    cur.skip_whitespace();

    let Some(flag) = cur.bump() else {
        // A lone trailing tilde searches for the literal character.
        return bare_string_matcher("~", cur.pos(), opts);
    };
    cur.skip_whitespace();

    match flag {
        'v' => Ok(Matcher::Virtual),
        'b' => Ok(Matcher::Broken),
        'g' => Ok(Matcher::Garbage),
        'c' => Ok(Matcher::ConfigFiles),
        'i' => Ok(Matcher::Installed),
        'E' => Ok(Matcher::Essential),
        'M' => Ok(Matcher::Automatic),
        'N' => Ok(Matcher::New),
        'U' => Ok(Matcher::Upgradable),
        'o' => Ok(Matcher::Obsolete),
        'P' | 'C' | 'W' => {
            let inner = parse_atom(cur, terminators, opts, flag == 'W', env)?;
            Ok(match flag {
                'C' => Matcher::Depends {
                    dep_type: DepType::Conflicts,
                    pattern: Box::new(inner),
                    broken_only: false,
                },
                'P' => Matcher::Provides(Box::new(inner)),
                _ => Matcher::Widen(Box::new(inner)),
            })
        }
        'S' => {
            let filter = parse_atom(cur, terminators, opts, false, env)?;
            let pattern = parse_atom(cur, terminators, opts, false, env)?;
            Ok(Matcher::Narrow {
                filter: Box::new(filter),
                pattern: Box::new(pattern),
            })
        }
        'D' | 'R' => parse_short_dep(cur, terminators, opts, env, flag),
        _ => {
            let pos = cur.pos();
            let substr = cur.parse_substr(terminators, true)?;
            match flag {
                'a' => make_action_matcher(&substr, pos),
                'A' => Ok(Matcher::Archive(str_matcher(&substr, pos)?)),
                'B' => match DepType::parse(&substr) {
                    Some(dep_type) => Ok(Matcher::BrokenDep(dep_type)),
                    None => Err(CompileError::new(
                        ErrorKind::UnknownDepType,
                        pos,
                        format!("Unknown dependency type: {substr}"),
                    )),
                },
                'd' => Ok(Matcher::Description(str_matcher(&substr, pos)?)),
                'F' => Ok(Matcher::False),
                'G' => Ok(Matcher::Tag(str_matcher(&substr, pos)?)),
                'm' => Ok(Matcher::Maintainer(str_matcher(&substr, pos)?)),
                'n' => Ok(Matcher::Name(str_matcher(&substr, pos)?)),
                'O' => Ok(Matcher::Origin(str_matcher(&substr, pos)?)),
                'p' => Ok(Matcher::Priority(parse_priority(&substr, opts, pos)?)),
                's' => Ok(Matcher::Section(str_matcher(&substr, pos)?)),
                't' => Ok(Matcher::Task(str_matcher(&substr, pos)?)),
                'T' => Ok(Matcher::True),
                'V' => version_matcher(&substr, pos),
                other => Err(CompileError::new(
                    ErrorKind::UnknownMatcher,
                    pos,
                    format!("Unknown pattern type: {other}"),
                )),
            }
        }
    }
}

/// `~D` / `~R` with an optional `B` (broken) flag and an optional
/// `type:` prefix, `provides` acting as a pseudo-type.
fn parse_short_dep(
    cur: &mut Cursor,
    terminators: &[&str],
    opts: &ParseOptions,
    env: &NameContext,
    flag: char,
) -> Result<Matcher, CompileError> {
    let mut broken = false;
    if cur.peek() == Some('B') {
        broken = true;
        cur.bump();
    }

    let mut do_provides = false;
    let mut dep_type = DepType::Depends;

    // Look ahead for `type:`; without the colon the letters are the start
    // of the target pattern.
    let name_start = cur.pos();
    let mut probe = cur.clone();
    while probe.peek().is_some_and(char::is_alphabetic) && !probe.at_terminator(terminators) {
        probe.bump();
    }
    let name_end = probe.pos();
    probe.skip_whitespace();

    if probe.peek() == Some(':') {
        let type_name = cur.slice(name_start, name_end).trim().to_string();
        probe.bump();
        *cur = probe;

        if type_name.eq_ignore_ascii_case("provides") {
            do_provides = true;
        } else {
            dep_type = DepType::parse(&type_name).ok_or_else(|| {
                CompileError::new(
                    ErrorKind::UnknownDepType,
                    name_start,
                    format!("Unknown dependency type: {type_name}"),
                )
            })?;
        }
    }

    if do_provides && broken {
        return Err(CompileError::new(
            ErrorKind::BrokenProvides,
            name_start,
            "Provides: cannot be broken",
        ));
    }

    let inner = parse_atom(cur, terminators, opts, false, env)?;
    let pattern = Box::new(inner);

    Ok(if flag == 'D' {
        if do_provides {
            Matcher::Provides(pattern)
        } else {
            Matcher::Depends {
                dep_type,
                pattern,
                broken_only: broken,
            }
        }
    } else if do_provides {
        Matcher::ReverseProvides(pattern)
    } else {
        Matcher::RevDepends {
            dep_type,
            pattern,
            broken_only: broken,
        }
    })
}

// ---------- Argument helpers ----------

/// `(string)` — the argument runs to the closing paren, whitespace and
/// commas included.
fn parse_string_args(cur: &mut Cursor) -> Result<String, CompileError> {
    cur.expect('(')?;
    let substr = cur.parse_substr(&[], false)?;
    cur.expect(')')?;
    Ok(substr)
}

/// `(cond-list)`.
fn parse_matcher_paren_args(
    cur: &mut Cursor,
    terminators: &[&str],
    opts: &ParseOptions,
    wide_context: bool,
    env: &NameContext,
) -> Result<Matcher, CompileError> {
    cur.expect('(')?;
    let matcher = parse_condition_list(cur, terminators, opts, wide_context, env)?;
    cur.expect(')')?;
    Ok(matcher)
}

/// `(cond-list)` if an open paren follows, otherwise nothing.
fn parse_optional_matcher_args(
    cur: &mut Cursor,
    terminators: &[&str],
    opts: &ParseOptions,
    env: &NameContext,
) -> Result<Option<Matcher>, CompileError> {
    cur.skip_whitespace();
    if cur.peek() == Some('(') {
        Ok(Some(parse_matcher_paren_args(
            cur,
            terminators,
            opts,
            false,
            env,
        )?))
    } else {
        Ok(None)
    }
}

/// `(cond-list, cond-list)` — the first argument additionally terminates
/// at the separating comma.
fn parse_binary_args(
    cur: &mut Cursor,
    terminators: &[&str],
    opts: &ParseOptions,
    wide_context: bool,
    env: &NameContext,
) -> Result<(Matcher, Matcher), CompileError> {
    let mut with_comma: Vec<&str> = terminators.to_vec();
    if !with_comma.contains(&",") {
        with_comma.push(",");
    }

    cur.expect('(')?;
    let first = parse_condition_list(cur, &with_comma, opts, wide_context, env)?;
    cur.expect(',')?;
    let second = parse_condition_list(cur, terminators, opts, wide_context, env)?;
    cur.expect(')')?;
    Ok((first, second))
}

fn make_action_matcher(action: &str, pos: usize) -> Result<Matcher, CompileError> {
    let kind = if action.eq_ignore_ascii_case("install") {
        ActionKind::Install
    } else if action.eq_ignore_ascii_case("upgrade") {
        ActionKind::Upgrade
    } else if action.eq_ignore_ascii_case("downgrade") {
        ActionKind::Downgrade
    } else if action.eq_ignore_ascii_case("remove") {
        ActionKind::Remove
    } else if action.eq_ignore_ascii_case("purge") {
        return Ok(Matcher::Action {
            kind: ActionKind::Remove,
            require_purge: true,
        });
    } else if action.eq_ignore_ascii_case("reinstall") {
        ActionKind::Reinstall
    } else if action.eq_ignore_ascii_case("hold") {
        ActionKind::Hold
    } else if action.eq_ignore_ascii_case("keep") {
        return Ok(Matcher::Keep);
    } else {
        return Err(CompileError::new(
            ErrorKind::UnknownAction,
            pos,
            format!("Unknown action type: {action}"),
        ));
    };
    Ok(Matcher::Action {
        kind,
        require_purge: false,
    })
}

fn version_matcher(arg: &str, pos: usize) -> Result<Matcher, CompileError> {
    Ok(match arg {
        "CURRENT" => Matcher::CurrentVersion,
        "TARGET" => Matcher::TargetVersion,
        "CANDIDATE" => Matcher::CandidateVersion,
        _ => Matcher::Version(str_matcher(arg, pos)?),
    })
}

fn parse_priority(s: &str, opts: &ParseOptions, pos: usize) -> Result<Priority, CompileError> {
    if let Some(priority) = Priority::parse(s) {
        return Ok(priority);
    }
    if let Some(catalog) = opts.catalog {
        for priority in Priority::ALL {
            if s.eq_ignore_ascii_case(catalog.priority_name(priority)) {
                return Ok(priority);
            }
        }
    }
    Err(CompileError::new(
        ErrorKind::UnknownPriority,
        pos,
        format!("Unknown priority {s}"),
    ))
}
