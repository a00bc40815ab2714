use crate::model::EngineError;
use serde_json::Value;

/// A parsed JSONPath expression covering the subset the output schema DSL
/// uses: `$`, `$.field`, `$["field"]`, `$[*]`, `$[0]`, and any dotted/bracket
/// combination of those (e.g. `$.fields["Name"]`, `$.values[*]`).
///
/// Resolution is fail-safe: a missing segment yields an empty result, never
/// an error, since malformed third-party responses must not take down
/// rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonPathExpr {
    segments: Vec<PathSegment>,
}

#[derive(Debug, Clone, PartialEq)]
enum PathSegment {
    Key(String),
    Index(usize),
    Wildcard,
}

impl JsonPathExpr {
    pub fn parse(expr: &str) -> Result<Self, EngineError> {
        let mut chars = expr.chars().peekable();

        if chars.next() != Some('$') {
            return Err(EngineError::validation(format!(
                "JSONPath must start with $: {}",
                expr
            )));
        }

        let mut segments = Vec::new();

        while let Some(&ch) = chars.peek() {
            match ch {
                '.' => {
                    chars.next();
                    let mut key = String::new();
                    while let Some(&c) = chars.peek() {
                        if c == '.' || c == '[' {
                            break;
                        }
                        key.push(c);
                        chars.next();
                    }
                    if key.is_empty() {
                        return Err(EngineError::validation(format!(
                            "Empty key segment in JSONPath: {}",
                            expr
                        )));
                    }
                    segments.push(PathSegment::Key(key));
                }
                '[' => {
                    chars.next();
                    let mut inner = String::new();
                    let mut closed = false;
                    for c in chars.by_ref() {
                        if c == ']' {
                            closed = true;
                            break;
                        }
                        inner.push(c);
                    }
                    if !closed {
                        return Err(EngineError::validation(format!(
                            "Unterminated bracket in JSONPath: {}",
                            expr
                        )));
                    }
                    segments.push(Self::parse_bracket(&inner, expr)?);
                }
                _ => {
                    return Err(EngineError::validation(format!(
                        "Unexpected character '{}' in JSONPath: {}",
                        ch, expr
                    )));
                }
            }
        }

        Ok(Self { segments })
    }

    fn parse_bracket(inner: &str, expr: &str) -> Result<PathSegment, EngineError> {
        if inner == "*" {
            return Ok(PathSegment::Wildcard);
        }

        if (inner.starts_with('"') && inner.ends_with('"') && inner.len() >= 2)
            || (inner.starts_with('\'') && inner.ends_with('\'') && inner.len() >= 2)
        {
            return Ok(PathSegment::Key(inner[1..inner.len() - 1].to_string()));
        }

        if let Ok(index) = inner.parse::<usize>() {
            return Ok(PathSegment::Index(index));
        }

        Err(EngineError::validation(format!(
            "Invalid bracket segment '[{}]' in JSONPath: {}",
            inner, expr
        )))
    }

    /// Resolve against a value, fanning out over arrays at wildcard segments.
    pub fn resolve(&self, data: &Value) -> Vec<Value> {
        let mut current = vec![data.clone()];

        for segment in &self.segments {
            let mut next = Vec::new();
            for value in &current {
                match segment {
                    PathSegment::Key(key) => {
                        if let Some(v) = value.get(key.as_str()) {
                            next.push(v.clone());
                        }
                    }
                    PathSegment::Index(index) => {
                        if let Some(v) = value.get(index) {
                            next.push(v.clone());
                        }
                    }
                    PathSegment::Wildcard => match value {
                        Value::Array(items) => next.extend(items.iter().cloned()),
                        Value::Object(map) => next.extend(map.values().cloned()),
                        _ => {}
                    },
                }
            }
            current = next;
        }

        current
    }

    pub fn resolve_one(&self, data: &Value) -> Option<Value> {
        self.resolve(data).into_iter().next()
    }

    pub fn has_wildcard(&self) -> bool {
        self.segments.contains(&PathSegment::Wildcard)
    }
}
