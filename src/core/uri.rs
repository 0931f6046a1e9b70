/// Resource URIs and URI templates.
///
/// Supported template syntax is the small subset resources actually use:
/// `{name}` binds one path segment and a trailing `{?a,b}` declares query
/// parameters, e.g. `host://snapshot{?view,width,height}` or
/// `docs://{module}/summary`.

use std::collections::BTreeMap;
use std::fmt;

use crate::core::error::RegistryError;

/// A resource URI split into its base (scheme, authority, path) and decoded
/// query parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceUri {
    raw: String,
    base: String,
    query: Vec<(String, String)>,
}

impl ResourceUri {
    /// Parse `scheme://rest[?query]`. Returns `None` if there is no scheme.
    pub fn parse(raw: &str) -> Option<Self> {
        let (scheme, _) = raw.split_once("://")?;
        let scheme_ok = !scheme.is_empty()
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
        if !scheme_ok {
            return None;
        }

        let (base, query) = match raw.split_once('?') {
            Some((base, query)) => (base, query),
            None => (raw, ""),
        };

        let mut params: Vec<(String, String)> = Vec::new();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            // First occurrence wins.
            if !params.iter().any(|(k, _)| *k == key) {
                params.push((key.into_owned(), value.into_owned()));
            }
        }

        Some(Self {
            raw: raw.to_string(),
            base: base.to_string(),
            query: params,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Everything before the query string.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Decoded query parameters in URI order, one entry per key.
    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Literal(String),
    Var(String),
}

/// A parsed URI template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UriTemplate {
    raw: String,
    parts: Vec<Part>,
    query_vars: Vec<String>,
}

impl UriTemplate {
    /// Parse a template. Adjacent variables, unclosed braces and a query
    /// expression that is not last are rejected.
    pub fn parse(raw: &str) -> Result<Self, RegistryError> {
        let invalid = |reason: &str| RegistryError::InvalidTemplate {
            template: raw.to_string(),
            reason: reason.to_string(),
        };

        let mut parts = Vec::new();
        let mut query_vars = Vec::new();
        let mut rest = raw;

        while !rest.is_empty() {
            if !query_vars.is_empty() {
                return Err(invalid("query expression must come last"));
            }
            let Some(open) = rest.find('{') else {
                parts.push(Part::Literal(rest.to_string()));
                break;
            };
            if open > 0 {
                parts.push(Part::Literal(rest[..open].to_string()));
            }
            let close = rest[open..]
                .find('}')
                .map(|i| open + i)
                .ok_or_else(|| invalid("unclosed '{'"))?;
            let expr = &rest[open + 1..close];

            if let Some(names) = expr.strip_prefix('?') {
                for name in names.split(',').map(str::trim) {
                    if name.is_empty() {
                        return Err(invalid("empty query variable"));
                    }
                    query_vars.push(name.to_string());
                }
            } else {
                if expr.is_empty() || !expr.chars().all(|c| c.is_alphanumeric() || c == '_') {
                    return Err(invalid("variable names must be alphanumeric"));
                }
                if matches!(parts.last(), Some(Part::Var(_))) {
                    return Err(invalid("adjacent variables are ambiguous"));
                }
                parts.push(Part::Var(expr.to_string()));
            }
            rest = &rest[close + 1..];
        }

        // Trailing slashes before a query expression are not significant.
        if !query_vars.is_empty() {
            if let Some(Part::Literal(last)) = parts.last_mut() {
                let trimmed = last.trim_end_matches('/').len();
                last.truncate(trimmed);
            }
        }

        Ok(Self {
            raw: raw.to_string(),
            parts,
            query_vars,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Names of the declared query parameters.
    pub fn query_vars(&self) -> &[String] {
        &self.query_vars
    }

    /// Match `uri` against the template, returning the path bindings.
    pub fn matches(&self, uri: &ResourceUri) -> Option<BTreeMap<String, String>> {
        let base = if self.query_vars.is_empty() {
            uri.base()
        } else {
            uri.base().trim_end_matches('/')
        };

        let mut bindings = BTreeMap::new();
        let mut pos = 0;
        for (i, part) in self.parts.iter().enumerate() {
            let rest = &base[pos..];
            match part {
                Part::Literal(lit) => {
                    if !rest.starts_with(lit.as_str()) {
                        return None;
                    }
                    pos += lit.len();
                }
                Part::Var(name) => {
                    let len = match self.parts.get(i + 1) {
                        Some(Part::Literal(next)) => rest.find(next.as_str())?,
                        _ => rest.len(),
                    };
                    let value = &rest[..len];
                    if value.is_empty() || value.contains('/') {
                        return None;
                    }
                    bindings.insert(name.clone(), value.to_string());
                    pos += len;
                }
            }
        }
        (pos == base.len()).then_some(bindings)
    }
}

impl fmt::Display for UriTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri(s: &str) -> ResourceUri {
        ResourceUri::parse(s).unwrap()
    }

    #[test]
    fn parses_query_parameters() {
        let u = uri("host://snapshot?view=top&width=800&view=iso");
        assert_eq!(u.base(), "host://snapshot");
        assert_eq!(
            u.query(),
            &[
                ("view".to_string(), "top".to_string()),
                ("width".to_string(), "800".to_string())
            ]
        );
    }

    #[test]
    fn decodes_query_values() {
        let u = uri("docs://search?q=sketch%20profile");
        assert_eq!(u.query()[0].1, "sketch profile");
    }

    #[test]
    fn rejects_uris_without_scheme() {
        assert!(ResourceUri::parse("status").is_none());
        assert!(ResourceUri::parse("://status").is_none());
    }

    #[test]
    fn query_template_matches_base_with_or_without_query() {
        let t = UriTemplate::parse("host://snapshot/{?view,width,height}").unwrap();
        assert_eq!(t.query_vars(), &["view", "width", "height"]);
        assert!(t.matches(&uri("host://snapshot")).is_some());
        assert!(t.matches(&uri("host://snapshot?view=top&width=10")).is_some());
        assert!(t.matches(&uri("host://snapshots")).is_none());
    }

    #[test]
    fn path_template_binds_segments() {
        let t = UriTemplate::parse("docs://{module}/classes/{class}").unwrap();
        let bindings = t.matches(&uri("docs://core/classes/Sketch")).unwrap();
        assert_eq!(bindings.get("module").map(String::as_str), Some("core"));
        assert_eq!(bindings.get("class").map(String::as_str), Some("Sketch"));

        assert!(t.matches(&uri("docs://core/classes/")).is_none());
        assert!(t.matches(&uri("docs://a/b/classes/Sketch")).is_none());
    }

    #[test]
    fn invalid_templates_are_rejected() {
        assert!(UriTemplate::parse("host://{view").is_err());
        assert!(UriTemplate::parse("host://{a}{b}").is_err());
        assert!(UriTemplate::parse("host://x{?a}/more").is_err());
        assert!(UriTemplate::parse("host://x{?a,}").is_err());
    }
}
