use serde::{Deserialize, Serialize};

/// How one element query is evaluated inside the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QueryKind {
    /// CSS selector, `querySelector` semantics.
    Css { selector: String },
    /// Visible-text match over interactive elements (trimmed, case-insensitive).
    Text { text: String },
    /// XPath expression.
    #[serde(rename = "xpath")]
    XPath { path: String },
}

/// A fully-qualified element query, optionally scoped to a container.
///
/// The scope is itself a CSS selector; a scoped query only matches inside
/// the first element the scope selector resolves to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    #[serde(flatten)]
    pub kind: QueryKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl Query {
    pub fn css(selector: impl Into<String>) -> Self {
        Self {
            kind: QueryKind::Css {
                selector: selector.into(),
            },
            scope: None,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: QueryKind::Text { text: text.into() },
            scope: None,
        }
    }

    pub fn xpath(path: impl Into<String>) -> Self {
        Self {
            kind: QueryKind::XPath { path: path.into() },
            scope: None,
        }
    }

    pub fn within(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Stable human-readable form, used for logging and for test doubles.
    pub fn describe(&self) -> String {
        let body = match &self.kind {
            QueryKind::Css { selector } => format!("css:{}", selector),
            QueryKind::Text { text } => format!("text:{}", text),
            QueryKind::XPath { path } => format!("xpath:{}", path),
        };
        match &self.scope {
            Some(scope) => format!("{} @ {}", body, scope),
            None => body,
        }
    }
}

impl std::fmt::Display for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.describe())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// Snapshot of one matched element as reported by the page probe.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ElementInfo {
    pub visible: bool,
    pub enabled: bool,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub rect: Rect,
}

impl ElementInfo {
    /// Displayed with a non-zero box. The minimum requirement for any
    /// locator match; being `enabled` is a separate, per-target requirement.
    pub fn is_displayed(&self) -> bool {
        self.visible && self.rect.width > 0.0 && self.rect.height > 0.0
    }
}

/// Click dispatch mode. `Normal` is a trusted input event at the element
/// center; `Forced` is a synthetic DOM click for elements that fail
/// hit-testing (overlays, off-screen remnants). Callers try them in that
/// order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClickMode {
    Normal,
    Forced,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_serializes_with_flattened_kind() {
        let q = Query::css("#renew-modal button").within(".modal");
        let v = serde_json::to_value(&q).unwrap();
        assert_eq!(v["kind"], "css");
        assert_eq!(v["selector"], "#renew-modal button");
        assert_eq!(v["scope"], ".modal");
    }

    #[test]
    fn unscoped_query_omits_scope() {
        let v = serde_json::to_value(Query::text("Renew")).unwrap();
        assert!(v.get("scope").is_none());
        assert_eq!(v["text"], "Renew");
    }

    #[test]
    fn zero_sized_element_is_not_displayed() {
        let info = ElementInfo {
            visible: true,
            ..Default::default()
        };
        assert!(!info.is_displayed());
    }
}
