#![allow(dead_code)] // not every test binary uses every helper

//! Scripted in-memory backend for engine tests.
//!
//! Pages are `View` values keyed by the `Query::describe()` strings the
//! engine produces; navigation and clicks swap views according to the
//! script. No real browser, no real time (tests run with a paused clock).

use async_trait::async_trait;
use evergreen_engine::backend::{Backend, BackendError, NavigationResult};
use evergreen_engine::protocol::{ClickMode, ElementInfo, Query, Rect};
use std::collections::HashMap;

pub fn displayed(text: &str) -> ElementInfo {
    ElementInfo {
        visible: true,
        enabled: true,
        text: text.to_string(),
        value: None,
        rect: Rect {
            x: 10.0,
            y: 10.0,
            width: 120.0,
            height: 32.0,
        },
    }
}

pub fn displayed_with_value(value: &str) -> ElementInfo {
    ElementInfo {
        value: Some(value.to_string()),
        ..displayed("")
    }
}

pub fn disabled(text: &str) -> ElementInfo {
    ElementInfo {
        enabled: false,
        ..displayed(text)
    }
}

pub fn hidden(text: &str) -> ElementInfo {
    ElementInfo {
        visible: false,
        rect: Rect::default(),
        ..displayed(text)
    }
}

/// One renderable page state.
#[derive(Debug, Clone, Default)]
pub struct View {
    pub url: String,
    pub title: String,
    pub html: String,
    /// Keyed by `Query::describe()`.
    pub elements: HashMap<String, Vec<ElementInfo>>,
}

impl View {
    pub fn new(url: &str, title: &str) -> Self {
        Self {
            url: url.to_string(),
            title: title.to_string(),
            ..Default::default()
        }
    }

    pub fn with_html(mut self, html: &str) -> Self {
        self.html = html.to_string();
        self
    }

    pub fn with_element(mut self, query: &Query, info: ElementInfo) -> Self {
        self.elements.entry(query.describe()).or_default().push(info);
        self
    }
}

#[derive(Default)]
pub struct ScriptedBackend {
    pub view: View,
    /// Views installed by `navigate`, per URL. The last view for a URL is
    /// sticky; earlier ones are consumed in order.
    pub routes: HashMap<String, Vec<View>>,
    /// Views installed by `click`, keyed by an exact `Query::describe()`.
    pub click_views: HashMap<String, View>,
    /// Title override queue consumed by `title()` calls (then falls back to
    /// the view title).
    pub title_queue: Vec<String>,
    pub fail_launch: bool,

    pub launch_calls: u32,
    pub close_calls: u32,
    pub navigations: Vec<String>,
    pub clicks: Vec<(String, ClickMode)>,
    pub click_at_calls: u32,
    pub set_values: Vec<(String, String)>,
}

impl ScriptedBackend {
    pub fn new(initial: View) -> Self {
        Self {
            view: initial,
            ..Default::default()
        }
    }

    pub fn route(&mut self, url: &str, view: View) {
        self.routes.entry(url.to_string()).or_default().push(view);
    }

    pub fn on_click(&mut self, query: &Query, view: View) {
        self.click_views.insert(query.describe(), view);
    }

    fn lookup(&self, query: &Query) -> Vec<ElementInfo> {
        self.view
            .elements
            .get(&query.describe())
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    async fn launch(&mut self) -> Result<(), BackendError> {
        self.launch_calls += 1;
        if self.fail_launch {
            return Err(BackendError::Other("no browser in test".into()));
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), BackendError> {
        self.close_calls += 1;
        Ok(())
    }

    async fn is_ready(&self) -> bool {
        self.launch_calls > 0 && !self.fail_launch
    }

    async fn navigate(&mut self, url: &str) -> Result<NavigationResult, BackendError> {
        self.navigations.push(url.to_string());
        if let Some(queue) = self.routes.get_mut(url) {
            if queue.len() > 1 {
                self.view = queue.remove(0);
            } else if let Some(view) = queue.first() {
                self.view = view.clone();
            }
        } else {
            self.view.url = url.to_string();
        }
        Ok(NavigationResult {
            url: self.view.url.clone(),
            title: self.view.title.clone(),
        })
    }

    async fn current_url(&mut self) -> Result<String, BackendError> {
        Ok(self.view.url.clone())
    }

    async fn title(&mut self) -> Result<String, BackendError> {
        if !self.title_queue.is_empty() {
            return Ok(self.title_queue.remove(0));
        }
        Ok(self.view.title.clone())
    }

    async fn html(&mut self) -> Result<String, BackendError> {
        Ok(self.view.html.clone())
    }

    async fn query(&mut self, query: &Query) -> Result<Option<ElementInfo>, BackendError> {
        Ok(self.lookup(query).into_iter().next())
    }

    async fn query_all(&mut self, query: &Query) -> Result<Vec<ElementInfo>, BackendError> {
        Ok(self.lookup(query))
    }

    async fn click(&mut self, query: &Query, mode: ClickMode) -> Result<(), BackendError> {
        let key = query.describe();
        if self.lookup(query).is_empty() {
            return Err(BackendError::Probe(format!("no element for {}", key)));
        }
        self.clicks.push((key.clone(), mode));
        if let Some(view) = self.click_views.get(&key) {
            self.view = view.clone();
        }
        Ok(())
    }

    async fn click_at(&mut self, _x: f64, _y: f64) -> Result<(), BackendError> {
        self.click_at_calls += 1;
        Ok(())
    }

    async fn set_value(&mut self, query: &Query, text: &str) -> Result<(), BackendError> {
        self.set_values.push((query.describe(), text.to_string()));
        Ok(())
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>, BackendError> {
        Ok(vec![0x89, 0x50, 0x4e, 0x47])
    }
}
