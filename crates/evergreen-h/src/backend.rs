use crate::cdp::{CdpClient, LaunchOptions};
use crate::inject;
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchMouseEventParams, DispatchMouseEventType, MouseButton,
};
use evergreen_engine::backend::{Backend, BackendError, NavigationResult};
use evergreen_engine::protocol::{ClickMode, ElementInfo, Query};
use tracing::info;

pub struct HeadlessBackend {
    client: Option<CdpClient>,
    options: LaunchOptions,
}

impl HeadlessBackend {
    pub fn new(options: LaunchOptions) -> Self {
        Self {
            client: None,
            options,
        }
    }

    fn client(&self) -> Result<&CdpClient, BackendError> {
        self.client.as_ref().ok_or(BackendError::NotReady)
    }

    async fn probe(
        &self,
        method: &str,
        args: &[serde_json::Value],
    ) -> Result<serde_json::Value, BackendError> {
        let client = self.client()?;
        inject::call(&client.page, method, args)
            .await
            .map_err(|e| BackendError::Probe(e.to_string()))
    }

    async fn probe_query(&self, query: &Query) -> Result<Option<ElementInfo>, BackendError> {
        let value = self.probe("query", &[serde_json::to_value(query)?]).await?;
        if value.is_null() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(value)?))
    }

    async fn dispatch_click(&self, x: f64, y: f64) -> Result<(), BackendError> {
        let client = self.client()?;
        for event_type in [
            DispatchMouseEventType::MousePressed,
            DispatchMouseEventType::MouseReleased,
        ] {
            let event = DispatchMouseEventParams::builder()
                .r#type(event_type)
                .x(x)
                .y(y)
                .button(MouseButton::Left)
                .click_count(1)
                .build()
                .map_err(|e| BackendError::Other(format!("Failed to build mouse event: {:?}", e)))?;
            client
                .page
                .execute(event)
                .await
                .map_err(|e| BackendError::Other(format!("Mouse dispatch failed: {}", e)))?;
        }
        Ok(())
    }
}

#[async_trait]
impl Backend for HeadlessBackend {
    async fn launch(&mut self) -> Result<(), BackendError> {
        info!("Launching headless backend (Chromium)...");
        let client = CdpClient::launch(&self.options)
            .await
            .map_err(|e| BackendError::Other(e.to_string()))?;
        self.client = Some(client);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), BackendError> {
        if let Some(client) = self.client.take() {
            client
                .close()
                .await
                .map_err(|e| BackendError::Other(e.to_string()))?;
        }
        Ok(())
    }

    async fn is_ready(&self) -> bool {
        self.client.is_some()
    }

    async fn navigate(&mut self, url: &str) -> Result<NavigationResult, BackendError> {
        let client = self.client()?;

        info!("Navigating to: {}", url);
        client
            .page
            .goto(url)
            .await
            .map_err(|e| BackendError::Navigation(e.to_string()))?;
        client
            .page
            .wait_for_navigation()
            .await
            .map_err(|e| BackendError::Navigation(e.to_string()))?;

        let title = client
            .page
            .get_title()
            .await
            .unwrap_or_default()
            .unwrap_or_default();
        let url = client
            .page
            .url()
            .await
            .map_err(|e| BackendError::Navigation(e.to_string()))?
            .unwrap_or_default();
        Ok(NavigationResult { url, title })
    }

    async fn current_url(&mut self) -> Result<String, BackendError> {
        let client = self.client()?;
        Ok(client
            .page
            .url()
            .await
            .map_err(|e| BackendError::Other(e.to_string()))?
            .unwrap_or_default())
    }

    async fn title(&mut self) -> Result<String, BackendError> {
        let client = self.client()?;
        Ok(client
            .page
            .get_title()
            .await
            .map_err(|e| BackendError::Other(e.to_string()))?
            .unwrap_or_default())
    }

    async fn html(&mut self) -> Result<String, BackendError> {
        let client = self.client()?;
        client
            .page
            .content()
            .await
            .map_err(|e| BackendError::Other(e.to_string()))
    }

    async fn query(&mut self, query: &Query) -> Result<Option<ElementInfo>, BackendError> {
        self.probe_query(query).await
    }

    async fn query_all(&mut self, query: &Query) -> Result<Vec<ElementInfo>, BackendError> {
        let value = self
            .probe("queryAll", &[serde_json::to_value(query)?])
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn click(&mut self, query: &Query, mode: ClickMode) -> Result<(), BackendError> {
        match mode {
            ClickMode::Normal => {
                let Some(info) = self.probe_query(query).await? else {
                    return Err(BackendError::Probe(format!("no element for {}", query)));
                };
                let (x, y) = info.rect.center();
                self.dispatch_click(x, y).await
            }
            ClickMode::Forced => {
                let hit = self.probe("click", &[serde_json::to_value(query)?]).await?;
                if hit.as_bool() == Some(true) {
                    Ok(())
                } else {
                    Err(BackendError::Probe(format!("no element for {}", query)))
                }
            }
        }
    }

    async fn click_at(&mut self, x: f64, y: f64) -> Result<(), BackendError> {
        self.dispatch_click(x, y).await
    }

    async fn set_value(&mut self, query: &Query, text: &str) -> Result<(), BackendError> {
        let hit = self
            .probe(
                "setValue",
                &[serde_json::to_value(query)?, serde_json::Value::from(text)],
            )
            .await?;
        if hit.as_bool() == Some(true) {
            Ok(())
        } else {
            Err(BackendError::Probe(format!("no element for {}", query)))
        }
    }

    async fn scroll_into_view(&mut self, query: &Query) -> Result<(), BackendError> {
        let hit = self.probe("scroll", &[serde_json::to_value(query)?]).await?;
        if hit.as_bool() != Some(true) {
            tracing::debug!("scroll target {} not found", query);
        }
        Ok(())
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>, BackendError> {
        let client = self.client()?;
        let bytes = client
            .page
            .screenshot(chromiumoxide::page::ScreenshotParams::builder().build())
            .await
            .map_err(|e| BackendError::Other(format!("Screenshot failed: {}", e)))?;

        Ok(bytes)
    }
}
