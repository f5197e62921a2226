//! Embed loader: the button and iframe a host page gets from the widget.
//!
//! Runs against any [`HostPage`]; the browser rendition served at
//! `/widget.js` follows the same contract.

pub mod autoinit;
pub mod page;

use crate::protocol::{HostMessage, ProtocolError, WidgetMessage, encode_host_message};
use crate::types::{WidgetConfig, WidgetConfigPatch};
use crate::validation::{self, ConfigError};
use page::{ElementSpec, HostPage, ListenerId, NodeId, Parent};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

pub use autoinit::{DATA_ATTRIBUTES, auto_init, options_from_html};

pub const DEFAULT_WIDGET_URL: &str = "http://localhost:5173";
pub const CONTAINER_ID: &str = "guidance-widget";
pub const FAB_ID: &str = "guidance-widget-fab";

/// iframe geometry, hidden until the FAB is clicked.
pub const IFRAME_STYLE: &[(&str, &str)] = &[
    ("position", "fixed"),
    ("bottom", "24px"),
    ("right", "24px"),
    ("width", "400px"),
    ("height", "600px"),
    ("border", "none"),
    ("border-radius", "12px"),
    ("box-shadow", "0 8px 32px rgba(0, 0, 0, 0.12)"),
    ("z-index", "10000"),
    ("background", "white"),
    ("display", "none"),
];

pub const FAB_STYLE: &[(&str, &str)] = &[
    ("position", "fixed"),
    ("bottom", "24px"),
    ("right", "24px"),
    ("width", "56px"),
    ("height", "56px"),
    ("border-radius", "50%"),
    ("color", "white"),
    ("display", "flex"),
    ("align-items", "center"),
    ("justify-content", "center"),
    ("cursor", "pointer"),
    ("box-shadow", "0 4px 12px rgba(0, 0, 0, 0.15)"),
    ("transition", "all 0.3s ease"),
    ("font-weight", "bold"),
    ("font-size", "20px"),
    ("z-index", "9999"),
];

#[derive(Debug, Error, PartialEq)]
pub enum LoaderError {
    #[error("guidance widget is already loaded")]
    AlreadyInitialized,
    #[error("guidance widget is not loaded")]
    NotInitialized,
    #[error("invalid widget configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
}

/// What a host page passes in; everything is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoaderOptions {
    #[serde(flatten)]
    pub config: WidgetConfigPatch,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub widget_url: Option<String>,
}

/// Options merged over the defaults and validated.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoaderConfig {
    #[serde(flatten)]
    pub widget: WidgetConfig,
    pub widget_url: String,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            widget: WidgetConfig::default(),
            widget_url: DEFAULT_WIDGET_URL.to_string(),
        }
    }
}

impl LoaderConfig {
    pub fn from_options(options: LoaderOptions) -> Result<Self, LoaderError> {
        let widget = WidgetConfig::default().merged(options.config);
        validation::validate_config(&widget)?;
        let widget_url = match options.widget_url {
            Some(url) => {
                validation::check_url("widgetUrl", &url)?;
                url.trim_end_matches('/').to_string()
            }
            None => DEFAULT_WIDGET_URL.to_string(),
        };
        Ok(Self { widget, widget_url })
    }

    pub fn iframe_src(&self) -> String {
        format!("{}/widget", self.widget_url)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    /// FAB visible, iframe `display: none`.
    #[default]
    Hidden,
    /// iframe visible, FAB hidden.
    Shown,
}

pub struct EmbedLoader<P: HostPage> {
    page: P,
    config: LoaderConfig,
    loaded: bool,
    visibility: Visibility,
    iframe: Option<NodeId>,
    fab: Option<NodeId>,
    listener: Option<ListenerId>,
}

impl<P: HostPage> EmbedLoader<P> {
    pub fn new(page: P, options: LoaderOptions) -> Result<Self, LoaderError> {
        Ok(Self::with_config(page, LoaderConfig::from_options(options)?))
    }

    pub fn with_config(page: P, config: LoaderConfig) -> Self {
        Self {
            page,
            config,
            loaded: false,
            visibility: Visibility::Hidden,
            iframe: None,
            fab: None,
            listener: None,
        }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn page(&self) -> &P {
        &self.page
    }

    pub fn into_page(self) -> P {
        self.page
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn iframe(&self) -> Option<NodeId> {
        self.iframe
    }

    pub fn fab(&self) -> Option<NodeId> {
        self.fab
    }

    /// Mount the container, iframe and FAB and start listening for messages.
    pub fn init(&mut self) -> Result<(), LoaderError> {
        if self.loaded {
            warn!("guidance widget is already loaded");
            return Err(LoaderError::AlreadyInitialized);
        }

        let container = match self.page.element_by_id(CONTAINER_ID) {
            Some(node) => node,
            None => self
                .page
                .create_element(Parent::Body, ElementSpec::new("div").id(CONTAINER_ID)),
        };

        let mut iframe = ElementSpec::new("iframe").attr("src", self.config.iframe_src());
        for (property, value) in IFRAME_STYLE {
            iframe = iframe.style(property, *value);
        }
        self.iframe = Some(self.page.create_element(Parent::Node(container), iframe));

        let mut fab = ElementSpec::new("div").id(FAB_ID).text("?");
        for (property, value) in FAB_STYLE {
            fab = fab.style(property, *value);
        }
        fab = fab
            .style("background-color", self.config.widget.primary_color.clone())
            .style("font-family", self.config.widget.font_family.clone());
        self.fab = Some(self.page.create_element(Parent::Body, fab));

        self.listener = Some(self.page.add_message_listener());
        self.visibility = Visibility::Hidden;
        self.loaded = true;
        info!(widget_url = %self.config.widget_url, "guidance widget loaded");
        Ok(())
    }

    pub fn toggle(&mut self) -> Result<Visibility, LoaderError> {
        match self.visibility {
            Visibility::Hidden => self.show()?,
            Visibility::Shown => self.hide()?,
        }
        Ok(self.visibility)
    }

    /// Reveal the iframe and hand it the configuration.
    pub fn show(&mut self) -> Result<(), LoaderError> {
        let (Some(iframe), Some(fab)) = (self.iframe, self.fab) else {
            return Err(LoaderError::NotInitialized);
        };
        self.page.set_style(iframe, "display", "block");
        self.page.set_style(fab, "display", "none");
        self.visibility = Visibility::Shown;
        let message = encode_host_message(&HostMessage::Init(self.config.widget.clone()));
        self.page
            .post_message(iframe, message, &self.config.widget_url);
        Ok(())
    }

    pub fn hide(&mut self) -> Result<(), LoaderError> {
        let (Some(iframe), Some(fab)) = (self.iframe, self.fab) else {
            return Err(LoaderError::NotInitialized);
        };
        self.page.set_style(iframe, "display", "none");
        self.page.set_style(fab, "display", "flex");
        self.visibility = Visibility::Hidden;
        Ok(())
    }

    /// Dispatch a window `message` event. Returns `Ok(None)` when no
    /// listener is installed; origin and shape failures change nothing.
    pub fn handle_message(
        &mut self,
        origin: &str,
        data: &serde_json::Value,
    ) -> Result<Option<WidgetMessage>, ProtocolError> {
        if self.listener.is_none() {
            return Ok(None);
        }
        let message =
            crate::protocol::decode_widget_message(&self.config.widget_url, origin, data)?;
        debug!(kind = message.kind(), "widget message received");
        match &message {
            WidgetMessage::WidgetClose => {
                // loaded implies iframe and fab exist
                let _ = self.hide();
            }
            WidgetMessage::WidgetReady => info!("guidance widget is ready"),
            WidgetMessage::FeedbackSubmitted(feedback) => {
                info!(?feedback, "guidance widget feedback submitted");
            }
        }
        Ok(Some(message))
    }

    /// Remove the FAB, the iframe and the message listener.
    pub fn destroy(&mut self) {
        if let Some(fab) = self.fab.take() {
            self.page.remove(fab);
        }
        if let Some(iframe) = self.iframe.take() {
            self.page.remove(iframe);
        }
        if let Some(listener) = self.listener.take() {
            self.page.remove_message_listener(listener);
        }
        self.visibility = Visibility::Hidden;
        self.loaded = false;
    }
}

/// Host-page entry point: build a loader, mount it, hand it back.
pub fn init_guidance_widget<P: HostPage>(
    page: P,
    options: LoaderOptions,
) -> Result<EmbedLoader<P>, LoaderError> {
    let mut loader = EmbedLoader::new(page, options)?;
    loader.init()?;
    Ok(loader)
}

#[cfg(test)]
mod tests {
    use super::page::InMemoryPage;
    use super::*;
    use serde_json::json;

    fn loader() -> EmbedLoader<InMemoryPage> {
        init_guidance_widget(InMemoryPage::new(), LoaderOptions::default()).unwrap()
    }

    #[test]
    fn init_mounts_hidden_iframe_and_fab() {
        let loader = loader();
        let page = loader.page();
        assert_eq!(page.count_tag("iframe"), 1);
        let iframe = page.element(loader.iframe().unwrap()).unwrap();
        assert_eq!(iframe.attribute("src"), Some("http://localhost:5173/widget"));
        assert_eq!(iframe.style("display"), Some("none"));
        assert_eq!(iframe.parent, Parent::Node(page.element_by_id(CONTAINER_ID).unwrap()));

        let fab = page.element(loader.fab().unwrap()).unwrap();
        assert_eq!(fab.style("background-color"), Some("#9333ea"));
        assert_eq!(fab.style("font-family"), Some("Inter, sans-serif"));
        assert_eq!(fab.text.as_deref(), Some("?"));
        assert_eq!(page.listener_count(), 1);
        assert_eq!(loader.visibility(), Visibility::Hidden);
    }

    #[test]
    fn second_init_is_a_no_op() {
        let mut loader = loader();
        let before = loader.page().len();
        assert_eq!(loader.init(), Err(LoaderError::AlreadyInitialized));
        assert_eq!(loader.page().len(), before);
        assert_eq!(loader.page().count_tag("iframe"), 1);
        assert_eq!(loader.page().listener_count(), 1);
    }

    #[test]
    fn reuses_existing_container() {
        let mut page = InMemoryPage::new();
        let existing = page.create_element(Parent::Body, ElementSpec::new("div").id(CONTAINER_ID));
        let loader = init_guidance_widget(page, LoaderOptions::default()).unwrap();
        let iframe = loader.page().element(loader.iframe().unwrap()).unwrap();
        assert_eq!(iframe.parent, Parent::Node(existing));
        assert_eq!(loader.page().count_tag("div"), 2);
    }

    #[test]
    fn show_posts_init_to_widget_origin() {
        let mut loader = init_guidance_widget(
            InMemoryPage::new(),
            LoaderOptions {
                config: WidgetConfigPatch {
                    primary_color: Some("#112233".into()),
                    ..Default::default()
                },
                widget_url: Some("https://help.example.com/".into()),
            },
        )
        .unwrap();
        assert_eq!(loader.toggle(), Ok(Visibility::Shown));

        let page = loader.page();
        let iframe = page.element(loader.iframe().unwrap()).unwrap();
        assert_eq!(iframe.attribute("src"), Some("https://help.example.com/widget"));
        assert_eq!(iframe.style("display"), Some("block"));
        assert_eq!(
            page.element(loader.fab().unwrap()).unwrap().style("display"),
            Some("none")
        );
        let posted = &page.posted()[0];
        assert_eq!(posted.target_origin, "https://help.example.com");
        assert_eq!(posted.message["type"], "init");
        assert_eq!(posted.message["data"]["primaryColor"], "#112233");

        assert_eq!(loader.toggle(), Ok(Visibility::Hidden));
        assert_eq!(
            loader
                .page()
                .element(loader.fab().unwrap())
                .unwrap()
                .style("display"),
            Some("flex")
        );
    }

    #[test]
    fn widget_close_hides_iframe() {
        let mut loader = loader();
        loader.show().unwrap();
        let handled = loader
            .handle_message(DEFAULT_WIDGET_URL, &json!({"type": "widget-close"}))
            .unwrap();
        assert_eq!(handled, Some(WidgetMessage::WidgetClose));
        assert_eq!(loader.visibility(), Visibility::Hidden);
    }

    #[test]
    fn foreign_origin_changes_nothing() {
        let mut loader = loader();
        loader.show().unwrap();
        let err = loader
            .handle_message("https://evil.example.com", &json!({"type": "widget-close"}))
            .unwrap_err();
        assert!(matches!(err, ProtocolError::OriginRejected { .. }));
        assert_eq!(loader.visibility(), Visibility::Shown);
    }

    #[test]
    fn ready_and_feedback_only_log() {
        let mut loader = loader();
        loader.show().unwrap();
        loader
            .handle_message(DEFAULT_WIDGET_URL, &json!({"type": "widget-ready"}))
            .unwrap();
        loader
            .handle_message(
                DEFAULT_WIDGET_URL,
                &json!({"type": "feedback-submitted", "data": {"helpful": false}}),
            )
            .unwrap();
        assert_eq!(loader.visibility(), Visibility::Shown);
        assert_eq!(loader.page().posted().len(), 1);
    }

    #[test]
    fn destroy_removes_nodes_and_listener() {
        let mut loader = loader();
        loader.destroy();
        assert!(!loader.is_loaded());
        assert_eq!(loader.page().count_tag("iframe"), 0);
        assert_eq!(loader.page().element_by_id(FAB_ID), None);
        assert_eq!(loader.page().listener_count(), 0);
        assert_eq!(
            loader.handle_message(DEFAULT_WIDGET_URL, &json!({"type": "widget-close"})),
            Ok(None)
        );
        assert_eq!(loader.show(), Err(LoaderError::NotInitialized));

        // can be mounted again
        loader.init().unwrap();
        assert_eq!(loader.page().count_tag("iframe"), 1);
    }

    #[test]
    fn invalid_options_are_rejected() {
        let err = EmbedLoader::new(
            InMemoryPage::new(),
            LoaderOptions {
                widget_url: Some("not a url".into()),
                ..Default::default()
            },
        )
        .err()
        .unwrap();
        assert!(matches!(err, LoaderError::InvalidConfig(ConfigError::Url { .. })));
    }

    #[test]
    fn options_deserialize_from_js_object() {
        let options: LoaderOptions = serde_json::from_value(json!({
            "primaryColor": "#000",
            "widgetUrl": "https://help.example.com",
        }))
        .unwrap();
        assert_eq!(options.config.primary_color.as_deref(), Some("#000"));
        assert_eq!(options.widget_url.as_deref(), Some("https://help.example.com"));
    }
}
