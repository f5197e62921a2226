use super::page::HostPage;
use super::{EmbedLoader, LoaderError, LoaderOptions, init_guidance_widget};
use crate::validation::{self, ConfigError};
use kuchiki::traits::*;
use tracing::{debug, warn};

pub const AUTO_INIT_ATTRIBUTE: &str = "data-auto-init";

/// Optional overrides read from the loader `<script>` tag.
pub const DATA_ATTRIBUTES: &[&str] = &[
    "data-primary-color",
    "data-secondary-color",
    "data-font-family",
    "data-font-size",
    "data-logo-url",
    "data-widget-url",
];

/// Find the loader script in a host document and, if it opted in with
/// `data-auto-init="true"`, assemble options from its data attributes.
/// Attributes with unusable values are logged and skipped.
pub fn options_from_html(html: &str) -> Option<LoaderOptions> {
    let document = kuchiki::parse_html().one(html);
    let scripts = document.select("script[src]").ok()?;
    let script = scripts.into_iter().find(|script| {
        script
            .attributes
            .borrow()
            .get("src")
            .is_some_and(|src| src.contains("widget.js"))
    })?;
    let attributes = script.attributes.borrow();

    if attributes.get(AUTO_INIT_ATTRIBUTE) != Some("true") {
        debug!("loader script present without auto-init opt-in");
        return None;
    }

    let mut options = LoaderOptions::default();
    for name in DATA_ATTRIBUTES {
        let Some(value) = attributes.get(*name).filter(|v| !v.is_empty()) else {
            continue;
        };
        let value = value.to_string();
        let checked = match *name {
            "data-primary-color" => validation::check_color("primaryColor", &value)
                .map(|_| options.config.primary_color = Some(value)),
            "data-secondary-color" => validation::check_color("secondaryColor", &value)
                .map(|_| options.config.secondary_color = Some(value)),
            "data-font-family" if value.trim().is_empty() => Err(ConfigError::FontFamily),
            "data-font-family" => {
                options.config.font_family = Some(value);
                Ok(())
            }
            "data-font-size" => validation::check_font_size(&value)
                .map(|_| options.config.font_size = Some(value)),
            "data-logo-url" => {
                validation::check_logo(&value).map(|_| options.config.logo_url = Some(value))
            }
            "data-widget-url" => validation::check_url("widgetUrl", &value)
                .map(|_| options.widget_url = Some(value)),
            _ => Ok(()),
        };
        if let Err(err) = checked {
            warn!(attribute = %name, %err, "ignoring invalid loader data attribute");
        }
    }
    Some(options)
}

/// Document-ready hook: start a loader when the script tag asks for it.
pub fn auto_init<P: HostPage>(
    page: P,
    html: &str,
) -> Result<Option<EmbedLoader<P>>, LoaderError> {
    match options_from_html(html) {
        Some(options) => init_guidance_widget(page, options).map(Some),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::page::InMemoryPage;

    fn host(script: &str) -> String {
        format!(
            "<!doctype html><html><head><script src=\"/js/app.js\"></script>{script}</head><body><h1>Shop</h1></body></html>"
        )
    }

    #[test]
    fn reads_data_attributes_when_opted_in() {
        let html = host(
            r##"<script src="https://cdn.example.com/widget.js" data-auto-init="true"
                data-primary-color="#ff0000" data-font-size="18px"
                data-font-family="Georgia, serif" data-widget-url="https://help.example.com"></script>"##,
        );
        let options = options_from_html(&html).expect("opted in");
        assert_eq!(options.config.primary_color.as_deref(), Some("#ff0000"));
        assert_eq!(options.config.font_size.as_deref(), Some("18px"));
        assert_eq!(options.config.font_family.as_deref(), Some("Georgia, serif"));
        assert_eq!(options.config.secondary_color, None);
        assert_eq!(options.widget_url.as_deref(), Some("https://help.example.com"));
    }

    #[test]
    fn requires_explicit_opt_in() {
        let html = host(r#"<script src="/widget.js" data-auto-init="false"></script>"#);
        assert_eq!(options_from_html(&html), None);
        let html = host(r#"<script src="/widget.js"></script>"#);
        assert_eq!(options_from_html(&html), None);
        assert_eq!(options_from_html(&host("")), None);
    }

    #[test]
    fn invalid_attributes_are_skipped() {
        let html = host(
            r#"<script src="/widget.js" data-auto-init="true" data-primary-color="url(x)" data-logo-url="/logo.svg"></script>"#,
        );
        let options = options_from_html(&html).unwrap();
        assert_eq!(options.config.primary_color, None);
        assert_eq!(options.config.logo_url.as_deref(), Some("/logo.svg"));
    }

    #[test]
    fn blank_font_family_is_skipped() {
        let html = host(
            r#"<script src="/widget.js" data-auto-init="true" data-font-family="   "></script>"#,
        );
        let options = options_from_html(&html).unwrap();
        assert_eq!(options.config.font_family, None);

        let loader = auto_init(InMemoryPage::new(), &html)
            .unwrap()
            .expect("loader");
        assert_eq!(loader.config().widget.font_family, "Inter, sans-serif");
    }

    #[test]
    fn auto_init_mounts_loader() {
        let html = host(r#"<script src="/static/widget.js" data-auto-init="true"></script>"#);
        let loader = auto_init(InMemoryPage::new(), &html)
            .unwrap()
            .expect("loader");
        assert!(loader.is_loaded());
        assert_eq!(loader.page().count_tag("iframe"), 1);

        let untouched = auto_init(InMemoryPage::new(), &host("")).unwrap();
        assert!(untouched.is_none());
    }
}
