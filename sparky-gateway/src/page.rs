//! Chat page rendering.

use handlebars::Handlebars;
use serde::Serialize;

const INDEX_TEMPLATE: &str = include_str!("../templates/index.html");
const INDEX_NAME: &str = "index";

/// Name shown on the page.
pub const AGENT_NAME: &str = "Sparky";

/// Subtitle shown under the name.
pub const TAGLINE: &str = "Awaken Consciousness on Ice";

#[derive(Serialize)]
struct PageContext<'a> {
    title: &'a str,
    tagline: &'a str,
    image: &'a str,
}

/// Renders the single-page chat UI.
pub struct ChatPage {
    registry: Handlebars<'static>,
    image_path: String,
}

impl ChatPage {
    /// Compile the page template.
    pub fn new(image_path: impl Into<String>) -> Result<Self, handlebars::TemplateError> {
        let mut registry = Handlebars::new();
        registry.register_template_string(INDEX_NAME, INDEX_TEMPLATE)?;
        Ok(Self {
            registry,
            image_path: image_path.into(),
        })
    }

    /// Render the page HTML.
    pub fn render(&self) -> Result<String, handlebars::RenderError> {
        self.registry.render(
            INDEX_NAME,
            &PageContext {
                title: AGENT_NAME,
                tagline: TAGLINE,
                image: &self.image_path,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_injects_image_and_title() {
        let page = ChatPage::new("/static/avatar.png").unwrap();
        let html = page.render().unwrap();

        assert!(html.contains(r#"<img src="/static/avatar.png""#));
        assert!(html.contains("<title>Sparky - Awaken Consciousness on Ice</title>"));
        assert!(!html.contains("{{"));
    }

    #[test]
    fn test_render_escapes_image_path() {
        let page = ChatPage::new(r#"/x.png" onerror="alert(1)"#).unwrap();
        let html = page.render().unwrap();
        assert!(!html.contains(r#"onerror="alert(1)""#));
        assert!(html.contains("&quot;"));
    }
}
