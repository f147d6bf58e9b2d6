use core::panic;
use std::sync::OnceLock;

use tera::{Context, Tera};
use tracing::info;

pub const CONFIRMATION_HTML: &str = "email/confirmation.html";
pub const CONFIRMATION_TEXT: &str = "email/confirmation.txt";

#[derive(Debug)]
pub struct TemplateManager {
    tera: &'static Tera,
}

impl TemplateManager {
    pub fn init() -> Self {
        info!(
            "{:<20} - Initializing the Template manager",
            "templ manager"
        );
        static TERA: OnceLock<Tera> = OnceLock::new();
        let tera = TERA.get_or_init(|| {
            Tera::new("templates/**/*").unwrap_or_else(|e| panic!("Parsing error(s): {e}"))
        });
        Self { tera }
    }

    /// Renders the confirmation email, returning `(html, text)`.
    /// The HTML version is only rendered if `with_html` is set.
    pub fn render_confirmation(
        &self,
        wordmark_url: &str,
        with_html: bool,
    ) -> Result<(Option<String>, String), tera::Error> {
        let mut ctx = Context::new();
        ctx.insert("wordmark_url", wordmark_url);

        let html = with_html
            .then(|| self.tera.render(CONFIRMATION_HTML, &ctx))
            .transpose()?;
        let text = self.tera.render(CONFIRMATION_TEXT, &ctx)?;

        Ok((html, text))
    }
}
