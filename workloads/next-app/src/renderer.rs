//! Minimal HTML renderer for pages without pre-rendered output.

use async_trait::async_trait;
use edge_core::{Query, RequestAdapter, ResponseAdapter};
use edge_server::{RenderError, RenderOpts, RenderResult, Renderer};

/// Draws a document naming the page, its params and the locale.
#[derive(Debug, Default)]
pub struct ShellRenderer;

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[async_trait(?Send)]
impl Renderer for ShellRenderer {
    async fn render(
        &self,
        _req: &RequestAdapter,
        _res: &ResponseAdapter,
        pathname: &str,
        query: &Query,
        opts: &RenderOpts<'_>,
    ) -> Result<Option<RenderResult>, RenderError> {
        let lang = opts.locale.or(opts.default_locale).unwrap_or("en");
        let title = match opts.status {
            200 => escape(pathname),
            404 => "404: This page could not be found".to_string(),
            status => {
                let message = opts.error.unwrap_or("Internal Server Error");
                format!("{status}: {}", escape(message))
            }
        };
        let params: String = query
            .iter()
            .filter(|(key, _)| !key.starts_with("__next"))
            .map(|(key, values)| format!("<li>{}={}</li>", escape(key), escape(&values.join(","))))
            .collect();

        Ok(Some(RenderResult::from_string(format!(
            "<!DOCTYPE html><html lang=\"{lang}\"><head><title>{title}</title></head>\
             <body data-build-id=\"{}\"><h1>{title}</h1><ul>{params}</ul></body></html>",
            escape(opts.build_id)
        ))))
    }
}
